mod idx;
mod loader;
mod source;

pub use idx::{IdxSource, normalize_pixel};
pub use loader::DataLoader;
pub use source::{InMemorySource, SampleSource};
