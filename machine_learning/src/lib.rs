pub mod arch;
pub mod error;
pub mod init;
pub mod optimization;
pub mod params;

pub use error::{MlErr, Result};
pub use params::ParamStore;
