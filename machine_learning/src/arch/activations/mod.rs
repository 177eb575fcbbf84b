mod act_fn;
mod relu;
mod tanh;

pub use act_fn::ActFn;
pub use relu::LeakyRelu;
pub use tanh::Tanh;
