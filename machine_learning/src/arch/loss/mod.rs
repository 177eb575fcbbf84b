mod least_squares;
mod loss_fn;
mod wasserstein;

pub use least_squares::LeastSquares;
pub use loss_fn::AdversarialLoss;
pub use wasserstein::{Wasserstein, WassersteinGp};
