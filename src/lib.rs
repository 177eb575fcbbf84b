//! Adversarial training of a small image generator with a least squares, Wasserstein or gradient
//! penalized Wasserstein objective, plus Inception Score and FID evaluation.

pub mod config;
pub mod data;
mod error;
pub mod eval;
pub mod gan;
pub mod run_log;
pub mod training;
pub mod visualize;

pub use config::GanConfig;
pub use error::{GanErr, Result};
