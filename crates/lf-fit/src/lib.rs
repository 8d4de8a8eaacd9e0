//! lf-fit: parameter estimation for kinetic models.
//!
//! A [`Fit`] rebuilds its model from a factory for every residual
//! evaluation and hands the residual to a [`Minimizer`]. The default
//! minimizer is a Nelder-Mead simplex search backed by `argmin`.

pub mod error;
pub mod fit;
pub mod minimizer;

pub use error::{FitError, FitResult};
pub use fit::{Fit, FitSettings, steady_state, steady_state_rmse, time_course, time_course_rmse};
pub use minimizer::{Minimizer, NelderMead, Residual};

use argmin_math as _;
