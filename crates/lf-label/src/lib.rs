//! lf-label: isotope label tracing for kinetic models.
//!
//! [`LabelMapper`] expands every labeled variable into its `2^n`
//! isotopomers and every mapped reaction into one reaction per substrate
//! isotopomer combination. [`LinearLabelMapper`] builds the much smaller
//! linear model of positional label fractions around a steady state.

pub mod error;
pub mod isotopomer;
mod labeling;
pub mod linear;
pub mod mapper;

pub use error::{LabelError, LabelResult};
pub use isotopomer::{Isotopomers, label_string};
pub use labeling::MAX_POSITIONS;
pub use linear::LinearLabelMapper;
pub use mapper::LabelMapper;
