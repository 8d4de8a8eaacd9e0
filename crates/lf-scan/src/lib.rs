//! lf-scan: parameter scans and control analysis.
//!
//! A [`Scan`] runs one isolated simulation per row of a [`ParameterTable`]
//! and collects steady states or time courses into tables whose rows follow
//! the input order. Numerical failures become `NaN` rows. Runs can be
//! memoized in a [`ScanCache`].

pub mod agg;
pub mod cache;
pub mod error;
pub mod mca;
pub mod parameters;
pub mod results;
pub mod scan;

pub use agg::Agg;
pub use cache::ScanCache;
pub use error::{ScanError, ScanResult};
pub use mca::{McaOptions, compound_elasticities, parameter_elasticities};
pub use parameters::ParameterTable;
pub use results::{ProtocolByPars, SteadyStates, TimeCourseByPars};
pub use scan::{Scan, ScanOptions, steady_state, time_course, time_course_over_protocol};
