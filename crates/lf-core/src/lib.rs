//! lf-core: shared foundation for labelflow.
//!
//! Contains:
//! - numeric (tolerances + float helpers)
//! - table (labelled, row-indexed result tables)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod table;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use table::{Key, Table};
