//! Error types for simulation operations.

use lf_core::CoreError;
use lf_model::{DefinitionError, ModelError};
use thiserror::Error;

/// Errors raised before or around a simulation run.
///
/// Numerical failures during integration are not errors: they are recorded
/// on the result (see [`IntegrationFailure`]).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SimResult<T> = Result<T, SimError>;

impl From<DefinitionError> for SimError {
    fn from(e: DefinitionError) -> Self {
        SimError::Model(ModelError::Definition(e))
    }
}

/// An integrator could not complete the requested span.
///
/// `partial` holds the states produced for the time points reached before
/// the failure (always starting with the initial state).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Integration failed at t = {time}: {reason}")]
pub struct IntegrationFailure {
    pub time: f64,
    pub reason: String,
    pub partial: Vec<Vec<f64>>,
}
