//! Error types for parameter fitting.

use lf_core::CoreError;
use lf_model::{DefinitionError, ModelError};
use lf_sim::SimError;
use thiserror::Error;

/// Problems with the fit setup.
///
/// A minimizer that fails to converge is not an error; the fit then
/// reports `NaN` for every parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type FitResult<T> = Result<T, FitError>;

impl From<DefinitionError> for FitError {
    fn from(e: DefinitionError) -> Self {
        FitError::Model(ModelError::Definition(e))
    }
}

impl FitError {
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            FitError::Model(ModelError::Definition(_))
                | FitError::Sim(SimError::Model(ModelError::Definition(_)))
        )
    }
}
