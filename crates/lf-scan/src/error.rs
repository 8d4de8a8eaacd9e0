//! Error types for scans and control analysis.

use lf_core::CoreError;
use lf_model::{DefinitionError, ModelError};
use lf_sim::SimError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Unknown aggregate: {name}")]
    UnknownAggregate { name: String },

    #[error("No concentration given for {name}")]
    MissingConcentration { name: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ScanResult<T> = Result<T, ScanError>;

impl From<DefinitionError> for ScanError {
    fn from(e: DefinitionError) -> Self {
        ScanError::Model(ModelError::Definition(e))
    }
}

impl ScanError {
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            ScanError::Model(ModelError::Definition(_))
                | ScanError::Sim(SimError::Model(ModelError::Definition(_)))
        )
    }
}
