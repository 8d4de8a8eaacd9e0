//! Label expansion errors.

use lf_model::{DefinitionError, ModelError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabelError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{name} is not a variable of the base model")]
    UnknownLabelVariable { name: String },

    #[error("Label map given for unknown reaction {name}")]
    UnknownReaction { name: String },

    #[error("Missing {kind} value for {name}")]
    MissingValue { kind: &'static str, name: String },

    #[error("{name} must have between 1 and {max} label positions, got {positions}")]
    PositionCount {
        name: String,
        positions: usize,
        max: usize,
    },

    #[error("Label map of {reaction} has {got} entries, products have {expected} positions")]
    MapLength {
        reaction: String,
        expected: usize,
        got: usize,
    },

    #[error("Label map of {reaction} references source {index}, only {available} available")]
    SourceOutOfRange {
        reaction: String,
        index: usize,
        available: usize,
    },

    #[error("Position {position} out of range for {name} with {positions} positions")]
    PositionOutOfRange {
        name: String,
        position: usize,
        positions: usize,
    },

    #[error("Reaction {reaction} changes labeled variable {variable} but has no label map")]
    UnmappedReaction { reaction: String, variable: String },

    #[error("Reaction {reaction} has non-integer stoichiometry {coefficient} for labeled {variable}")]
    FractionalStoichiometry {
        reaction: String,
        variable: String,
        coefficient: f64,
    },

    #[error("Concentration of labeled {name} must be positive, got {value}")]
    NonPositiveConcentration { name: String, value: f64 },

    #[error("Flux of {reaction} must be non-negative, got {value}")]
    NegativeFlux { reaction: String, value: f64 },
}

pub type LabelResult<T> = Result<T, LabelError>;

impl From<DefinitionError> for LabelError {
    fn from(e: DefinitionError) -> Self {
        LabelError::Model(ModelError::Definition(e))
    }
}

impl LabelError {
    /// Reference to something that does not exist.
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            LabelError::Model(ModelError::Definition(_))
                | LabelError::UnknownLabelVariable { .. }
                | LabelError::UnknownReaction { .. }
                | LabelError::MissingValue { .. }
        )
    }

    /// Inconsistent label specification or unusable steady state.
    pub fn is_expansion(&self) -> bool {
        !self.is_definition() && !matches!(self, LabelError::Model(_))
    }
}
