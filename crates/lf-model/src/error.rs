//! Model-specific error types.

use core::fmt;

use lf_core::CoreError;
use thiserror::Error;

/// Kind of a named entity in the model namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Parameter,
    Variable,
    Derived,
    Readout,
    Reaction,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Parameter => "parameter",
            EntityKind::Variable => "variable",
            EntityKind::Derived => "derived quantity",
            EntityKind::Readout => "readout",
            EntityKind::Reaction => "reaction",
        };
        f.write_str(s)
    }
}

/// Structural problems detected while defining a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("Name already defined: {name}")]
    DuplicateName { name: String },

    #[error("Name is reserved: {name}")]
    ReservedName { name: String },

    #[error("{referenced_by} references unknown name {name}")]
    UnknownReference { name: String, referenced_by: String },

    #[error("Stoichiometry of {reaction} references {name}, which is not a variable")]
    NotAVariable { reaction: String, name: String },

    #[error("Unknown {kind}: {name}")]
    UnknownEntity { kind: EntityKind, name: String },

    #[error("{name} takes {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Non-finite value for {name}: {value}")]
    NonFinite { name: String, value: f64 },
}

/// Errors raised by the model layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Dependency cycle through {name}")]
    Cycle { name: String },

    #[error("State length mismatch: expected {expected}, got {got}")]
    StateLength { expected: usize, got: usize },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    pub fn is_definition(&self) -> bool {
        matches!(self, ModelError::Definition(_))
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, ModelError::Cycle { .. })
    }
}
