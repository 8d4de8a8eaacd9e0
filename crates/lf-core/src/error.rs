use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Row length mismatch: expected {expected} values, got {got}")]
    RowLength { expected: usize, got: usize },

    #[error("Index length mismatch: expected {expected} keys, got {got}")]
    IndexLength { expected: usize, got: usize },

    #[error("Unknown column: {name}")]
    UnknownColumn { name: String },
}
