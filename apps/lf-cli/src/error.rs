use std::path::PathBuf;

use lf_label::LabelError;
use lf_model::ModelError;
use lf_scan::ScanError;
use lf_sim::SimError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid run configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Cannot render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Simulation failed: {0}")]
    Failed(String),

    #[error("Model {model} has no label specification")]
    NoLabels { model: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

pub type CliResult<T> = Result<T, CliError>;
