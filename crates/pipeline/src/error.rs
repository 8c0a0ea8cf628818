use thiserror::Error;

pub type Result<T> = std::result::Result<T, StageError>;

/// Why a stage could not complete.
///
/// These never abort the pipeline; the orchestrator records them and keeps
/// going.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
