use std::path::PathBuf;

use crate::types::PipelineStage;

/// Errors that can occur across the devpulse workspace.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate reports it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use devpulse_core::DevpulseError;
///
/// let err = DevpulseError::Validation("history is not ordered".into());
/// assert!(err.to_string().contains("history is not ordered"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DevpulseError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check .devpulse.toml and the related environment variables"))]
    Config(String),

    /// Input that does not satisfy a stage contract.
    #[error("invalid input: {0}")]
    Validation(String),

    /// GitHub API failure.
    #[error("GitHub error: {0}")]
    GitHub(String),

    /// Local git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Chart or graph rendering failure.
    #[error("render error: {0}")]
    Render(String),

    /// Message delivery failure.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A pipeline stage failed; the run was aborted.
    #[error("pipeline stage '{stage}' failed: {source}")]
    Stage {
        /// Stage that failed.
        stage: PipelineStage,
        /// Underlying failure.
        #[source]
        source: Box<DevpulseError>,
    },
}

impl DevpulseError {
    /// Wrap an error as the failure of a pipeline stage.
    ///
    /// # Examples
    ///
    /// ```
    /// use devpulse_core::{DevpulseError, PipelineStage};
    ///
    /// let err = DevpulseError::GitHub("rate limited".into()).in_stage(PipelineStage::Fetch);
    /// assert_eq!(err.stage(), Some(PipelineStage::Fetch));
    /// ```
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        DevpulseError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The pipeline stage this error was raised in, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            DevpulseError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
