use palletsense_core::error::CoreError;

/// Errors that abort a whole analysis run.
///
/// Per-entity problems never surface here; they are reported as
/// [`crate::report::EntityFailure`] rows instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A global precondition failed (empty route, invalid configuration).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The batch document could not be parsed.
    #[error("Invalid batch document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The run was cancelled before completion.
    #[error("Analysis run cancelled")]
    Cancelled,
}
