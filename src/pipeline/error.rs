//! Pipeline-specific error types.

use crate::pipeline::id::StageId;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    // ── Lookup ──
    #[error("chan not found: {0}")]
    ChannelNotFound(String),

    // ── Not now (backpressure / empty) ──
    #[error("channel '{0}' is full")]
    ChannelFull(String),

    #[error("no data in channel '{0}'")]
    NoData(String),

    #[error("channel '{0}' is closed")]
    ChannelClosed(String),

    // ── Configuration ──
    #[error("pipeline already running")]
    AlreadyRunning,

    #[error("no input channels")]
    NoInputs,

    #[error("no output channels")]
    NoOutputs,

    // ── Domain ──
    #[error("can't be decorated: {payload:?}")]
    CannotDecorate { payload: String },

    #[error("transform error: {0}")]
    Transform(String),

    #[error("stage panicked: {0}")]
    StagePanicked(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    /// First stage failure of a run, wrapped with the failing stage.
    #[error("pipeline run failed in stage {stage}: {source}")]
    Run {
        stage: StageId,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap a stage failure with run-level context.
    pub fn in_stage(self, stage: StageId) -> Self {
        PipelineError::Run {
            stage,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping `Run` wrappers.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::Run { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True for transient "not now" conditions: full on send, empty on receive.
    pub fn is_not_now(&self) -> bool {
        matches!(
            self,
            PipelineError::ChannelFull(_) | PipelineError::NoData(_)
        )
    }

    /// True when the root cause was raised by stage logic.
    pub fn is_domain(&self) -> bool {
        matches!(
            self.root_cause(),
            PipelineError::CannotDecorate { .. }
                | PipelineError::Transform(_)
                | PipelineError::StagePanicked(_)
        )
    }

    /// True for errors caused by how the pipeline was wired or driven.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self.root_cause(),
            PipelineError::AlreadyRunning | PipelineError::NoInputs | PipelineError::NoOutputs
        )
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
