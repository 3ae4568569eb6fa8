//! Error handling for the conveyer application
//!
//! This module defines the application-level error type and a Result alias.
//! Pipeline errors live in [`crate::pipeline::error`] and convert into it.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for conveyer operations
#[derive(Error, Debug)]
pub enum ConveyerError {
    /// Errors related to configuration loading, saving or validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors raised by the pipeline itself
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ConveyerError>,
    },
}

impl ConveyerError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ConveyerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The pipeline error underneath any context wrappers, if there is one.
    pub fn as_pipeline(&self) -> Option<&PipelineError> {
        match self {
            ConveyerError::Pipeline(err) => Some(err),
            ConveyerError::WithContext { source, .. } => source.as_pipeline(),
            _ => None,
        }
    }
}

/// Result type alias for conveyer operations
pub type Result<T> = std::result::Result<T, ConveyerError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ConveyerError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ConveyerError::from(e).with_context(f()))
    }
}
