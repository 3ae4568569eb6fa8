//! # conveyer: stage-and-channel dataflow pipelines
//!
//! A pipeline is a set of long-lived stages, each on its own thread,
//! connected by named, bounded FIFO channels. Payloads are injected and
//! drained from outside through the pipeline's port while it runs.
//!
//! ## Architecture
//!
//! - **Pipeline**: stage registration, the single-shot run and the port
//! - **Nodes**: the built-in decorator, multiplexer and separator transforms
//! - **Config**: TOML/JSON description of a topology plus logging and timing
//! - **Communication**: crossbeam channels, cancellation via `select!`
//!
//! ## Example
//!
//! ```no_run
//! use conveyer::pipeline::{nodes, CancelToken, Pipeline};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pipeline: Arc<Pipeline> = Arc::new(Pipeline::new(8));
//! pipeline.register_decorator(nodes::prefix_decorator, "in", "out")?;
//!
//! let run = pipeline.spawn(CancelToken::with_timeout(Duration::from_secs(1)))?;
//! pipeline.send("in", "hello".to_string())?;
//! let out = pipeline.recv_timeout("out", Duration::from_millis(100))?;
//! assert_eq!(out.as_deref(), Some("decorated: hello"));
//! run.shutdown()?;
//! # Ok::<(), conveyer::pipeline::PipelineError>(())
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::{LoggingConfig, PipelineConfig, StageConfig};
pub use error::{ConveyerError, Result, ResultExt};
pub use pipeline::{
    CancelToken, Pipeline, PipelineError, PipelineResult, RunHandle, RunState, StageId,
    StageKind, UNDEFINED,
};
