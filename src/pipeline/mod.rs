//! Stage-and-channel dataflow pipeline.
//!
//! Stages are long-lived workers connected by named, bounded FIFO channels.
//! Each stage runs on its own thread; channels are created the first time a
//! stage registration names them. External code injects and drains payloads
//! through the port (`send` / `recv`) while the pipeline runs.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────┐      ┌──────────────┐
//! send("in")─► [Decorator]  ├─mid─►  [Separator] ├─o1─► recv("o1")
//!            └──────────────┘      │              ├─o2─► recv("o2")
//!                                  └──────────────┘
//! ```
//!
//! # Design
//!
//! - **Single shot**: `run` moves `Idle -> Running -> Completed | Failed` once.
//! - **Fail fast**: the first stage error cancels every sibling stage.
//! - **Close once**: channels are closed after every stage has returned, so
//!   no stage ever writes to a closed channel.
//! - **Cancellable I/O**: stage reads and writes `select!` on the cancel token.

pub mod bridge;
pub mod cancel;
pub mod error;
pub mod executor;
pub mod group;
pub mod id;
pub mod nodes;
pub mod port;
pub mod registry;
pub mod stage;

pub use bridge::RunHandle;
pub use cancel::CancelToken;
pub use error::{PipelineError, PipelineResult};
pub use executor::{Pipeline, RunState};
pub use group::TaskGroup;
pub use id::StageId;
pub use registry::{ChannelHandle, ChannelRegistry, UNDEFINED};
pub use stage::{Stage, StageKind, Transform};
