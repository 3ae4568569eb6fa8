//! External port: inject into and read from named channels from outside
//! the pipeline, whether or not it is running.
//!
//! `send` and `recv` never block. The `_timeout` variants suspend the caller
//! for at most the given duration. None of them create channels: a name that
//! no stage was registered against is a `ChannelNotFound` error.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::executor::Pipeline;
use std::time::Duration;

impl<T: Send + 'static> Pipeline<T> {
    /// Non-blocking write. `ChannelFull` if the buffer has no room,
    /// `ChannelClosed` once the pipeline has shut down.
    pub fn send(&self, name: &str, payload: T) -> PipelineResult<()> {
        self.registry.try_send(name, payload)
    }

    /// Non-blocking read.
    ///
    /// `Ok(Some(_))` for a payload; `Ok(None)` (rendered as `UNDEFINED`) once
    /// the channel is closed and drained; `NoData` while it is open but empty.
    pub fn recv(&self, name: &str) -> PipelineResult<Option<T>> {
        self.registry.try_recv(name)
    }

    /// Blocking write bounded by `timeout`; `ChannelFull` if no room frees up
    /// in time, `ChannelClosed` if the pipeline shuts down while waiting.
    pub fn send_timeout(&self, name: &str, payload: T, timeout: Duration) -> PipelineResult<()> {
        self.registry.send_timeout(name, payload, timeout)
    }

    /// Blocking read bounded by `timeout`; `NoData` if nothing arrives in time.
    pub fn recv_timeout(&self, name: &str, timeout: Duration) -> PipelineResult<Option<T>> {
        // Taken out of the registry so the wait does not hold its lock.
        self.registry.get(name)?.recv_timeout(timeout)
    }
}
