//! Separator: 1 input, N outputs (round-robin fan-out).
//!
//! The k-th payload read (counting from zero) goes to output `k % N`, so
//! distribution is even and the assignment order is reproducible.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::nodes::{recv_or_cancel, send_or_cancel};
use crossbeam_channel::{Receiver, Sender};

/// Monotonic round-robin cursor over `len` targets.
#[derive(Debug, Clone)]
pub struct RoundRobin {
    counter: u64,
    len: usize,
}

impl RoundRobin {
    /// `len` must be non-zero.
    pub fn new(len: usize) -> Self {
        debug_assert!(len > 0, "round-robin over zero targets");
        Self { counter: 0, len }
    }

    /// Index for the next write, then advance.
    pub fn next_index(&mut self) -> usize {
        let index = (self.counter % self.len as u64) as usize;
        self.counter += 1;
        index
    }

    /// Number of indices handed out so far.
    pub fn count(&self) -> u64 {
        self.counter
    }
}

/// Separator stage. Fails with `NoOutputs` before reading anything if
/// `outputs` is empty.
pub fn separator<T: Send>(
    token: &CancelToken,
    input: Receiver<T>,
    outputs: Vec<Sender<T>>,
) -> PipelineResult<()> {
    if outputs.is_empty() {
        return Err(PipelineError::NoOutputs);
    }

    let mut cursor = RoundRobin::new(outputs.len());
    while let Some(payload) = recv_or_cancel(token, &input) {
        let target = cursor.next_index();
        tracing::trace!("Separator routing payload #{} to output {}", cursor.count(), target);
        if !send_or_cancel(token, &outputs[target], payload) {
            break;
        }
    }
    Ok(())
}
