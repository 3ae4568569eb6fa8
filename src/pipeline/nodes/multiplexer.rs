//! Multiplexer: N inputs, 1 output (fan-in).
//!
//! One drain loop per input runs on its own scoped thread, all writing into
//! the shared output. Payloads containing `NO_MULTIPLEXER_MARKER` are
//! consumed and dropped; filtering is not an error. The stage returns only
//! after every drain loop has stopped.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::nodes::{recv_or_cancel, send_or_cancel};
use crossbeam_channel::{Receiver, Sender};

pub const NO_MULTIPLEXER_MARKER: &str = "no multiplexer";

/// Whether the multiplexer filters this payload out.
pub fn is_skipped(payload: &str) -> bool {
    payload.contains(NO_MULTIPLEXER_MARKER)
}

/// Multiplexer stage. Fails with `NoInputs` before starting any loop if
/// `inputs` is empty.
pub fn multiplexer(
    token: &CancelToken,
    inputs: Vec<Receiver<String>>,
    output: Sender<String>,
) -> PipelineResult<()> {
    if inputs.is_empty() {
        return Err(PipelineError::NoInputs);
    }

    std::thread::scope(|scope| {
        for (index, input) in inputs.into_iter().enumerate() {
            let output = output.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("mux-drain-{index}"))
                .spawn_scoped(scope, move || drain(token, index, input, output));

            if let Err(e) = spawned {
                // Loops already started only stop on cancellation; the scope joins them.
                token.cancel();
                return Err(PipelineError::Spawn(e.to_string()));
            }
        }
        Ok(())
    })
}

fn drain(token: &CancelToken, index: usize, input: Receiver<String>, output: Sender<String>) {
    let mut forwarded = 0u64;
    let mut skipped = 0u64;

    while let Some(payload) = recv_or_cancel(token, &input) {
        if is_skipped(&payload) {
            skipped += 1;
            continue;
        }
        if !send_or_cancel(token, &output, payload) {
            break;
        }
        forwarded += 1;
    }

    tracing::debug!(
        "Multiplexer input {} stopped: {} forwarded, {} skipped",
        index,
        forwarded,
        skipped
    );
}
