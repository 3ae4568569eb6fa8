//! Prefix decorator: 1 input, 1 output.
//!
//! Marks each payload with `DECORATED_PREFIX`. Payloads that already carry
//! the prefix pass through unchanged, so chained decorators never stack it.
//! A payload containing `NO_DECORATOR_MARKER` cannot be processed: the stage
//! stops with `CannotDecorate` and the payload is not forwarded.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::nodes::{recv_or_cancel, send_or_cancel};
use crossbeam_channel::{Receiver, Sender};

pub const NO_DECORATOR_MARKER: &str = "no decorator";
pub const DECORATED_PREFIX: &str = "decorated: ";

/// Apply the decoration rule to a single payload.
pub fn decorate(payload: String) -> PipelineResult<String> {
    if payload.contains(NO_DECORATOR_MARKER) {
        return Err(PipelineError::CannotDecorate { payload });
    }
    if payload.starts_with(DECORATED_PREFIX) {
        Ok(payload)
    } else {
        Ok(format!("{DECORATED_PREFIX}{payload}"))
    }
}

/// Decorator stage loop. Runs until the input closes or `token` fires.
pub fn prefix_decorator(
    token: &CancelToken,
    input: Receiver<String>,
    output: Sender<String>,
) -> PipelineResult<()> {
    while let Some(payload) = recv_or_cancel(token, &input) {
        let decorated = decorate(payload)?;
        tracing::trace!("Decorated payload: {:?}", decorated);
        if !send_or_cancel(token, &output, decorated) {
            break;
        }
    }
    Ok(())
}
