//! Thread boundary between a running pipeline and its caller.
//!
//! `Pipeline::run` blocks until every stage has stopped. `Pipeline::spawn`
//! moves that call onto a dedicated thread so the caller can keep feeding
//! and draining channels through the external port, and hands back a
//! `RunHandle` to cancel and join the run.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::executor::Pipeline;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to a pipeline running on its own thread.
#[derive(Debug)]
pub struct RunHandle {
    token: CancelToken,
    thread: JoinHandle<PipelineResult<()>>,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run to end and return its result.
    pub fn join(self) -> PipelineResult<()> {
        self.thread
            .join()
            .unwrap_or_else(|_| Err(PipelineError::StagePanicked("pipeline thread".to_string())))
    }

    /// Cancel, then wait for the run to end.
    pub fn shutdown(self) -> PipelineResult<()> {
        self.cancel();
        self.join()
    }

    /// Poll until the run ends or `timeout` elapses. Returns `true` if it ended.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while !self.thread.is_finished() {
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// Run the pipeline on a dedicated thread under `token`.
    ///
    /// `token` is cancelled once the run ends, so a deadline timer behind it
    /// does not outlive the run.
    pub fn spawn(self: &Arc<Self>, token: CancelToken) -> PipelineResult<RunHandle> {
        let pipeline = Arc::clone(self);
        let run_token = token.clone();
        let thread = std::thread::Builder::new()
            .name("conveyer-run".to_string())
            .spawn(move || {
                let result = pipeline.run(&run_token);
                run_token.cancel();
                result
            })
            .map_err(|e| PipelineError::Spawn(e.to_string()))?;

        Ok(RunHandle { token, thread })
    }
}
