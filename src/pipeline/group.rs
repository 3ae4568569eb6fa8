//! Structured task group over scoped threads.
//!
//! Tasks run on named threads inside a `std::thread::scope`. The first task
//! to return an error has it recorded and cancels the group token; every
//! other task sees the cancellation at its next suspension point. `wait`
//! joins all tasks before handing back the first error, so error propagation
//! and shutdown go through one mechanism.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::{PipelineError, PipelineResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{Scope, ScopedJoinHandle};

pub struct TaskGroup<'scope, 'env> {
    scope: &'scope Scope<'scope, 'env>,
    token: CancelToken,
    first_error: Arc<Mutex<Option<PipelineError>>>,
    tasks: Vec<(String, ScopedJoinHandle<'scope, ()>)>,
}

impl<'scope, 'env> TaskGroup<'scope, 'env> {
    /// Create a group whose token is derived from `parent`.
    pub fn new(scope: &'scope Scope<'scope, 'env>, parent: &CancelToken) -> Self {
        Self {
            scope,
            token: parent.child(),
            first_error: Arc::new(Mutex::new(None)),
            tasks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run `task` on its own scoped thread.
    ///
    /// A panic inside `task` is caught and recorded as `StagePanicked`.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: FnOnce(&CancelToken) -> PipelineResult<()> + Send + 'scope,
    {
        let name = name.into();
        let token = self.token.clone();
        let first_error = Arc::clone(&self.first_error);
        let task_name = name.clone();

        let spawned = std::thread::Builder::new()
            .name(name.clone())
            .spawn_scoped(self.scope, move || {
                tracing::debug!("Task '{}' started", task_name);
                let result = panic::catch_unwind(AssertUnwindSafe(|| task(&token)))
                    .unwrap_or_else(|payload| {
                        Err(PipelineError::StagePanicked(panic_message(payload.as_ref())))
                    });
                match result {
                    Ok(()) => tracing::debug!("Task '{}' finished", task_name),
                    Err(err) => record_failure(&first_error, &token, &task_name, err),
                }
            });

        match spawned {
            Ok(handle) => self.tasks.push((name, handle)),
            Err(e) => record_failure(
                &self.first_error,
                &self.token,
                &name,
                PipelineError::Spawn(e.to_string()),
            ),
        }
    }

    /// Join every task, then return the first recorded error.
    pub fn wait(self) -> PipelineResult<()> {
        for (name, handle) in self.tasks {
            if handle.join().is_err() {
                tracing::warn!("Task '{}' terminated abnormally", name);
            }
        }

        // Releases the watcher linking this token to its parent.
        self.token.cancel();

        let first = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn record_failure(
    slot: &Mutex<Option<PipelineError>>,
    token: &CancelToken,
    task: &str,
    err: PipelineError,
) {
    let mut first = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if first.is_none() {
        tracing::warn!("Task '{}' failed, cancelling group: {}", task, err);
        *first = Some(err);
        token.cancel();
    } else {
        tracing::warn!("Task '{}' failed after group cancellation: {}", task, err);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
