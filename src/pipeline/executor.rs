//! Pipeline executor: stage registration and the single-shot run.
//!
//! `run` moves the pipeline through `Idle -> Running -> {Completed | Failed}`:
//! 1. Snapshot the registered stages.
//! 2. Launch every stage on its own thread in a `TaskGroup`; the first stage
//!    error cancels the rest.
//! 3. Once every stage has returned, close every channel exactly once.
//! 4. Return the first stage error, wrapped with the failing stage's id.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::group::TaskGroup;
use crate::pipeline::id::StageId;
use crate::pipeline::registry::ChannelRegistry;
use crate::pipeline::stage::{Stage, Transform};
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Lifecycle of a pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Idle,
            1 => RunState::Running,
            2 => RunState::Completed,
            _ => RunState::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RunState::Idle => 0,
            RunState::Running => 1,
            RunState::Completed => 2,
            RunState::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Running => write!(f, "Running"),
            RunState::Completed => write!(f, "Completed"),
            RunState::Failed => write!(f, "Failed"),
        }
    }
}

/// A dataflow pipeline of stages connected by named, bounded channels.
pub struct Pipeline<T = String> {
    pub(crate) registry: ChannelRegistry<T>,
    stages: RwLock<Vec<Arc<Stage<T>>>>,
    state: AtomicU8,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Create an idle pipeline. `capacity` applies to every channel it creates.
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: ChannelRegistry::new(capacity),
            stages: RwLock::new(Vec::new()),
            state: AtomicU8::new(RunState::Idle.as_u8()),
        }
    }

    // ── Introspection ──

    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stage_count(&self) -> usize {
        self.stages.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Names of every channel created so far, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn registry(&self) -> &ChannelRegistry<T> {
        &self.registry
    }

    // ── Registration ──

    /// Register a 1-input, 1-output stage.
    pub fn register_decorator<F>(
        &self,
        transform: F,
        input: &str,
        output: &str,
    ) -> PipelineResult<StageId>
    where
        F: Fn(&CancelToken, Receiver<T>, Sender<T>) -> PipelineResult<()> + Send + Sync + 'static,
    {
        self.push_stage(
            vec![input.to_string()],
            vec![output.to_string()],
            Transform::decorator(transform),
        )
    }

    /// Register an N-input, 1-output stage. Empty `inputs` is rejected with `NoInputs`.
    pub fn register_multiplexer<F, S>(
        &self,
        transform: F,
        inputs: &[S],
        output: &str,
    ) -> PipelineResult<StageId>
    where
        F: Fn(&CancelToken, Vec<Receiver<T>>, Sender<T>) -> PipelineResult<()>
            + Send
            + Sync
            + 'static,
        S: AsRef<str>,
    {
        if inputs.is_empty() {
            return Err(PipelineError::NoInputs);
        }
        self.push_stage(
            inputs.iter().map(|s| s.as_ref().to_string()).collect(),
            vec![output.to_string()],
            Transform::multiplexer(transform),
        )
    }

    /// Register a 1-input, N-output stage. Empty `outputs` is rejected with `NoOutputs`.
    pub fn register_separator<F, S>(
        &self,
        transform: F,
        input: &str,
        outputs: &[S],
    ) -> PipelineResult<StageId>
    where
        F: Fn(&CancelToken, Receiver<T>, Vec<Sender<T>>) -> PipelineResult<()>
            + Send
            + Sync
            + 'static,
        S: AsRef<str>,
    {
        if outputs.is_empty() {
            return Err(PipelineError::NoOutputs);
        }
        self.push_stage(
            vec![input.to_string()],
            outputs.iter().map(|s| s.as_ref().to_string()).collect(),
            Transform::separator(transform),
        )
    }

    fn push_stage(
        &self,
        inputs: Vec<String>,
        outputs: Vec<String>,
        transform: Transform<T>,
    ) -> PipelineResult<StageId> {
        let mut stages = self.stages.write().unwrap_or_else(PoisonError::into_inner);
        // Checked under the stage lock: `run` snapshots under the same lock
        // after flipping the state, so no stage can slip in behind the snapshot.
        if self.state() != RunState::Idle {
            return Err(PipelineError::AlreadyRunning);
        }

        for name in inputs.iter().chain(outputs.iter()) {
            self.registry.get_or_create(name);
        }

        let id = StageId(stages.len() as u32);
        let stage = Stage::new(id, inputs, outputs, transform);
        tracing::debug!("Registered stage {}", stage.name());
        stages.push(Arc::new(stage));
        Ok(id)
    }

    // ── Run ──

    /// Run every stage until they all finish, `token` fires, or one fails.
    ///
    /// Single-shot: a second call returns `AlreadyRunning` without doing any work.
    pub fn run(&self, token: &CancelToken) -> PipelineResult<()> {
        if self
            .state
            .compare_exchange(
                RunState::Idle.as_u8(),
                RunState::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(PipelineError::AlreadyRunning);
        }

        let mut shutdown = ShutdownGuard {
            registry: &self.registry,
            state: &self.state,
            outcome: RunState::Failed,
        };

        let stages: Vec<Arc<Stage<T>>> = self
            .stages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        tracing::info!(
            "Pipeline started: {} stage(s), {} channel(s)",
            stages.len(),
            self.registry.len()
        );
        let started = Instant::now();

        let registry = &self.registry;
        let result = std::thread::scope(|scope| {
            let mut group = TaskGroup::new(scope, token);
            for stage in &stages {
                group.spawn(stage.name(), move |token| {
                    stage
                        .run(registry, token)
                        .map_err(|err| err.in_stage(stage.id()))
                });
            }
            tracing::debug!("Launched {} stage task(s)", group.len());
            group.wait()
        });

        match &result {
            Ok(()) => {
                shutdown.outcome = RunState::Completed;
                tracing::info!("Pipeline completed in {:?}", started.elapsed());
            }
            Err(err) => {
                tracing::warn!("Pipeline failed after {:?}: {}", started.elapsed(), err);
            }
        }

        result
    }
}

/// Closes every channel and publishes the final state when the run ends,
/// including when it unwinds.
struct ShutdownGuard<'a, T> {
    registry: &'a ChannelRegistry<T>,
    state: &'a AtomicU8,
    outcome: RunState,
}

impl<T> Drop for ShutdownGuard<'_, T> {
    fn drop(&mut self) {
        let closed = self.registry.close_all();
        tracing::info!("Pipeline shut down, closed {} channel(s)", closed);
        self.state.store(self.outcome.as_u8(), Ordering::Release);
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("capacity", &self.registry.capacity())
            .field("state", &RunState::from_u8(self.state.load(Ordering::Acquire)))
            .field("channels", &self.registry.names())
            .finish()
    }
}
