//! Stage abstraction for the pipeline.
//!
//! A stage is an immutable binding of a shape, its channel names and a
//! transform function. The three shapes differ only in how many channels
//! sit on each side, so `Transform` is an enum with one boxed function type
//! per shape and `Stage::run` dispatches on it after resolving the channel
//! names against the registry.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::id::StageId;
use crate::pipeline::registry::ChannelRegistry;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One input, one output.
pub type DecoratorFn<T> =
    dyn Fn(&CancelToken, Receiver<T>, Sender<T>) -> PipelineResult<()> + Send + Sync;

/// Many inputs, one output.
pub type MultiplexerFn<T> =
    dyn Fn(&CancelToken, Vec<Receiver<T>>, Sender<T>) -> PipelineResult<()> + Send + Sync;

/// One input, many outputs.
pub type SeparatorFn<T> =
    dyn Fn(&CancelToken, Receiver<T>, Vec<Sender<T>>) -> PipelineResult<()> + Send + Sync;

/// The shape of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Decorator,
    Multiplexer,
    Separator,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Decorator => write!(f, "decorator"),
            StageKind::Multiplexer => write!(f, "multiplexer"),
            StageKind::Separator => write!(f, "separator"),
        }
    }
}

/// Transform function, tagged with its shape.
pub enum Transform<T> {
    Decorator(Box<DecoratorFn<T>>),
    Multiplexer(Box<MultiplexerFn<T>>),
    Separator(Box<SeparatorFn<T>>),
}

impl<T> Transform<T> {
    pub fn decorator<F>(f: F) -> Self
    where
        F: Fn(&CancelToken, Receiver<T>, Sender<T>) -> PipelineResult<()> + Send + Sync + 'static,
    {
        Transform::Decorator(Box::new(f))
    }

    pub fn multiplexer<F>(f: F) -> Self
    where
        F: Fn(&CancelToken, Vec<Receiver<T>>, Sender<T>) -> PipelineResult<()>
            + Send
            + Sync
            + 'static,
    {
        Transform::Multiplexer(Box::new(f))
    }

    pub fn separator<F>(f: F) -> Self
    where
        F: Fn(&CancelToken, Receiver<T>, Vec<Sender<T>>) -> PipelineResult<()>
            + Send
            + Sync
            + 'static,
    {
        Transform::Separator(Box::new(f))
    }

    pub fn kind(&self) -> StageKind {
        match self {
            Transform::Decorator(_) => StageKind::Decorator,
            Transform::Multiplexer(_) => StageKind::Multiplexer,
            Transform::Separator(_) => StageKind::Separator,
        }
    }
}

/// A registered unit of pipeline work.
pub struct Stage<T> {
    id: StageId,
    inputs: Vec<String>,
    outputs: Vec<String>,
    transform: Transform<T>,
}

impl<T> Stage<T> {
    pub fn new(
        id: StageId,
        inputs: Vec<String>,
        outputs: Vec<String>,
        transform: Transform<T>,
    ) -> Self {
        Self {
            id,
            inputs,
            outputs,
            transform,
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn kind(&self) -> StageKind {
        self.transform.kind()
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Human-readable name, also used as the worker thread name.
    pub fn name(&self) -> String {
        format!(
            "{}#{}({} -> {})",
            self.kind(),
            self.id.0,
            self.inputs.join(","),
            self.outputs.join(",")
        )
    }

    /// Resolve channels and run the transform until it returns.
    ///
    /// Endpoint clones are dropped when the transform returns, which lets the
    /// registry fully disconnect channels on close.
    pub fn run(&self, registry: &ChannelRegistry<T>, token: &CancelToken) -> PipelineResult<()> {
        match &self.transform {
            Transform::Decorator(f) => {
                let input = registry.receiver(&self.inputs[0])?;
                let output = registry.sender(&self.outputs[0])?;
                f(token, input, output)
            }
            Transform::Multiplexer(f) => {
                let inputs = self
                    .inputs
                    .iter()
                    .map(|name| registry.receiver(name))
                    .collect::<PipelineResult<Vec<_>>>()?;
                let output = registry.sender(&self.outputs[0])?;
                f(token, inputs, output)
            }
            Transform::Separator(f) => {
                let input = registry.receiver(&self.inputs[0])?;
                let outputs = self
                    .outputs
                    .iter()
                    .map(|name| registry.sender(name))
                    .collect::<PipelineResult<Vec<_>>>()?;
                f(token, input, outputs)
            }
        }
    }
}

impl<T> fmt::Debug for Stage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough(
        token: &CancelToken,
        input: Receiver<u32>,
        output: Sender<u32>,
    ) -> PipelineResult<()> {
        crate::pipeline::nodes::forward(token, &input, &output);
        Ok(())
    }

    #[test]
    fn test_stage_name_and_kind() {
        let stage: Stage<u32> = Stage::new(
            StageId(1),
            vec!["a".into(), "b".into()],
            vec!["out".into()],
            Transform::multiplexer(|_, _, _| Ok(())),
        );
        assert_eq!(stage.kind(), StageKind::Multiplexer);
        assert_eq!(stage.name(), "multiplexer#1(a,b -> out)");
    }

    #[test]
    fn test_stage_run_resolves_channels() {
        let registry: ChannelRegistry<u32> = ChannelRegistry::new(4);
        registry.get_or_create("in");
        registry.get_or_create("out");
        registry.try_send("in", 7).unwrap();

        let stage = Stage::new(
            StageId(0),
            vec!["in".into()],
            vec!["out".into()],
            Transform::decorator(passthrough),
        );

        let token = CancelToken::new();
        std::thread::scope(|scope| {
            scope.spawn(|| stage.run(&registry, &token).unwrap());
            let out = registry.get("out").unwrap();
            assert_eq!(
                out.recv_timeout(std::time::Duration::from_secs(2)).unwrap(),
                Some(7)
            );
            token.cancel();
        });
    }

    #[test]
    fn test_stage_kind_serde_lowercase() {
        let json = serde_json::to_string(&StageKind::Separator).unwrap();
        assert_eq!(json, "\"separator\"");
    }
}
