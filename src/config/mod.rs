//! Configuration module for conveyer
//!
//! A config file describes one pipeline: the channel capacity, the stages
//! and how they are wired, plus run timing and logging for the binary.
//!
//! # Formats
//!
//! The format is chosen by file extension: `.json` is read and written with
//! `serde_json`, anything else as TOML.
//!
//! # Example
//!
//! ```toml
//! capacity = 16
//! run_timeout_ms = 1000
//!
//! [[stages]]
//! kind = "decorator"
//! inputs = ["in"]
//! outputs = ["mid"]
//!
//! [[stages]]
//! kind = "separator"
//! inputs = ["mid"]
//! outputs = ["o1", "o2"]
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{ConveyerError, Result, ResultExt};
use crate::pipeline::nodes::{multiplexer, prefix_decorator, separator};
use crate::pipeline::{Pipeline, StageKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default per-channel buffer capacity
pub const DEFAULT_CAPACITY: usize = 16;

/// Default run deadline in milliseconds
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 1000;

/// Default wait after input EOF before the run is cancelled
pub const DEFAULT_DRAIN_GRACE_MS: u64 = 100;

/// One stage in the configured topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub kind: StageKind,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,
}

impl StageConfig {
    pub fn decorator(input: &str, output: &str) -> Self {
        Self {
            kind: StageKind::Decorator,
            inputs: vec![input.to_string()],
            outputs: vec![output.to_string()],
        }
    }

    pub fn multiplexer(inputs: &[&str], output: &str) -> Self {
        Self {
            kind: StageKind::Multiplexer,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: vec![output.to_string()],
        }
    }

    pub fn separator(input: &str, outputs: &[&str]) -> Self {
        Self {
            kind: StageKind::Separator,
            inputs: vec![input.to_string()],
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn validate(&self, index: usize) -> Result<()> {
        let (inputs_ok, outputs_ok) = match self.kind {
            StageKind::Decorator => (self.inputs.len() == 1, self.outputs.len() == 1),
            StageKind::Multiplexer => (!self.inputs.is_empty(), self.outputs.len() == 1),
            StageKind::Separator => (self.inputs.len() == 1, !self.outputs.is_empty()),
        };
        if !inputs_ok || !outputs_ok {
            return Err(ConveyerError::Config(format!(
                "stage {} ({}) has {} input(s) and {} output(s)",
                index,
                self.kind,
                self.inputs.len(),
                self.outputs.len()
            )));
        }
        if self
            .inputs
            .iter()
            .chain(self.outputs.iter())
            .any(|name| name.trim().is_empty())
        {
            return Err(ConveyerError::Config(format!(
                "stage {} ({}) has an empty channel name",
                index, self.kind
            )));
        }
        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Buffer capacity of every channel; 0 makes every channel a rendezvous
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Deadline for the whole run; 0 means none
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,

    /// How long the binary keeps the run alive after its input ends
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,

    /// Free-form deployment label, logged at startup
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_run_timeout_ms() -> u64 {
    DEFAULT_RUN_TIMEOUT_MS
}

fn default_drain_grace_ms() -> u64 {
    DEFAULT_DRAIN_GRACE_MS
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_stages() -> Vec<StageConfig> {
    vec![StageConfig::decorator("in", "out")]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            run_timeout_ms: DEFAULT_RUN_TIMEOUT_MS,
            drain_grace_ms: DEFAULT_DRAIN_GRACE_MS,
            environment: default_environment(),
            logging: LoggingConfig::default(),
            stages: default_stages(),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl PipelineConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(ConveyerError::from)
            .with_context(|| format!("Failed to read config {:?}", path))?;

        let config = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                ConveyerError::Serialization(format!("Failed to parse config {:?}: {}", path, e))
            })?
        } else {
            Self::from_toml_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Parse TOML without validating
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ConveyerError::Serialization(format!("Failed to parse TOML: {}", e)))
    }

    /// Save to disk, in JSON or TOML by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| {
                ConveyerError::Serialization(format!("Failed to serialize config: {}", e))
            })?
        } else {
            toml::to_string_pretty(self).map_err(|e| {
                ConveyerError::Serialization(format!("Failed to serialize config: {}", e))
            })?
        };

        std::fs::write(path, content)
            .map_err(ConveyerError::from)
            .with_context(|| format!("Failed to write config {:?}", path))
    }

    /// Check every stage's arity and channel names.
    pub fn validate(&self) -> Result<()> {
        for (index, stage) in self.stages.iter().enumerate() {
            stage.validate(index)?;
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_ms > 0).then(|| Duration::from_millis(self.run_timeout_ms))
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    /// Build an idle pipeline with the built-in transform for every stage.
    pub fn build_pipeline(&self) -> Result<Pipeline<String>> {
        self.validate()?;

        let pipeline = Pipeline::new(self.capacity);
        for stage in &self.stages {
            let id = match stage.kind {
                StageKind::Decorator => pipeline.register_decorator(
                    prefix_decorator,
                    &stage.inputs[0],
                    &stage.outputs[0],
                )?,
                StageKind::Multiplexer => {
                    pipeline.register_multiplexer(multiplexer, &stage.inputs, &stage.outputs[0])?
                }
                StageKind::Separator => {
                    pipeline.register_separator(separator, &stage.inputs[0], &stage.outputs)?
                }
            };
            tracing::debug!("Configured {} as {}", stage.kind, id);
        }
        Ok(pipeline)
    }

    /// Channels some stage reads but no stage writes, in first-seen order.
    pub fn inputs(&self) -> Vec<String> {
        self.external(|s| &s.inputs, |s| &s.outputs)
    }

    /// Channels some stage writes but no stage reads, in first-seen order.
    pub fn outputs(&self) -> Vec<String> {
        self.external(|s| &s.outputs, |s| &s.inputs)
    }

    fn external(
        &self,
        side: impl Fn(&StageConfig) -> &Vec<String>,
        other: impl Fn(&StageConfig) -> &Vec<String>,
    ) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.stages.iter().flat_map(&side) {
            let internal = self.stages.iter().any(|s| other(s).contains(name));
            if !internal && !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chain() -> PipelineConfig {
        PipelineConfig {
            stages: vec![
                StageConfig::multiplexer(&["a", "b"], "joined"),
                StageConfig::decorator("joined", "mid"),
                StageConfig::separator("mid", &["o1", "o2"]),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.capacity, 16);
        assert_eq!(config.run_timeout(), Some(Duration::from_millis(1000)));
        assert_eq!(config.drain_grace(), Duration::from_millis(100));
        assert_eq!(config.environment, "development");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            capacity = 4
            run_timeout_ms = 0

            [[stages]]
            kind = "separator"
            inputs = ["in"]
            outputs = ["x", "y", "z"]
            "#,
        )
        .unwrap();

        assert_eq!(config.capacity, 4);
        assert_eq!(config.run_timeout(), None);
        assert_eq!(config.drain_grace_ms, DEFAULT_DRAIN_GRACE_MS);
        assert_eq!(config.stages.len(), 1);
        assert_eq!(config.stages[0].kind, StageKind::Separator);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = PipelineConfig::from_toml_str(
            r#"
            [[stages]]
            kind = "splitter"
            inputs = ["in"]
            outputs = ["out"]
            "#,
        );
        assert!(matches!(result, Err(ConveyerError::Serialization(_))));
    }

    #[test]
    fn test_validate_arity() {
        let mut config = PipelineConfig::default();
        config.stages = vec![StageConfig {
            kind: StageKind::Decorator,
            inputs: vec!["a".into(), "b".into()],
            outputs: vec!["c".into()],
        }];
        assert!(matches!(config.validate(), Err(ConveyerError::Config(_))));

        config.stages = vec![StageConfig::multiplexer(&[], "out")];
        assert!(config.validate().is_err());

        config.stages = vec![StageConfig::separator("in", &[])];
        assert!(config.validate().is_err());

        config.stages = vec![StageConfig::decorator("in", " ")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_external_channels() {
        let config = chain();
        assert_eq!(config.inputs(), vec!["a", "b"]);
        assert_eq!(config.outputs(), vec!["o1", "o2"]);
    }

    #[test]
    fn test_build_pipeline_registers_every_stage() {
        let pipeline = chain().build_pipeline().unwrap();
        assert_eq!(pipeline.stage_count(), 3);
        assert_eq!(
            pipeline.channel_names(),
            vec!["a", "b", "joined", "mid", "o1", "o2"]
        );
    }

    #[test]
    fn test_save_load_toml_and_json() {
        let dir = TempDir::new().unwrap();
        let config = chain();

        for name in ["pipeline.toml", "pipeline.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(PipelineConfig::load(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_missing_file_is_io_error_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");

        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
        match err {
            ConveyerError::WithContext { source, .. } => {
                assert!(matches!(*source, ConveyerError::Io(_)));
            }
            other => panic!("expected context-wrapped IO error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(config, PipelineConfig::default());
    }
}
