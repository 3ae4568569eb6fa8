//! conveyer - Main Entry Point
//!
//! Builds the pipeline described by a config file, feeds it stdin one line
//! per payload and prints whatever reaches the external output channels.
//!
//! ```text
//! conveyer [CONFIG]
//! ```

use anyhow::Context;
use conveyer::{
    config::PipelineConfig,
    pipeline::{CancelToken, Pipeline, PipelineError, RunHandle, UNDEFINED},
};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const RETRY_INTERVAL: Duration = Duration::from_millis(1);

fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => PipelineConfig::default(),
    };

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = init_logging(&config)?;

    tracing::info!(
        "Starting conveyer ({} environment, {} stage(s))",
        config.environment,
        config.stages.len()
    );

    let pipeline = Arc::new(config.build_pipeline()?);
    let inputs = config.inputs();
    let outputs = config.outputs();

    let token = match config.run_timeout() {
        Some(timeout) => CancelToken::with_timeout(timeout),
        None => CancelToken::new(),
    };
    let run = pipeline.spawn(token)?;

    let mut drained: Vec<(String, String)> = Vec::new();
    feed_stdin(&pipeline, &run, &inputs, &outputs, &mut drained)?;

    // Give in-flight payloads a chance to reach the outputs
    let grace_end = Instant::now() + config.drain_grace();
    while Instant::now() < grace_end && !run.is_finished() {
        drain_ready(&pipeline, &outputs, &mut drained);
        std::thread::sleep(RETRY_INTERVAL);
    }

    tracing::info!("Shutting down...");
    let result = run.shutdown();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (channel, payload) in &drained {
        writeln!(out, "{}: {}", channel, payload)?;
    }
    for channel in &outputs {
        loop {
            match pipeline.recv(channel) {
                Ok(Some(payload)) => writeln!(out, "{}: {}", channel, payload)?,
                Ok(None) => {
                    writeln!(out, "{}: {}", channel, UNDEFINED)?;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Stopped draining '{}': {}", channel, e);
                    break;
                }
            }
        }
    }
    out.flush()?;

    result.context("Pipeline run failed")?;
    Ok(())
}

fn init_logging(
    config: &PipelineConfig,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let (file_layer, guard) = match config.logging.file_parts() {
        Some((dir, name)) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

/// Send every stdin line round-robin over `inputs`, draining `outputs`
/// whenever an input is full so the pipeline can make progress.
fn feed_stdin(
    pipeline: &Pipeline,
    run: &RunHandle,
    inputs: &[String],
    outputs: &[String],
    drained: &mut Vec<(String, String)>,
) -> anyhow::Result<()> {
    if inputs.is_empty() {
        tracing::warn!("Pipeline has no external inputs, ignoring stdin");
        return Ok(());
    }

    let stdin = std::io::stdin();
    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        let channel = &inputs[index % inputs.len()];

        loop {
            match pipeline.send_timeout(channel, line.clone(), RETRY_INTERVAL) {
                Ok(()) => break,
                Err(PipelineError::ChannelFull(_)) if !run.is_finished() => {
                    drain_ready(pipeline, outputs, drained);
                }
                Err(e) => {
                    tracing::warn!("Pipeline stopped accepting input: {}", e);
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

fn drain_ready(pipeline: &Pipeline, outputs: &[String], drained: &mut Vec<(String, String)>) {
    for channel in outputs {
        while let Ok(Some(payload)) = pipeline.recv(channel) {
            drained.push((channel.clone(), payload));
        }
    }
}
