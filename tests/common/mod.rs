//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use conveyer::pipeline::{Pipeline, PipelineError};
use std::time::{Duration, Instant};

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Poll `recv` until a payload arrives, the channel reports closure, or the
/// test timeout elapses.
pub fn recv_within(pipeline: &Pipeline, channel: &str) -> Option<String> {
    let deadline = Instant::now() + test_timeout();
    loop {
        match pipeline.recv(channel) {
            Ok(value) => return value,
            Err(PipelineError::NoData(_)) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => panic!("recv({:?}) failed: {}", channel, e),
        }
    }
}

/// Collect `count` payloads from `channel`, panicking on timeout.
pub fn recv_n(pipeline: &Pipeline, channel: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            recv_within(pipeline, channel)
                .unwrap_or_else(|| panic!("{:?} closed after {} of {} payloads", channel, i, count))
        })
        .collect()
}

/// Drain a closed channel: every buffered payload, stopping at the sentinel.
pub fn drain_closed(pipeline: &Pipeline, channel: &str) -> Vec<String> {
    let mut drained = Vec::new();
    while let Some(payload) = pipeline
        .recv(channel)
        .unwrap_or_else(|e| panic!("recv({:?}) after shutdown failed: {}", channel, e))
    {
        drained.push(payload);
    }
    drained
}

/// Send with retries while the channel is full.
pub fn send_within(pipeline: &Pipeline, channel: &str, payload: &str) {
    let deadline = Instant::now() + test_timeout();
    loop {
        match pipeline.send(channel, payload.to_string()) {
            Ok(()) => return,
            Err(PipelineError::ChannelFull(_)) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => panic!("send({:?}) failed: {}", channel, e),
        }
    }
}
