//! Built-in stage transforms and the cancellable channel primitives they share.
//!
//! Every read and write inside a stage loop goes through `recv_or_cancel` /
//! `send_or_cancel`, which `select!` on the data channel and the cancel
//! token with the token checked first. A stage therefore never blocks past
//! cancellation, and a payload caught mid-write when the token fires is
//! dropped.

pub mod decorator;
pub mod multiplexer;
pub mod separator;

pub use decorator::{decorate, prefix_decorator, DECORATED_PREFIX, NO_DECORATOR_MARKER};
pub use multiplexer::{is_skipped, multiplexer, NO_MULTIPLEXER_MARKER};
pub use separator::{separator, RoundRobin};

use crate::pipeline::cancel::CancelToken;
use crossbeam_channel::{Receiver, Sender};

/// Read one payload. `None` when the input is closed and drained, or on cancellation.
pub fn recv_or_cancel<T>(token: &CancelToken, input: &Receiver<T>) -> Option<T> {
    let done = token.done();
    crossbeam_channel::select_biased! {
        recv(done) -> _ => None,
        recv(input) -> msg => msg.ok(),
    }
}

/// Write one payload, blocking while the output is full.
///
/// Returns `false` if the token fired first (the payload is dropped) or the
/// output has no receivers left.
pub fn send_or_cancel<T>(token: &CancelToken, output: &Sender<T>, value: T) -> bool {
    let done = token.done();
    crossbeam_channel::select_biased! {
        recv(done) -> _ => false,
        send(output, value) -> res => res.is_ok(),
    }
}

/// Copy payloads from `input` to `output` unchanged until either side stops.
pub fn forward<T>(token: &CancelToken, input: &Receiver<T>, output: &Sender<T>) {
    while let Some(value) = recv_or_cancel(token, input) {
        if !send_or_cancel(token, output, value) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::{Duration, Instant};

    #[test]
    fn test_recv_returns_none_on_disconnect() {
        let (tx, rx) = bounded::<u8>(1);
        tx.send(1).unwrap();
        drop(tx);

        let token = CancelToken::new();
        assert_eq!(recv_or_cancel(&token, &rx), Some(1));
        assert_eq!(recv_or_cancel(&token, &rx), None);
    }

    #[test]
    fn test_cancelled_token_wins_over_ready_data() {
        let (tx, rx) = bounded::<u8>(1);
        tx.send(1).unwrap();

        let token = CancelToken::new();
        token.cancel();
        assert_eq!(recv_or_cancel(&token, &rx), None);
    }

    #[test]
    fn test_blocked_send_wakes_on_cancel() {
        let (tx, _rx) = bounded::<u8>(1);
        tx.send(0).unwrap();

        let token = CancelToken::new();
        let canceller = token.clone();
        let started = Instant::now();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        assert!(!send_or_cancel(&token, &tx, 1));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
