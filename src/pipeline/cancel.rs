//! Shared cancellation signal.
//!
//! A `CancelToken` is a cloneable flag paired with a zero-capacity crossbeam
//! channel whose only sender is dropped on cancellation. Stage loops put
//! `token.done()` into a `select!` next to their data channel, so a blocked
//! read or write wakes up as soon as the token fires.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    deadline: Option<Instant>,
}

/// Cloneable cancellation token. All clones observe the same signal.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// A token that only fires when `cancel` is called.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A token that fires after `timeout`, or earlier on `cancel`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token that fires at `deadline`, or earlier on `cancel`.
    ///
    /// A timer thread waits for whichever comes first and then exits. Cancel
    /// the token once it is no longer needed, or the thread lives until the
    /// deadline; `Pipeline::spawn` does this when its run ends.
    pub fn with_deadline(deadline: Instant) -> Self {
        let token = Self::build(Some(deadline));
        let timer = token.clone();
        let spawned = std::thread::Builder::new()
            .name("conveyer-deadline".to_string())
            .spawn(move || {
                let done = timer.done();
                crossbeam_channel::select! {
                    recv(done) -> _ => {}
                    recv(crossbeam_channel::at(deadline)) -> _ => {
                        tracing::debug!("Cancel token deadline reached");
                        timer.cancel();
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn deadline timer, cancelling immediately: {}", e);
            token.cancel();
        }
        token
    }

    fn build(deadline: Option<Instant>) -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                done: rx,
                deadline,
            }),
        }
    }

    /// Derive a token that is cancelled whenever `self` is.
    ///
    /// Cancelling the child does not affect the parent. The watcher thread
    /// lives until either token fires, so owners of a child should cancel it
    /// once they no longer need it.
    pub fn child(&self) -> Self {
        let child = Self::build(self.inner.deadline);
        let parent = self.clone();
        let watched = child.clone();
        let spawned = std::thread::Builder::new()
            .name("conveyer-cancel".to_string())
            .spawn(move || {
                let parent_done = parent.done();
                let child_done = watched.done();
                crossbeam_channel::select! {
                    recv(parent_done) -> _ => watched.cancel(),
                    recv(child_done) -> _ => {}
                }
            });
        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn cancel watcher, cancelling child: {}", e);
            child.cancel();
        }
        child
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let trigger = self
            .inner
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(trigger);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that becomes ready (disconnected) once the token fires.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Block until the token fires or `timeout` elapses. Returns `true` if it fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        matches!(
            self.inner.done.recv_timeout(timeout),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        )
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_idempotent_and_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        token.cancel();

        assert!(clone.is_cancelled());
        assert!(clone.done().recv().is_err());
    }

    #[test]
    fn test_done_not_ready_before_cancel() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_timeout_fires() {
        let token = CancelToken::with_timeout(Duration::from_millis(20));
        assert!(token.wait_timeout(Duration::from_secs(2)));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent_but_not_reverse() {
        let parent = CancelToken::new();
        let child = parent.child();
        let sibling = parent.child();

        sibling.cancel();
        assert!(!parent.is_cancelled());
        assert!(!child.is_cancelled());

        parent.cancel();
        assert!(child.wait_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn test_child_inherits_deadline() {
        let parent = CancelToken::with_timeout(Duration::from_millis(20));
        let child = parent.child();
        assert_eq!(child.deadline(), parent.deadline());
        assert!(child.wait_timeout(Duration::from_secs(2)));
    }
}
