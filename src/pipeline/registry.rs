//! Channel registry: named, bounded FIFO queues.
//!
//! Every channel is a `crossbeam_channel::bounded` pair created the first time
//! its name is referenced. The registry is the only owner of write access:
//! stages get sender clones for the duration of a run, while callers only
//! ever see read-only `ChannelHandle`s.
//!
//! Closure is recorded explicitly. `close_all` fires a shared signal before
//! dropping the registry's senders, so reads observe closure and parked
//! writes give up even if some endpoint clone is still alive.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Textual rendering of the value `Recv` yields on a closed, drained channel.
pub const UNDEFINED: &str = "undefined";

/// Read-only view of one named channel.
pub struct ChannelHandle<T> {
    name: String,
    receiver: Receiver<T>,
    closed: CancelToken,
}

impl<T> Clone for ChannelHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            receiver: self.receiver.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ChannelHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .field("len", &self.receiver.len())
            .finish()
    }
}

impl<T> ChannelHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of buffered payloads.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn receiver(&self) -> Receiver<T> {
        self.receiver.clone()
    }

    /// Non-blocking read.
    ///
    /// `Ok(Some(_))` for a payload, `Ok(None)` once the channel is closed and
    /// drained, `NoData` when it is open but empty.
    pub fn try_recv(&self) -> PipelineResult<Option<T>> {
        match self.receiver.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Disconnected) => Ok(None),
            Err(TryRecvError::Empty) if self.is_closed() => Ok(None),
            Err(TryRecvError::Empty) => Err(PipelineError::NoData(self.name.clone())),
        }
    }

    /// Blocking read, bounded by `timeout`. Same results as `try_recv`.
    pub fn recv_timeout(&self, timeout: Duration) -> PipelineResult<Option<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => Ok(Some(value)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => self.try_recv(),
        }
    }
}

struct Slot<T> {
    /// `None` once the channel has been closed.
    sender: Option<Sender<T>>,
    handle: ChannelHandle<T>,
}

/// Owns every channel of one pipeline, keyed by name.
pub struct ChannelRegistry<T> {
    capacity: usize,
    channels: RwLock<HashMap<String, Slot<T>>>,
    closed: CancelToken,
}

impl<T> ChannelRegistry<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: RwLock::new(HashMap::new()),
            closed: CancelToken::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Slots stay consistent across a panicking holder, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Slot<T>>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot<T>>> {
        self.channels.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot<R>(&self, name: &str, f: impl FnOnce(&Slot<T>) -> PipelineResult<R>) -> PipelineResult<R> {
        let channels = self.read();
        let slot = channels
            .get(name)
            .ok_or_else(|| PipelineError::ChannelNotFound(name.to_string()))?;
        f(slot)
    }

    /// Return the channel registered under `name`, creating it if absent.
    pub fn get_or_create(&self, name: &str) -> ChannelHandle<T> {
        if let Some(slot) = self.read().get(name) {
            return slot.handle.clone();
        }

        let capacity = self.capacity;
        let closed = &self.closed;
        self.write()
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!("Created channel '{}' (capacity {})", name, capacity);
                let (sender, receiver) = bounded(capacity);
                Slot {
                    sender: Some(sender),
                    handle: ChannelHandle {
                        name: name.to_string(),
                        receiver,
                        closed: closed.clone(),
                    },
                }
            })
            .handle
            .clone()
    }

    /// Look up an existing channel without creating it.
    pub fn get(&self, name: &str) -> PipelineResult<ChannelHandle<T>> {
        self.slot(name, |slot| Ok(slot.handle.clone()))
    }

    /// Writer endpoint for a stage. `ChannelClosed` once the registry is closed.
    pub(crate) fn sender(&self, name: &str) -> PipelineResult<Sender<T>> {
        self.slot(name, |slot| {
            slot.sender
                .clone()
                .ok_or_else(|| PipelineError::ChannelClosed(name.to_string()))
        })
    }

    pub fn receiver(&self, name: &str) -> PipelineResult<Receiver<T>> {
        self.slot(name, |slot| Ok(slot.handle.receiver()))
    }

    /// Non-blocking write. `ChannelFull` when the buffer has no room.
    ///
    /// Runs under the read lock, so it cannot land after `close_all`.
    pub fn try_send(&self, name: &str, value: T) -> PipelineResult<()> {
        self.slot(name, |slot| {
            let sender = slot
                .sender
                .as_ref()
                .ok_or_else(|| PipelineError::ChannelClosed(name.to_string()))?;
            sender.try_send(value).map_err(|e| match e {
                TrySendError::Full(_) => PipelineError::ChannelFull(name.to_string()),
                TrySendError::Disconnected(_) => PipelineError::ChannelClosed(name.to_string()),
            })
        })
    }

    /// Blocking write, bounded by `timeout`. `ChannelFull` on timeout,
    /// `ChannelClosed` if the registry closes while waiting.
    ///
    /// The lock is released before waiting; the close signal is what stops
    /// a parked write.
    pub fn send_timeout(&self, name: &str, value: T, timeout: Duration) -> PipelineResult<()> {
        let sender = self.sender(name)?;
        let closed = self.closed.done();
        crossbeam_channel::select_biased! {
            recv(closed) -> _ => Err(PipelineError::ChannelClosed(name.to_string())),
            send(sender, value) -> res => {
                res.map_err(|_| PipelineError::ChannelClosed(name.to_string()))
            }
            default(timeout) => Err(PipelineError::ChannelFull(name.to_string())),
        }
    }

    /// Non-blocking read; see `ChannelHandle::try_recv`.
    pub fn try_recv(&self, name: &str) -> PipelineResult<Option<T>> {
        self.slot(name, |slot| slot.handle.try_recv())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered channel names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Close every channel. Returns how many were closed by this call.
    ///
    /// Must only run once all stage writers have returned.
    pub fn close_all(&self) -> usize {
        let mut channels = self.write();
        if self.closed.is_cancelled() {
            tracing::warn!("Channel registry closed more than once");
        }
        self.closed.cancel();

        let mut closed = 0;
        for slot in channels.values_mut() {
            if slot.sender.take().is_some() {
                closed += 1;
            }
        }
        tracing::debug!("Closed {} channel(s)", closed);
        closed
    }
}
