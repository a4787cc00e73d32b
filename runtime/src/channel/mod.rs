//! Bounded LIFO hand-off channel for producer/consumer threads
//!
//! A mutex guards a stack of items; two condition variables park consumers
//! while the stack is empty and producers while it is full. Every wait
//! re-checks its condition in a loop, so spurious wakeups and consumers racing
//! for the same item are harmless.
//!
//! Two terminal states exist. `close()` stops intake but lets consumers drain
//! what is left before they see [`ChannelError::Closed`]. `cancel()` is a
//! shutdown signal: every blocked or later call returns
//! [`ChannelError::Cancelled`] at once, and leftovers can be recovered with
//! `drain()`.

use crate::config::ChannelConfig;
use crate::error::{ChannelError, PushError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::time::{Duration, Instant};

struct State<T> {
    items: Vec<T>,
    closed: bool,
    cancelled: bool,
}

pub struct BoundedChannel<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedChannel<T> {
    /// Channel holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: Vec::with_capacity(capacity),
                closed: false,
                cancelled: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn with_config(config: &ChannelConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Push an item, blocking while the channel is full.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.state.lock();
        loop {
            if let Some(kind) = Self::rejects_push(&state) {
                return Err(PushError::new(item, kind));
            }
            if state.items.len() < self.capacity {
                break;
            }
            self.not_full.wait(&mut state);
        }
        self.store(state, item);
        Ok(())
    }

    /// Push without blocking; a full channel hands the item back.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let state = self.state.lock();
        if let Some(kind) = Self::rejects_push(&state) {
            return Err(PushError::new(item, kind));
        }
        if state.items.len() >= self.capacity {
            return Err(PushError::new(item, ChannelError::Full));
        }
        self.store(state, item);
        Ok(())
    }

    /// Pop the most recently pushed item, blocking while the channel is empty.
    pub fn pop(&self) -> Result<T, ChannelError> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = self.take(&mut state)? {
                return Ok(item);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Like `pop`, but gives up with `Timeout` after `timeout`.
    ///
    /// A timeout too large to express as a deadline waits like `pop`.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, ChannelError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.pop();
        };
        let mut state = self.state.lock();
        loop {
            if let Some(item) = self.take(&mut state)? {
                return Ok(item);
            }
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                return self.take(&mut state)?.ok_or(ChannelError::Timeout);
            }
        }
    }

    pub fn try_pop(&self) -> Result<T, ChannelError> {
        let mut state = self.state.lock();
        self.take(&mut state)?.ok_or(ChannelError::Empty)
    }

    /// Stop accepting items. Consumers drain what is left, then see `Closed`.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Wake every waiter with `Cancelled`; all later calls fail the same way.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Remove every buffered item, in pop order. Works in any state.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let mut items = std::mem::take(&mut state.items);
        drop(state);
        self.not_full.notify_all();
        items.reverse();
        items
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    fn rejects_push(state: &State<T>) -> Option<ChannelError> {
        if state.cancelled {
            Some(ChannelError::Cancelled)
        } else if state.closed {
            Some(ChannelError::Closed)
        } else {
            None
        }
    }

    fn store(&self, mut state: MutexGuard<'_, State<T>>, item: T) {
        state.items.push(item);
        drop(state);
        self.not_empty.notify_all();
    }

    fn take(&self, state: &mut State<T>) -> Result<Option<T>, ChannelError> {
        if state.cancelled {
            return Err(ChannelError::Cancelled);
        }
        if let Some(item) = state.items.pop() {
            self.not_full.notify_one();
            return Ok(Some(item));
        }
        if state.closed {
            return Err(ChannelError::Closed);
        }
        Ok(None)
    }
}

impl<T> Default for BoundedChannel<T> {
    fn default() -> Self {
        Self::with_config(&ChannelConfig::default())
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedChannel")
            .field("len", &state.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}
