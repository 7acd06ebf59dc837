//! Cooperative interruption
//!
//! An `InterruptToken` is a monotonic latch shared by everything that belongs to one run
//! (or one concurrent group). Interrupting it flips the latch once and synchronously
//! invokes every registered listener. Listeners registered afterwards run immediately.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cause::Defect;

pub(crate) type Listener = Box<dyn FnOnce() + Send>;

/// Lock a mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a user-supplied listener, logging instead of propagating a panic
pub(crate) fn invoke_listener(listener: Listener) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(listener)) {
        warn!(panic = %Defect::from_panic(payload), "Interrupt listener panicked");
    }
}

/* ===================== Token ===================== */

#[derive(Clone, Default)]
pub struct InterruptToken {
    state: Arc<TokenState>,
}

#[derive(Default)]
struct TokenState {
    interrupted: AtomicBool,
    cancelled: CancellationToken,
    listeners: Mutex<ListenerSet>,
}

#[derive(Default)]
struct ListenerSet {
    next_key: u64,
    entries: Vec<(u64, Listener)>,
}

impl InterruptToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.interrupted.load(Ordering::Acquire)
    }

    /// Flip the latch and run every listener. Only the first call has any effect.
    pub fn interrupt(&self) {
        let listeners = {
            let mut set = lock(&self.state.listeners);
            if self.state.interrupted.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut set.entries)
        };

        self.state.cancelled.cancel();
        debug!(listeners = listeners.len(), "Interrupt token tripped");

        for (_, listener) in listeners {
            invoke_listener(listener);
        }
    }

    /// Register a listener for interruption.
    ///
    /// Returns a subscription that deregisters the listener when dropped. If the token is
    /// already interrupted the listener runs immediately and `None` is returned.
    pub fn on_interrupt<F>(&self, listener: F) -> Option<Subscription>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut set = lock(&self.state.listeners);
            if !self.state.interrupted.load(Ordering::Acquire) {
                let key = set.next_key;
                set.next_key += 1;
                set.entries.push((key, Box::new(listener)));
                return Some(Subscription {
                    state: Arc::downgrade(&self.state),
                    key,
                });
            }
        }

        invoke_listener(Box::new(listener));
        None
    }

    /// Forward interruption of this token to `child` for as long as the subscription lives
    pub fn link(&self, child: &InterruptToken) -> Option<Subscription> {
        let child = child.clone();
        self.on_interrupt(move || child.interrupt())
    }

    /// Wait until the token is interrupted
    pub async fn interrupted(&self) {
        self.state.cancelled.cancelled().await
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        lock(&self.state.listeners).entries.len()
    }
}

impl fmt::Debug for InterruptToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptToken")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Registration of one listener. Dropping it removes the listener.
#[must_use = "dropping a subscription removes its listener"]
pub struct Subscription {
    state: Weak<TokenState>,
    key: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            lock(&state.listeners)
                .entries
                .retain(|(key, _)| *key != self.key);
        }
    }
}

/* ===================== Cancel Handle ===================== */

/// The cancel callback handed out by `Runtime::execute_with_cancel` and `Runtime::fork`
#[derive(Clone, Debug)]
pub struct CancelHandle {
    token: InterruptToken,
}

impl CancelHandle {
    pub(crate) fn new(token: InterruptToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.interrupt();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_interrupted()
    }
}
