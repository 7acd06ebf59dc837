//! Host future adapter
//!
//! Runs one host future under an interruption token. The future's factory receives an
//! `OnInterrupt` handle for registering cancellation hooks. When the token is interrupted
//! the hooks fire and the adapter stops awaiting the future, resolving with an
//! interruption sentinel instead of the future's own outcome.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use tokio::sync::oneshot;
use tracing::trace;

use crate::cause::Defect;
use crate::effect::node::{Erased, PromiseFactory, Value};
use crate::interrupt::{invoke_listener, lock, InterruptToken, Listener};

/* ===================== Interrupt Hooks ===================== */

/// Cancellation hooks of one host operation.
///
/// Each hook fires at most once. Hooks registered after interruption fire immediately.
#[derive(Clone, Default)]
pub struct OnInterrupt {
    hooks: Arc<Mutex<HookSet>>,
}

#[derive(Default)]
struct HookSet {
    fired: bool,
    pending: Vec<Listener>,
}

impl OnInterrupt {
    pub fn register<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut set = lock(&self.hooks);
            if !set.fired {
                set.pending.push(Box::new(hook));
                return;
            }
        }
        invoke_listener(Box::new(hook));
    }

    pub fn is_fired(&self) -> bool {
        lock(&self.hooks).fired
    }

    fn fire(&self) {
        let hooks = {
            let mut set = lock(&self.hooks);
            set.fired = true;
            std::mem::take(&mut set.pending)
        };
        for hook in hooks {
            invoke_listener(hook);
        }
    }
}

/* ===================== Adapter ===================== */

/// How a host future failed to produce a value
#[derive(Debug)]
pub(crate) enum Rejection {
    /// The token was interrupted first
    Interrupted,
    /// The future resolved with an error
    Rejected(Erased),
    /// The factory or the future panicked
    Panicked(Defect),
}

pub(crate) struct FutureAdapter {
    factory: Mutex<Option<PromiseFactory>>,
}

impl FutureAdapter {
    pub(crate) fn new(factory: PromiseFactory) -> Self {
        Self {
            factory: Mutex::new(Some(factory)),
        }
    }

    /// Start the future and race it against `token`.
    ///
    /// # Panics
    /// Panics when called a second time. An adapter owns exactly one host operation.
    pub(crate) async fn run(&self, token: &InterruptToken) -> Result<Value, Rejection> {
        let factory = lock(&self.factory).take();
        let Some(factory) = factory else {
            panic!("future adapter invoked more than once");
        };

        let hooks = OnInterrupt::default();
        let (reject, rejected) = oneshot::channel::<()>();
        let listener_hooks = hooks.clone();
        let subscription = token.on_interrupt(move || {
            listener_hooks.fire();
            let _ = reject.send(());
        });
        if subscription.is_none() {
            trace!("Token interrupted before the host future started");
            return Err(Rejection::Interrupted);
        }

        let future = match catch_unwind(AssertUnwindSafe(move || factory(hooks))) {
            Ok(future) => future,
            Err(payload) => return Err(Rejection::Panicked(Defect::from_panic(payload))),
        };

        let outcome = tokio::select! {
            biased;
            Ok(()) = rejected => Err(Rejection::Interrupted),
            settled = AssertUnwindSafe(future).catch_unwind() => match settled {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(Rejection::Rejected(error)),
                Err(payload) => Err(Rejection::Panicked(Defect::from_panic(payload))),
            },
        };

        drop(subscription);
        outcome
    }
}
