//! Runtime
//!
//! The context object that owns the configuration and the run registry. Every top-level
//! run is a spawned tokio task, tracked by the registry until it settles.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::resume_unwind;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use tokio::task::JoinHandle;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::cause::{Cause, Exit};
use crate::config::Config;
use crate::effect::node::{reify_exit, Env, ErasedExit, Node};
use crate::effect::Effect;
use crate::errors::Squashed;
use crate::interpreter::{interpret, LoopSettings};
use crate::interrupt::{CancelHandle, InterruptToken};
use crate::registry::RunRegistry;

/// Identifier attached to the tracing span of one top-level run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub struct Runtime {
    config: Config,
    registry: RunRegistry,
}

impl Runtime {
    /// Create a runtime (pure instantiation, nothing is spawned)
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: RunRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn loop_settings(&self) -> LoopSettings {
        LoopSettings::new(self.config.interpreter.yield_interval)
    }

    /* ===================== Running Effects ===================== */

    /// Run `effect` with `environment` on a new task.
    ///
    /// Must be called from within a tokio runtime. Without a `token` the run gets its own.
    pub fn execute_in<R, E, A>(
        &self,
        effect: Effect<R, E, A>,
        environment: R,
        token: Option<InterruptToken>,
    ) -> RunHandle<E, A>
    where
        R: Send + Sync + 'static,
        E: Send + 'static,
        A: Send + 'static,
    {
        let environment: Env = Arc::new(environment);
        self.launch(effect.into_node(), environment, token.unwrap_or_default())
    }

    /// Run `effect` with the default (empty) environment
    pub fn execute<R, E, A>(
        &self,
        effect: Effect<R, E, A>,
        token: Option<InterruptToken>,
    ) -> RunHandle<E, A>
    where
        R: Default + Send + Sync + 'static,
        E: Send + 'static,
        A: Send + 'static,
    {
        self.execute_in(effect, R::default(), token)
    }

    /// Run `effect` and hand back a handle that interrupts it
    pub fn execute_with_cancel<R, E, A>(
        &self,
        effect: Effect<R, E, A>,
    ) -> (RunHandle<E, A>, CancelHandle)
    where
        R: Default + Send + Sync + 'static,
        E: Send + 'static,
        A: Send + 'static,
    {
        let token = InterruptToken::new();
        let cancel = CancelHandle::new(token.clone());
        (self.execute(effect, Some(token)), cancel)
    }

    /// Run `effect` and collapse a failure into a single error
    pub async fn execute_or_throw<R, E, A>(
        &self,
        effect: Effect<R, E, A>,
        token: Option<InterruptToken>,
    ) -> Result<A, Squashed<E>>
    where
        R: Default + Send + Sync + 'static,
        E: Send + 'static,
        A: Send + 'static,
    {
        self.execute(effect, token)
            .await
            .into_result()
            .map_err(Cause::squash)
    }

    /// Start `effect` in the background
    pub fn fork<R, E, A>(&self, effect: Effect<R, E, A>) -> CancelHandle
    where
        R: Default + Send + Sync + 'static,
        E: Send + 'static,
        A: Send + 'static,
    {
        let (_run, cancel) = self.execute_with_cancel(effect);
        cancel
    }

    /// Start `effect` in the background and call `on_exit` once it settles
    pub fn fork_with<R, E, A, F>(&self, effect: Effect<R, E, A>, on_exit: F) -> CancelHandle
    where
        R: Default + Send + Sync + 'static,
        E: Send + 'static,
        A: Send + 'static,
        F: FnOnce(Exit<E, A>) + Send + 'static,
    {
        let (run, cancel) = self.execute_with_cancel(effect);
        tokio::spawn(self.registry.track(async move { on_exit(run.await) }));
        cancel
    }

    /* ===================== Registry ===================== */

    /// Wait for every in-flight run to settle
    pub async fn drain(&self) {
        self.registry.drain().await;
    }

    /// Forget in-flight runs without waiting for them
    pub fn reset(&self) {
        self.registry.reset();
    }

    pub fn in_flight(&self) -> usize {
        self.registry.in_flight()
    }

    fn launch<E, A>(&self, node: Node, environment: Env, token: InterruptToken) -> RunHandle<E, A> {
        let run_id = RunId::new();
        let settings = self.loop_settings();

        let run = async move {
            debug!("Run started");
            let exit = interpret(node, environment, token, settings).await;
            debug!(outcome = exit.describe(), "Run settled");
            exit
        }
        .instrument(info_span!("run", run_id = %run_id));

        RunHandle {
            run_id,
            task: tokio::spawn(self.registry.track(run)),
            _marker: PhantomData,
        }
    }
}

/* ===================== Run Handle ===================== */

/// Future of one run's exit.
///
/// Dropping the handle detaches from the run without stopping it.
pub struct RunHandle<E, A> {
    run_id: RunId,
    task: JoinHandle<ErasedExit>,
    _marker: PhantomData<fn() -> (E, A)>,
}

impl<E, A> RunHandle<E, A> {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}

impl<E: 'static, A: 'static> Future for RunHandle<E, A> {
    type Output = Exit<E, A>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(exit)) => Poll::Ready(reify_exit(exit)),
            Poll::Ready(Err(error)) if error.is_panic() => resume_unwind(error.into_panic()),
            Poll::Ready(Err(_)) => Poll::Ready(Exit::interrupt()),
        }
    }
}
