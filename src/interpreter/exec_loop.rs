//! Core execution loop
//!
//! `interpret` walks a node tree with an explicit frame stack instead of native recursion,
//! so arbitrarily long chains run in constant native stack space.
//!
//! ## Function Organization
//! 1. interpret() - entry point, boxes one interpreter run
//! 2. Interpreter::run() - the trampoline (interruption check, yield, step)
//! 3. Interpreter::step() - dispatch on one node
//! 4. resume() / unwind_stack() / finish_interrupted() - frame handling

use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, trace, warn};

use super::frames::{Cleanup, Frame, FrameStack};
use crate::adapter::{FutureAdapter, Rejection};
use crate::cause::{Cause, Defect, Exit};
use crate::effect::node::{Env, ErasedCause, ErasedExit, Node, Promise, Thunk, Value};
use crate::interrupt::InterruptToken;

/* ===================== Public API ===================== */

/// Settings shared by every interpreter of one run
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopSettings {
    /// Nodes processed between voluntary yields to the scheduler
    pub(crate) yield_interval: u64,
}

impl LoopSettings {
    pub(crate) fn new(yield_interval: u32) -> Self {
        Self {
            yield_interval: u64::from(yield_interval.max(1)),
        }
    }
}

/// Interpret `node` under `environment` until it succeeds, fails or is interrupted
pub(crate) fn interpret(
    node: Node,
    environment: Env,
    token: InterruptToken,
    settings: LoopSettings,
) -> BoxFuture<'static, ErasedExit> {
    Interpreter::new(environment, token, settings)
        .run(node)
        .boxed()
}

/* ===================== Interpreter ===================== */

/// Result of processing one node
pub(super) enum Step {
    /// Keep going with the next node
    Continue(Node),
    /// The frame stack is empty and the run settled
    Done(Result<Value, ErasedCause>),
    /// The run observed interruption
    Interrupted,
}

pub(super) struct Interpreter {
    frames: FrameStack,
    environment: Env,
    pub(super) token: InterruptToken,
    pub(super) settings: LoopSettings,
    instructions: u64,
    /// Finalizer failures collected while unwinding an interrupted run
    suppressed: ErasedCause,
}

impl Interpreter {
    fn new(environment: Env, token: InterruptToken, settings: LoopSettings) -> Self {
        Self {
            frames: FrameStack::default(),
            environment,
            token,
            settings,
            instructions: 0,
            suppressed: Cause::Empty,
        }
    }

    pub(super) fn environment(&self) -> &Env {
        &self.environment
    }

    async fn run(mut self, root: Node) -> ErasedExit {
        let mut current = root;

        // None once interruption is observed
        let settled = loop {
            self.tick().await;
            if self.token.is_interrupted() {
                break None;
            }

            match self.step(current).await {
                Step::Continue(next) => current = next,
                Step::Done(result) => break Some(result),
                Step::Interrupted => break None,
            }
        };

        match settled {
            Some(Ok(value)) => Exit::Success(value),
            Some(Err(cause)) => Exit::Failure(cause),
            None => self.finish_interrupted().await,
        }
    }

    /// Count one instruction and periodically hand control back to the scheduler
    async fn tick(&mut self) {
        self.instructions += 1;
        if self.instructions % self.settings.yield_interval == 0 {
            trace!(instructions = self.instructions, "Yielding to the scheduler");
            tokio::task::yield_now().await;
        }
    }

    async fn step(&mut self, node: Node) -> Step {
        trace!(node = node.kind(), frames = self.frames.len(), "Step");

        match node {
            Node::Chain(inner, apply) => match inner.into_node() {
                Node::Succeed(value) => Step::Continue(guarded(move || apply(value))),
                Node::SucceedLazy(thunk) => match evaluate(thunk) {
                    Ok(value) => Step::Continue(guarded(move || apply(value))),
                    Err(cause) => Step::Continue(Node::Fail(cause)),
                },
                inner => {
                    self.frames.push(Frame::Apply(apply));
                    Step::Continue(inner)
                }
            },

            Node::Match(inner, recover, apply) => {
                self.frames.push(Frame::Fold { recover, apply });
                Step::Continue(inner.into_node())
            }

            Node::Defer(factory) => Step::Continue(guarded(factory)),

            Node::Succeed(value) => self.resume(value).await,

            Node::SucceedLazy(thunk) => match evaluate(thunk) {
                Ok(value) => Step::Continue(Node::Succeed(value)),
                Err(cause) => Step::Continue(Node::Fail(cause)),
            },

            Node::Fail(cause) => self.unwind_stack(cause).await,

            Node::Interrupt => {
                debug!("Effect interrupted itself");
                self.token.interrupt();
                Step::Interrupted
            }

            Node::Asks(read) => {
                let environment = self.environment.clone();
                Step::Continue(guarded(move || read(&environment)))
            }

            Node::Give(inner, environment) => {
                let previous = mem::replace(&mut self.environment, environment);
                self.frames.push(Frame::Finalizer(Cleanup::Restore(previous)));
                Step::Continue(inner.into_node())
            }

            Node::All(children) => self.join_group(children).await,

            Node::LiftPromise(promise) => self.await_promise(promise).await,

            Node::Ensuring(inner, finalizer) => {
                self.frames.push(Frame::Finalizer(Cleanup::Run(finalizer.into_node())));
                Step::Continue(inner.into_node())
            }
        }
    }

    async fn await_promise(&mut self, promise: Promise) -> Step {
        let Promise { factory, on_reject } = promise;
        let adapter = FutureAdapter::new(factory);

        match adapter.run(&self.token).await {
            Ok(value) => Step::Continue(Node::Succeed(value)),
            Err(Rejection::Interrupted) => Step::Interrupted,
            Err(Rejection::Rejected(error)) => {
                Step::Continue(guarded(move || Node::Fail(on_reject(error))))
            }
            Err(Rejection::Panicked(defect)) => Step::Continue(Node::die(defect)),
        }
    }

    /* ===================== Frames ===================== */

    /// Hand a value to the innermost pending continuation
    async fn resume(&mut self, value: Value) -> Step {
        loop {
            match self.frames.pop() {
                None => return Step::Done(Ok(value)),
                Some(Frame::Apply(apply)) | Some(Frame::Fold { apply, .. }) => {
                    return Step::Continue(guarded(move || apply(value)));
                }
                Some(Frame::Finalizer(Cleanup::Restore(environment))) => {
                    self.environment = environment;
                }
                Some(Frame::Finalizer(Cleanup::Run(finalizer))) => {
                    let environment = self.environment.clone();
                    if let Err(cause) = run_finalizer(finalizer, environment, self.settings).await {
                        return Step::Continue(Node::Fail(cause));
                    }
                }
            }
        }
    }

    /// Propagate a failure to the innermost `Fold` frame, running finalizers on the way
    async fn unwind_stack(&mut self, mut cause: ErasedCause) -> Step {
        loop {
            match self.frames.pop() {
                None => return Step::Done(Err(cause)),
                Some(Frame::Apply(_)) => {}
                Some(Frame::Fold { recover, .. }) => {
                    return Step::Continue(guarded(move || recover(cause)));
                }
                Some(Frame::Finalizer(Cleanup::Restore(environment))) => {
                    self.environment = environment;
                }
                Some(Frame::Finalizer(Cleanup::Run(finalizer))) => {
                    let environment = self.environment.clone();
                    let finalized = run_finalizer(finalizer, environment, self.settings).await;
                    if let Err(finalizer_cause) = finalized {
                        cause = cause.then(finalizer_cause);
                    }
                }
            }
        }
    }

    /// Drop every pending continuation and run the remaining finalizers
    async fn finish_interrupted(&mut self) -> ErasedExit {
        debug!(
            pending_frames = self.frames.len(),
            instructions = self.instructions,
            "Unwinding interrupted run"
        );

        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::Finalizer(Cleanup::Restore(environment)) => {
                    self.environment = environment;
                }
                Frame::Finalizer(Cleanup::Run(finalizer)) => {
                    let environment = self.environment.clone();
                    if let Err(cause) = run_finalizer(finalizer, environment, self.settings).await {
                        self.suppressed = mem::take(&mut self.suppressed).then(cause);
                    }
                }
                Frame::Apply(_) | Frame::Fold { .. } => {}
            }
        }

        Exit::Failure(Cause::Interrupt.then(mem::take(&mut self.suppressed)))
    }
}

/// Run a finalizer to completion under its own token, so interruption of the surrounding
/// run cannot cut it short
async fn run_finalizer(
    finalizer: Node,
    environment: Env,
    settings: LoopSettings,
) -> Result<(), ErasedCause> {
    match interpret(finalizer, environment, InterruptToken::new(), settings).await {
        Exit::Success(_) => Ok(()),
        Exit::Failure(cause) => {
            warn!(cause = ?cause, "Finalizer failed");
            Err(cause)
        }
    }
}

/* ===================== User Callbacks ===================== */

/// Run a user callback, turning a panic into a defect
fn guarded<F>(f: F) -> Node
where
    F: FnOnce() -> Node,
{
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Node::die(Defect::from_panic(payload)))
}

/// Evaluate a lazy success thunk
fn evaluate(thunk: Thunk) -> Result<Value, ErasedCause> {
    match catch_unwind(AssertUnwindSafe(thunk)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(wrapped)) => Err(wrapped.0),
        Err(payload) => Err(Cause::Die(Defect::from_panic(payload))),
    }
}
