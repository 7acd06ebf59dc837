//! Effect descriptions
//!
//! An `Effect<R, E, A>` describes a computation that needs an environment `R`, may fail
//! with a typed error `E` and succeeds with an `A`. Building an effect performs no work.
//! Effects are single-use, like futures: running one consumes it.
//!
//! ## Module Organization
//! - `node` - the erased node algebra the interpreter walks
//! - constructors live here
//! - `combinators` - sequencing, error handling, resources, concurrency
//! - `environment` - environment and service access

mod combinators;
mod environment;
pub(crate) mod node;

use std::future::Future;
use std::marker::PhantomData;

use futures_util::FutureExt;

use crate::adapter::OnInterrupt;
use crate::cause::{Cause, Defect, Exit};
use node::{erase, erase_cause, Erased, Node, Promise, WrappedCause};

pub use combinators::{all, bracket, bracket_exit, for_each_par};
pub use environment::{asks, environment, service, service_with};

/* ===================== Effect ===================== */

#[must_use = "effects do nothing unless executed"]
pub struct Effect<R, E, A> {
    pub(crate) node: Node,
    _marker: PhantomData<fn(R) -> (E, A)>,
}

impl<R, E, A> Effect<R, E, A> {
    pub(crate) fn from_node(node: Node) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    pub(crate) fn into_node(self) -> Node {
        self.node
    }
}

/* ===================== Constructors ===================== */

pub fn succeed<R, E, A>(value: A) -> Effect<R, E, A>
where
    A: Send + 'static,
{
    Effect::from_node(Node::Succeed(erase(value)))
}

pub fn unit<R, E>() -> Effect<R, E, ()> {
    Effect::from_node(Node::Succeed(erase(())))
}

/// Success computed when the effect runs
pub fn succeed_lazy<R, E, A, F>(f: F) -> Effect<R, E, A>
where
    A: Send + 'static,
    F: FnOnce() -> A + Send + 'static,
{
    Effect::from_node(Node::SucceedLazy(Box::new(move || Ok(erase(f())))))
}

/// Fallible thunk whose `Err` becomes a typed failure
pub fn try_succeed<R, E, A, F>(f: F) -> Effect<R, E, A>
where
    E: Send + 'static,
    A: Send + 'static,
    F: FnOnce() -> Result<A, E> + Send + 'static,
{
    try_catch(f, |error| error)
}

/// Fallible thunk whose error is mapped into the typed channel with `on_error`
pub fn try_catch<R, E, A, X, F, G>(f: F, on_error: G) -> Effect<R, E, A>
where
    E: Send + 'static,
    A: Send + 'static,
    F: FnOnce() -> Result<A, X> + Send + 'static,
    G: FnOnce(X) -> E + Send + 'static,
{
    let thunk = move || match f() {
        Ok(value) => Ok(erase(value)),
        Err(error) => Err(WrappedCause::fail(on_error(error))),
    };
    Effect::from_node(Node::SucceedLazy(Box::new(thunk)))
}

pub fn fail<R, E, A>(error: E) -> Effect<R, E, A>
where
    E: Send + 'static,
{
    fail_cause(Cause::fail(error))
}

pub fn fail_cause<R, E, A>(cause: Cause<E>) -> Effect<R, E, A>
where
    E: Send + 'static,
{
    Effect::from_node(Node::Fail(erase_cause(cause)))
}

/// Fail with a defect
pub fn halt<R, E, A>(defect: impl Into<Defect>) -> Effect<R, E, A> {
    Effect::from_node(Node::die(defect.into()))
}

/// Lift a finished exit back into an effect
pub fn done<R, E, A>(exit: Exit<E, A>) -> Effect<R, E, A>
where
    E: Send + 'static,
    A: Send + 'static,
{
    match exit {
        Exit::Success(value) => succeed(value),
        Exit::Failure(cause) => fail_cause(cause),
    }
}

/// Build the effect only when it runs
pub fn defer<R, E, A, F>(f: F) -> Effect<R, E, A>
where
    F: FnOnce() -> Effect<R, E, A> + Send + 'static,
{
    Effect::from_node(Node::Defer(Box::new(move || f().into_node())))
}

/// Interrupt the running effect
pub fn interrupt<R, E, A>() -> Effect<R, E, A> {
    Effect::from_node(Node::Interrupt)
}

/// Bridge a host future into an effect.
///
/// `factory` is called once, when the effect runs, and receives the hooks handle it can
/// use to cancel the underlying operation on interruption. A rejection `X` is turned into
/// a cause with `on_reject`.
pub fn lift_future<R, E, A, X, F, Fut, G>(factory: F, on_reject: G) -> Effect<R, E, A>
where
    E: Send + 'static,
    A: Send + 'static,
    X: Send + 'static,
    F: FnOnce(OnInterrupt) -> Fut + Send + 'static,
    Fut: Future<Output = Result<A, X>> + Send + 'static,
    G: FnOnce(X) -> Cause<E> + Send + 'static,
{
    let factory = move |hooks: OnInterrupt| {
        let future = factory(hooks);
        async move {
            future
                .await
                .map(erase)
                .map_err(|error| Box::new(error) as Erased)
        }
        .boxed()
    };
    let on_reject = move |error: Erased| match error.downcast::<X>() {
        Ok(error) => erase_cause(on_reject(*error)),
        Err(_) => Cause::Die(Defect::msg("future rejected with an unexpected error type")),
    };

    Effect::from_node(Node::LiftPromise(Promise {
        factory: Box::new(factory),
        on_reject: Box::new(on_reject),
    }))
}

/// Bridge a host future whose rejection is a typed failure
pub fn promise<R, E, A, F, Fut>(factory: F) -> Effect<R, E, A>
where
    E: Send + 'static,
    A: Send + 'static,
    F: FnOnce(OnInterrupt) -> Fut + Send + 'static,
    Fut: Future<Output = Result<A, E>> + Send + 'static,
{
    lift_future(factory, Cause::fail)
}

/// Bridge a future that has no interrupt hooks of its own
pub fn from_future<R, E, A, Fut>(future: Fut) -> Effect<R, E, A>
where
    E: Send + 'static,
    A: Send + 'static,
    Fut: Future<Output = Result<A, E>> + Send + 'static,
{
    promise(move |_| future)
}
