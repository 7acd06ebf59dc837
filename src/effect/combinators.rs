//! Combinators
//!
//! Everything here only builds node trees. Continuations receive erased values and
//! downcast them back to the static type the effect was built with.

use std::sync::{Arc, Mutex};

use super::node::{erase_cause, reify_cause, unerase, Node, Subtree, Value};
use super::{done, fail_cause, succeed, unit, Effect};
use crate::cause::{Cause, Defect, Exit};
use crate::interrupt::lock;

/// Apply `f` to an erased value, turning a downcast mismatch into a defect
fn apply_erased<A, F>(value: Value, f: F) -> Node
where
    A: 'static,
    F: FnOnce(A) -> Node,
{
    match unerase::<A>(value) {
        Ok(value) => f(value),
        Err(defect) => Node::die(defect),
    }
}

/// Re-raise a cause that carries no typed failure under a different error type
fn refail<R, E, E2, A>(rest: Cause<E>) -> Effect<R, E2, A>
where
    E: Send + 'static,
{
    Effect::from_node(Node::Fail(erase_cause(rest)))
}

/* ===================== Sequencing ===================== */

impl<R, E, A> Effect<R, E, A>
where
    R: 'static,
    E: Send + 'static,
    A: Send + 'static,
{
    pub fn chain<B, F>(self, f: F) -> Effect<R, E, B>
    where
        F: FnOnce(A) -> Effect<R, E, B> + Send + 'static,
    {
        let apply = move |value: Value| apply_erased(value, |value| f(value).into_node());
        Effect::from_node(Node::Chain(Subtree::new(self.node), Box::new(apply)))
    }

    pub fn map<B, F>(self, f: F) -> Effect<R, E, B>
    where
        B: Send + 'static,
        F: FnOnce(A) -> B + Send + 'static,
    {
        self.chain(move |value| succeed(f(value)))
    }

    pub fn as_unit(self) -> Effect<R, E, ()> {
        self.chain(|_| unit())
    }

    /* ===================== Error Handling ===================== */

    /// Handle every outcome, with full access to the failure cause
    pub fn match_cause<E2, B, F, G>(self, on_cause: F, on_success: G) -> Effect<R, E2, B>
    where
        F: FnOnce(Cause<E>) -> Effect<R, E2, B> + Send + 'static,
        G: FnOnce(A) -> Effect<R, E2, B> + Send + 'static,
    {
        let recover = move |cause| on_cause(reify_cause::<E>(cause)).into_node();
        let apply = move |value: Value| apply_erased(value, |value| on_success(value).into_node());
        Effect::from_node(Node::Match(
            Subtree::new(self.node),
            Box::new(recover),
            Box::new(apply),
        ))
    }

    /// Handle typed failures and successes. Defects and interruption pass through.
    pub fn fold<E2, B, F, G>(self, on_failure: F, on_success: G) -> Effect<R, E2, B>
    where
        F: FnOnce(E) -> Effect<R, E2, B> + Send + 'static,
        G: FnOnce(A) -> Effect<R, E2, B> + Send + 'static,
    {
        self.match_cause(
            move |cause| match cause.failure_or_cause() {
                Ok(error) => on_failure(error),
                Err(rest) => refail(rest),
            },
            on_success,
        )
    }

    /// Recover from a typed failure
    pub fn catch_all<E2, F>(self, f: F) -> Effect<R, E2, A>
    where
        E2: 'static,
        F: FnOnce(E) -> Effect<R, E2, A> + Send + 'static,
    {
        self.fold(f, succeed)
    }

    /// Recover from any failure cause, defects included
    pub fn catch_all_cause<E2, F>(self, f: F) -> Effect<R, E2, A>
    where
        E2: 'static,
        F: FnOnce(Cause<E>) -> Effect<R, E2, A> + Send + 'static,
    {
        self.match_cause(f, succeed)
    }

    pub fn map_error<E2, F>(self, f: F) -> Effect<R, E2, A>
    where
        E2: Send + 'static,
        F: FnMut(E) -> E2 + Send + 'static,
    {
        self.match_cause(move |cause| fail_cause(cause.map(f)), succeed)
    }

    /// Capture the outcome as an `Exit` value
    pub fn result<E2>(self) -> Effect<R, E2, Exit<E, A>> {
        self.match_cause(
            |cause| succeed(Exit::Failure(cause)),
            |value| succeed(Exit::Success(value)),
        )
    }

    /// Move typed failures into the success channel
    pub fn either<E2>(self) -> Effect<R, E2, Result<A, E>> {
        self.fold(|error| succeed(Err(error)), |value| succeed(Ok(value)))
    }

    /* ===================== Resources ===================== */

    /// Run `finalizer` after this effect on every exit path, interruption included.
    ///
    /// A failing finalizer adds its cause after the effect's own cause.
    pub fn ensuring<X>(self, finalizer: Effect<R, E, X>) -> Effect<R, E, A> {
        Effect::from_node(Node::Ensuring(
            Subtree::new(self.node),
            Subtree::new(finalizer.into_node()),
        ))
    }
}

/* ===================== Bracket ===================== */

type Release<R, E, A, B> = Box<dyn FnOnce(A, &Exit<E, B>) -> Effect<R, E, ()> + Send>;

/// Resource and release function, held until exactly one path releases it
struct Held<R, E, A, B> {
    resource: Option<A>,
    release: Option<Release<R, E, A, B>>,
}

impl<R, E, A, B> Held<R, E, A, B> {
    fn take(&mut self) -> Option<(A, Release<R, E, A, B>)> {
        match (self.resource.take(), self.release.take()) {
            (Some(resource), Some(release)) => Some((resource, release)),
            (resource, release) => {
                self.resource = resource;
                self.release = release;
                None
            }
        }
    }
}

/// Acquire a resource, use it and release it with the use exit.
///
/// `release` runs exactly once with the real use exit, including a defect raised while
/// `use_` builds its effect. Only when the run is interrupted between acquire and release
/// does a guard finalizer run it with an interrupted exit. A release failure is added after
/// the use failure.
pub fn bracket_exit<R, E, A, B, X, Use, Rel>(
    acquire: Effect<R, E, A>,
    use_: Use,
    release: Rel,
) -> Effect<R, E, B>
where
    R: 'static,
    E: Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
    X: Send + 'static,
    Use: FnOnce(&A) -> Effect<R, E, B> + Send + 'static,
    Rel: FnOnce(A, &Exit<E, B>) -> Effect<R, E, X> + Send + 'static,
{
    let release: Release<R, E, A, B> =
        Box::new(move |resource: A, exit: &Exit<E, B>| release(resource, exit).as_unit());
    let held = Arc::new(Mutex::new(Held {
        resource: None,
        release: Some(release),
    }));

    let on_interrupt = {
        let held = held.clone();
        super::defer(move || {
            let taken = lock(&held).take();
            match taken {
                Some((resource, release)) => release(resource, &Exit::interrupt()),
                None => unit(),
            }
        })
    };

    acquire
        .chain(move |resource| {
            let use_held = held.clone();
            let used = super::defer(move || {
                let mut guard = lock(&use_held);
                use_(guard.resource.insert(resource))
            });

            used.result().chain(move |exit: Exit<E, B>| {
                let taken = lock(&held).take();
                let Some((resource, release)) = taken else {
                    return done(exit);
                };
                release(resource, &exit)
                    .result()
                    .chain(move |released: Exit<E, ()>| match (exit, released) {
                        (exit, Exit::Success(())) => done(exit),
                        (Exit::Failure(cause), Exit::Failure(release_cause)) => {
                            fail_cause(cause.then(release_cause))
                        }
                        (Exit::Success(_), Exit::Failure(release_cause)) => {
                            fail_cause(release_cause)
                        }
                    })
            })
        })
        .ensuring(on_interrupt)
}

/// `bracket_exit` for release functions that do not care how `use_` ended
pub fn bracket<R, E, A, B, X, Use, Rel>(
    acquire: Effect<R, E, A>,
    use_: Use,
    release: Rel,
) -> Effect<R, E, B>
where
    R: 'static,
    E: Send + 'static,
    A: Send + 'static,
    B: Send + 'static,
    X: Send + 'static,
    Use: FnOnce(&A) -> Effect<R, E, B> + Send + 'static,
    Rel: FnOnce(A) -> Effect<R, E, X> + Send + 'static,
{
    bracket_exit(acquire, use_, move |resource, _: &Exit<E, B>| release(resource))
}

/* ===================== Concurrency ===================== */

/// Run every effect concurrently and collect the results in input order.
///
/// When any effect fails, the others are interrupted and every failure is combined
/// with `Cause::both`.
pub fn all<R, E, A, I>(effects: I) -> Effect<R, E, Vec<A>>
where
    R: 'static,
    E: Send + 'static,
    A: Send + 'static,
    I: IntoIterator<Item = Effect<R, E, A>>,
{
    let children = effects.into_iter().map(Effect::into_node).collect();
    Effect::<R, E, Vec<Value>>::from_node(Node::All(children)).chain(|values| {
        match values
            .into_iter()
            .map(unerase::<A>)
            .collect::<Result<Vec<A>, Defect>>()
        {
            Ok(values) => succeed(values),
            Err(defect) => super::halt(defect),
        }
    })
}

/// Apply `f` to every item and run the resulting effects concurrently
pub fn for_each_par<R, E, A, T, I, F>(items: I, f: F) -> Effect<R, E, Vec<A>>
where
    R: 'static,
    E: Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Effect<R, E, A> + Send + 'static,
{
    let items: Vec<T> = items.into_iter().collect();
    super::defer(move || all(items.into_iter().map(f)))
}

