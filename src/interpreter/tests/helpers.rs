//! Test helpers for interpreter tests
//!
//! Common utilities for running effects and building host futures

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::OnInterrupt;
use crate::cause::Exit;
use crate::config::Config;
use crate::effect::{from_future, promise, Effect};
use crate::runtime::Runtime;

pub fn runtime() -> Runtime {
    Runtime::new(Config::default())
}

/// Run an effect with the unit environment and wait for its exit
pub async fn run<E, A>(effect: Effect<(), E, A>) -> Exit<E, A>
where
    E: Send + 'static,
    A: Send + 'static,
{
    runtime().execute(effect, None).await
}

/// Run an effect, cancel it after `delay` and wait for its exit
pub async fn run_and_cancel<E, A>(effect: Effect<(), E, A>, delay: Duration) -> Exit<E, A>
where
    E: Send + 'static,
    A: Send + 'static,
{
    let runtime = runtime();
    let (run, cancel) = runtime.execute_with_cancel(effect);
    tokio::time::sleep(delay).await;
    cancel.cancel();
    run.await
}

/// Host future that never resolves. Its interrupt hook bumps `fired`.
pub fn never<R, E, A>(fired: Arc<AtomicUsize>) -> Effect<R, E, A>
where
    E: Send + 'static,
    A: Send + 'static,
{
    promise(move |hooks: OnInterrupt| {
        hooks.register(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        futures_util::future::pending::<Result<A, E>>()
    })
}

/// Host future that settles with `outcome` after `millis`
pub fn delayed<R, E, A>(millis: u64, outcome: Result<A, E>) -> Effect<R, E, A>
where
    E: Send + 'static,
    A: Send + 'static,
{
    from_future(async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        outcome
    })
}

pub fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
