//! bracket and ensuring

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::helpers::{count, counter, delayed, never, run, run_and_cancel};
use crate::cause::{Cause, Exit};
use crate::effect::{bracket, bracket_exit, fail, succeed, succeed_lazy, unit, Effect};

type Eff<A> = Effect<(), &'static str, A>;

fn release_into(released: Arc<AtomicUsize>) -> impl FnOnce(String) -> Eff<()> + Send + 'static {
    move |_handle| {
        succeed_lazy(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }
}

fn acquire() -> Eff<String> {
    succeed("handle".to_string())
}

#[tokio::test]
async fn test_bracket_releases_after_success() {
    let released = counter();
    let effect: Eff<usize> = bracket(
        acquire(),
        |handle: &String| succeed(handle.len()),
        release_into(released.clone()),
    );

    assert_eq!(run(effect).await, Exit::Success(6));
    assert_eq!(count(&released), 1);
}

#[tokio::test]
async fn test_bracket_releases_after_failure() {
    let released = counter();
    let effect: Eff<usize> = bracket(
        acquire(),
        |_: &String| fail("use"),
        release_into(released.clone()),
    );

    assert_eq!(run(effect).await, Exit::fail("use"));
    assert_eq!(count(&released), 1);
}

#[tokio::test]
async fn test_bracket_releases_on_interruption() {
    let released = counter();
    let fired = counter();
    let saw_interrupt = Arc::new(AtomicBool::new(false));

    let saw = saw_interrupt.clone();
    let release_count = released.clone();
    let effect: Eff<i32> = bracket_exit(
        acquire(),
        {
            let fired = fired.clone();
            move |_: &String| never(fired)
        },
        move |_handle: String, exit: &Exit<&'static str, i32>| {
            saw.store(exit.is_interrupted(), Ordering::SeqCst);
            release_count.fetch_add(1, Ordering::SeqCst);
            unit()
        },
    );

    let exit = run_and_cancel(effect, Duration::from_millis(10)).await;
    assert!(exit.is_interrupted());
    assert_eq!(count(&released), 1);
    assert_eq!(count(&fired), 1);
    assert!(saw_interrupt.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_release_failure_after_success() {
    let effect: Eff<usize> = bracket(
        acquire(),
        |handle: &String| succeed(handle.len()),
        |_: String| fail::<(), _, ()>("release"),
    );
    assert_eq!(run(effect).await, Exit::fail("release"));
}

#[tokio::test]
async fn test_release_failure_follows_use_failure() {
    let effect: Eff<usize> = bracket(
        acquire(),
        |_: &String| fail("use"),
        |_: String| fail::<(), _, ()>("release"),
    );
    assert_eq!(
        run(effect).await,
        Exit::Failure(Cause::fail("use").then(Cause::fail("release")))
    );
}

#[tokio::test]
async fn test_failed_acquire_skips_release() {
    let released = counter();
    let effect: Eff<usize> = bracket(
        fail("acquire"),
        |handle: &String| succeed(handle.len()),
        release_into(released.clone()),
    );

    assert_eq!(run(effect).await, Exit::fail("acquire"));
    assert_eq!(count(&released), 0);
}

#[tokio::test]
async fn test_ensuring_failure_is_sequenced_after_cause() {
    let effect: Eff<i32> = fail("main").ensuring(fail::<(), _, ()>("finalizer"));
    assert_eq!(
        run(effect).await,
        Exit::Failure(Cause::fail("main").then(Cause::fail("finalizer")))
    );

    let effect: Eff<i32> = succeed(1).ensuring(fail::<(), _, ()>("finalizer"));
    assert_eq!(run(effect).await, Exit::fail("finalizer"));
}

#[tokio::test]
async fn test_ensuring_runs_before_continuation() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let finalizer_log = log.clone();
    let after_log = log.clone();
    let effect: Eff<i32> = succeed(1)
        .ensuring(succeed_lazy(move || finalizer_log.lock().unwrap().push("finalizer")))
        .map(move |n| {
            after_log.lock().unwrap().push("after");
            n
        });

    assert_eq!(run(effect).await, Exit::Success(1));
    assert_eq!(*log.lock().unwrap(), vec!["finalizer", "after"]);
}

#[tokio::test]
async fn test_finalizer_is_not_cut_short_by_interruption() {
    let fired = counter();
    let finished = counter();

    let done = finished.clone();
    let finalizer: Eff<()> = delayed(20, Ok(())).map(move |_: ()| {
        done.fetch_add(1, Ordering::SeqCst);
    });
    let effect: Eff<i32> = never(fired.clone()).ensuring(finalizer);

    let exit = run_and_cancel(effect, Duration::from_millis(10)).await;
    assert!(exit.is_interrupted());
    assert_eq!(count(&finished), 1);
}

#[tokio::test]
async fn test_finalizer_failure_is_kept_on_interruption() {
    let effect: Eff<i32> = never(counter()).ensuring(fail::<(), _, ()>("cleanup"));

    let exit = run_and_cancel(effect, Duration::from_millis(10)).await;
    assert!(exit.is_interrupted());
    let cause = exit.cause().cloned().unwrap_or_default();
    assert_eq!(cause.failures(), vec![&"cleanup"]);
}

#[tokio::test]
async fn test_release_sees_defect_when_use_panics() {
    let released = counter();
    let seen: Arc<Mutex<Option<Exit<&'static str, i32>>>> = Arc::new(Mutex::new(None));

    let release_seen = seen.clone();
    let release_count = released.clone();
    let effect: Eff<i32> = bracket_exit(
        acquire(),
        |_: &String| -> Eff<i32> { panic!("use blew up") },
        move |_handle: String, exit: &Exit<&'static str, i32>| {
            *release_seen.lock().unwrap() = Some(exit.clone());
            release_count.fetch_add(1, Ordering::SeqCst);
            unit()
        },
    );

    let exit = run(effect).await;
    assert!(!exit.is_interrupted());
    let defects = exit.cause().map(Cause::defects).unwrap_or_default();
    assert_eq!(defects.len(), 1);
    assert!(defects[0].to_string().contains("use blew up"));

    assert_eq!(count(&released), 1);
    let seen = seen.lock().unwrap().take().unwrap_or_else(Exit::interrupt);
    assert!(!seen.is_interrupted());
    assert_eq!(seen, exit);
}
