//! Sequencing, error handling and laziness

use std::num::ParseIntError;
use std::sync::atomic::Ordering;

use super::helpers::{count, counter, run};
use crate::cause::{Cause, Defect, Exit};
use crate::effect::{
    defer, done, fail, from_future, halt, interrupt, lift_future, succeed, succeed_lazy,
    try_catch, try_succeed, Effect,
};

type Eff<A> = Effect<(), &'static str, A>;

fn double(n: i32) -> Eff<i32> {
    succeed(n * 2)
}

fn add_three(n: i32) -> Eff<i32> {
    succeed(n + 3)
}

#[tokio::test]
async fn test_chain_passes_value() {
    let effect: Eff<i32> = succeed(1).chain(|n| succeed(n + 1));
    assert_eq!(run(effect).await, Exit::Success(2));
}

#[tokio::test]
async fn test_fail_gives_exact_cause() {
    let effect: Eff<()> = fail("boom");
    assert_eq!(run(effect).await, Exit::Failure(Cause::fail("boom")));
}

#[tokio::test]
async fn test_failure_skips_continuations() {
    let reached = counter();
    let flag = reached.clone();
    let effect: Eff<i32> = fail("boom").map(move |n: i32| {
        flag.fetch_add(1, Ordering::SeqCst);
        n
    });

    assert_eq!(run(effect).await, Exit::fail("boom"));
    assert_eq!(count(&reached), 0);
}

#[tokio::test]
async fn test_map_identity_law() {
    let mapped: Eff<i32> = succeed(5).map(|n| n);
    assert_eq!(run(mapped).await, run(succeed::<(), &str, _>(5)).await);
}

#[tokio::test]
async fn test_chain_associativity_law() {
    let left: Eff<i32> = succeed(4).chain(double).chain(add_three);
    let right: Eff<i32> = succeed(4).chain(|n| double(n).chain(add_three));

    let left = run(left).await;
    assert_eq!(left, Exit::Success(11));
    assert_eq!(left, run(right).await);
}

#[tokio::test]
async fn test_construction_performs_no_work() {
    let calls = counter();

    let lazy_calls = calls.clone();
    let lazy: Eff<()> = succeed_lazy(move || {
        lazy_calls.fetch_add(1, Ordering::SeqCst);
    });
    let deferred_calls = calls.clone();
    let deferred: Eff<()> = defer(move || {
        deferred_calls.fetch_add(1, Ordering::SeqCst);
        succeed(())
    });
    assert_eq!(count(&calls), 0);

    assert!(run(lazy.chain(|_| deferred)).await.is_success());
    assert_eq!(count(&calls), 2);
}

#[tokio::test]
async fn test_panic_in_continuation_is_a_defect() {
    let effect: Eff<i32> = succeed(1).map(|_: i32| -> i32 { panic!("kaboom") });

    let exit = run(effect).await;
    let defects = exit.cause().map(Cause::defects).unwrap_or_default();
    assert_eq!(defects.len(), 1);
    assert!(defects[0].to_string().contains("kaboom"));
}

#[tokio::test]
async fn test_panic_in_thunk_is_a_defect() {
    let effect: Eff<i32> = succeed_lazy(|| panic!("lazy kaboom"));
    let exit = run(effect).await;
    assert!(exit.is_failure());
    assert!(!exit.is_interrupted());
}

#[tokio::test]
async fn test_try_catch_maps_error() {
    let parsed: Effect<(), String, i32> =
        try_catch(|| "12".parse::<i32>(), |error: ParseIntError| error.to_string());
    assert_eq!(run(parsed).await, Exit::Success(12));

    let rejected: Effect<(), String, i32> =
        try_catch(|| "twelve".parse::<i32>(), |error: ParseIntError| error.to_string());
    match run(rejected).await {
        Exit::Failure(cause) => {
            assert_eq!(cause.failures().len(), 1);
            assert!(cause.failures()[0].contains("invalid digit"));
        }
        Exit::Success(n) => panic!("unexpected success {}", n),
    }
}

#[tokio::test]
async fn test_try_succeed_keeps_typed_error() {
    let effect: Eff<i32> = try_succeed(|| Err("nope"));
    assert_eq!(run(effect).await, Exit::fail("nope"));
}

#[tokio::test]
async fn test_catch_all_recovers() {
    let effect: Eff<usize> = fail("boom").catch_all(|error: &str| succeed(error.len()));
    assert_eq!(run(effect).await, Exit::Success(4));
}

#[tokio::test]
async fn test_fold_lets_defects_through() {
    let effect: Eff<i32> =
        halt::<(), &str, i32>(Defect::msg("bad")).fold(|_| succeed(0), succeed);

    let exit = run(effect).await;
    assert_eq!(exit, Exit::die(Defect::msg("bad")));
}

#[tokio::test]
async fn test_catch_all_cause_sees_defects() {
    let effect: Eff<usize> =
        halt::<(), &str, usize>(Defect::msg("bad")).catch_all_cause(|cause| {
            succeed(cause.defects().len())
        });
    assert_eq!(run(effect).await, Exit::Success(1));
}

#[tokio::test]
async fn test_map_error() {
    let effect: Effect<(), usize, ()> = fail::<(), _, ()>("boom").map_error(|e: &str| e.len());
    assert_eq!(run(effect).await, Exit::fail(4));
}

#[tokio::test]
async fn test_result_and_either_capture_outcomes() {
    let captured: Effect<(), (), Exit<&str, i32>> = fail::<(), _, i32>("boom").result();
    assert_eq!(run(captured).await, Exit::Success(Exit::fail("boom")));

    let either: Effect<(), (), Result<i32, &str>> = succeed::<(), &str, _>(3).either();
    assert_eq!(run(either).await, Exit::Success(Ok(3)));
}

#[tokio::test]
async fn test_done_lifts_exit() {
    let effect: Eff<i32> = done(Exit::fail("lifted"));
    assert_eq!(run(effect).await, Exit::fail("lifted"));
}

#[tokio::test]
async fn test_interrupt_is_not_recoverable() {
    let effect: Eff<i32> = interrupt::<(), &str, i32>().catch_all_cause(|_| succeed(1));
    let exit = run(effect).await;
    assert!(exit.is_interrupted());
    assert_eq!(exit, Exit::interrupt());
}

#[tokio::test]
async fn test_future_rejection_is_typed_failure() {
    let effect: Eff<i32> = from_future(async { Err("rejected") });
    assert_eq!(run(effect).await, Exit::fail("rejected"));
}

#[tokio::test]
async fn test_future_resolution_continues_chain() {
    let effect: Eff<i32> = from_future(async { Ok::<i32, &str>(20) }).map(|n| n + 1);
    assert_eq!(run(effect).await, Exit::Success(21));
}

#[tokio::test]
async fn test_lift_future_maps_rejection() {
    let effect: Eff<i32> = lift_future(
        |_| async { Err::<i32, _>(500_u16) },
        |status: u16| Cause::die(Defect::msg(format!("status {}", status))),
    );
    assert_eq!(run(effect).await, Exit::die(Defect::msg("status 500")));
}
