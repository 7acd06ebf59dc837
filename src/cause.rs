//! Failure causes and terminal results
//!
//! A `Cause` records everything that went wrong in a run: typed failures, defects and
//! interruption markers, combined sequentially (`then`) or in parallel (`both`).
//! An `Exit` is the terminal result of a run: a success value or a failure cause.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::errors::Squashed;

/* ===================== Defect ===================== */

/// An unexpected, unmodeled failure.
///
/// Defects are not part of an effect's typed error channel. They come from `halt`, from
/// panics inside user callbacks and from missing services.
#[derive(Clone)]
pub struct Defect(Arc<anyhow::Error>);

impl Defect {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(error.into()))
    }

    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// Build a defect from the payload of a caught panic
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::msg(format!("panicked: {}", message))
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for Defect {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Debug for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Defect({})", self.0)
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// Defects compare by message
impl PartialEq for Defect {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.to_string() == other.0.to_string()
    }
}

/* ===================== Cause ===================== */

#[derive(Debug, Clone, PartialEq)]
pub enum Cause<E> {
    /// No failure at all (identity for `then` and `both`)
    Empty,
    /// A typed, recoverable failure
    Fail(E),
    /// A defect
    Die(Defect),
    /// Interruption marker
    Interrupt,
    /// Sequential composition: the left cause happened first
    Then(Box<Cause<E>>, Box<Cause<E>>),
    /// Parallel composition: both causes happened concurrently
    Both(Box<Cause<E>>, Box<Cause<E>>),
}

impl<E> Default for Cause<E> {
    fn default() -> Self {
        Cause::Empty
    }
}

impl<E> Cause<E> {
    pub fn empty() -> Self {
        Cause::Empty
    }

    pub fn fail(error: E) -> Self {
        Cause::Fail(error)
    }

    pub fn die(defect: impl Into<Defect>) -> Self {
        Cause::Die(defect.into())
    }

    pub fn interrupt() -> Self {
        Cause::Interrupt
    }

    /// Sequential composition. Empty causes are dropped.
    pub fn then(self, next: Cause<E>) -> Self {
        if self.is_empty() {
            next
        } else if next.is_empty() {
            self
        } else {
            Cause::Then(Box::new(self), Box::new(next))
        }
    }

    /// Parallel composition. Empty causes are dropped.
    pub fn both(self, other: Cause<E>) -> Self {
        if self.is_empty() {
            other
        } else if other.is_empty() {
            self
        } else {
            Cause::Both(Box::new(self), Box::new(other))
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cause::Empty => true,
            Cause::Then(left, right) | Cause::Both(left, right) => {
                left.is_empty() && right.is_empty()
            }
            _ => false,
        }
    }

    /// Whether the cause contains an interruption marker anywhere
    pub fn is_interrupted(&self) -> bool {
        match self {
            Cause::Interrupt => true,
            Cause::Then(left, right) | Cause::Both(left, right) => {
                left.is_interrupted() || right.is_interrupted()
            }
            _ => false,
        }
    }

    /// Whether the cause is interruption and nothing else
    pub fn is_interrupted_only(&self) -> bool {
        self.is_interrupted() && !self.has_failure() && self.defects().is_empty()
    }

    pub fn has_failure(&self) -> bool {
        match self {
            Cause::Fail(_) => true,
            Cause::Then(left, right) | Cause::Both(left, right) => {
                left.has_failure() || right.has_failure()
            }
            _ => false,
        }
    }

    /// Typed failures, left to right
    pub fn failures(&self) -> Vec<&E> {
        let mut failures = Vec::new();
        self.visit(&mut |cause| {
            if let Cause::Fail(error) = cause {
                failures.push(error);
            }
        });
        failures
    }

    /// Defects, left to right
    pub fn defects(&self) -> Vec<&Defect> {
        let mut defects = Vec::new();
        self.visit(&mut |cause| {
            if let Cause::Die(defect) = cause {
                defects.push(defect);
            }
        });
        defects
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Cause<E>)) {
        match self {
            Cause::Then(left, right) | Cause::Both(left, right) => {
                left.visit(f);
                right.visit(f);
            }
            leaf => f(leaf),
        }
    }

    /// Split off the first typed failure, or hand back the whole cause if there is none
    pub fn failure_or_cause(self) -> Result<E, Cause<E>> {
        match self {
            Cause::Fail(error) => Ok(error),
            Cause::Then(left, right) => match (*left).failure_or_cause() {
                Ok(error) => Ok(error),
                Err(left) => (*right)
                    .failure_or_cause()
                    .map_err(|right| Cause::Then(Box::new(left), Box::new(right))),
            },
            Cause::Both(left, right) => match (*left).failure_or_cause() {
                Ok(error) => Ok(error),
                Err(left) => (*right)
                    .failure_or_cause()
                    .map_err(|right| Cause::Both(Box::new(left), Box::new(right))),
            },
            other => Err(other),
        }
    }

    pub fn map<E2>(self, mut f: impl FnMut(E) -> E2) -> Cause<E2> {
        self.flat_map_failures(&mut |error| Cause::Fail(f(error)))
    }

    /// Replace every typed failure with a whole cause
    pub(crate) fn flat_map_failures<E2>(self, f: &mut impl FnMut(E) -> Cause<E2>) -> Cause<E2> {
        match self {
            Cause::Empty => Cause::Empty,
            Cause::Fail(error) => f(error),
            Cause::Die(defect) => Cause::Die(defect),
            Cause::Interrupt => Cause::Interrupt,
            Cause::Then(left, right) => Cause::Then(
                Box::new((*left).flat_map_failures(f)),
                Box::new((*right).flat_map_failures(f)),
            ),
            Cause::Both(left, right) => Cause::Both(
                Box::new((*left).flat_map_failures(f)),
                Box::new((*right).flat_map_failures(f)),
            ),
        }
    }

    /// Collapse the cause into one error value.
    ///
    /// The first typed failure wins, then the first defect, then interruption.
    pub fn squash(self) -> Squashed<E> {
        let interrupted = self.is_interrupted();
        let mut failures = Vec::new();
        let mut defects = Vec::new();
        self.into_leaves(&mut failures, &mut defects);

        if let Some(error) = failures.into_iter().next() {
            Squashed::Failure(error)
        } else if let Some(defect) = defects.into_iter().next() {
            Squashed::Defect(defect)
        } else if interrupted {
            Squashed::Interrupted
        } else {
            Squashed::Empty
        }
    }

    fn into_leaves(self, failures: &mut Vec<E>, defects: &mut Vec<Defect>) {
        match self {
            Cause::Fail(error) => failures.push(error),
            Cause::Die(defect) => defects.push(defect),
            Cause::Then(left, right) | Cause::Both(left, right) => {
                (*left).into_leaves(failures, defects);
                (*right).into_leaves(failures, defects);
            }
            Cause::Empty | Cause::Interrupt => {}
        }
    }
}

/* ===================== Exit ===================== */

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq)]
pub enum Exit<E, A> {
    Success(A),
    Failure(Cause<E>),
}

impl<E, A> Exit<E, A> {
    pub fn succeed(value: A) -> Self {
        Exit::Success(value)
    }

    pub fn fail(error: E) -> Self {
        Exit::Failure(Cause::fail(error))
    }

    pub fn fail_cause(cause: Cause<E>) -> Self {
        Exit::Failure(cause)
    }

    pub fn die(defect: impl Into<Defect>) -> Self {
        Exit::Failure(Cause::die(defect))
    }

    pub fn interrupt() -> Self {
        Exit::Failure(Cause::Interrupt)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Exit::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Exit::Failure(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Exit::Failure(cause) if cause.is_interrupted())
    }

    pub fn cause(&self) -> Option<&Cause<E>> {
        match self {
            Exit::Success(_) => None,
            Exit::Failure(cause) => Some(cause),
        }
    }

    /// Pattern match on the exit
    pub fn fold<T>(
        self,
        on_failure: impl FnOnce(Cause<E>) -> T,
        on_success: impl FnOnce(A) -> T,
    ) -> T {
        match self {
            Exit::Success(value) => on_success(value),
            Exit::Failure(cause) => on_failure(cause),
        }
    }

    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> Exit<E, B> {
        match self {
            Exit::Success(value) => Exit::Success(f(value)),
            Exit::Failure(cause) => Exit::Failure(cause),
        }
    }

    pub fn into_result(self) -> Result<A, Cause<E>> {
        match self {
            Exit::Success(value) => Ok(value),
            Exit::Failure(cause) => Err(cause),
        }
    }

    /// Short outcome label used in logs
    pub fn describe(&self) -> &'static str {
        match self {
            Exit::Success(_) => "success",
            Exit::Failure(cause) if cause.is_interrupted() => "interrupted",
            Exit::Failure(_) => "failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_identity() {
        let cause: Cause<&str> = Cause::fail("a");
        assert_eq!(Cause::empty().then(cause.clone()), cause);
        assert_eq!(cause.clone().both(Cause::empty()), cause);
        assert!(Cause::<&str>::empty().both(Cause::empty()).is_empty());
    }

    #[test]
    fn test_composition_keeps_both_sides() {
        let cause = Cause::fail("a").both(Cause::fail("b"));
        assert_eq!(
            cause,
            Cause::Both(Box::new(Cause::Fail("a")), Box::new(Cause::Fail("b")))
        );
        assert_eq!(cause.failures(), vec![&"a", &"b"]);
    }

    #[test]
    fn test_failure_or_cause() {
        let cause = Cause::interrupt().then(Cause::fail("late"));
        assert_eq!(cause.failure_or_cause(), Ok("late"));

        let cause: Cause<&str> = Cause::interrupt().then(Cause::die(Defect::msg("boom")));
        let rest = cause.clone().failure_or_cause();
        assert_eq!(rest, Err(cause));
    }

    #[test]
    fn test_interrupted_only() {
        assert!(Cause::<()>::interrupt().is_interrupted_only());
        assert!(Cause::<()>::interrupt()
            .both(Cause::interrupt())
            .is_interrupted_only());
        assert!(!Cause::interrupt().then(Cause::fail(())).is_interrupted_only());
        assert!(Cause::interrupt().then(Cause::fail(())).is_interrupted());
    }

    #[test]
    fn test_squash_precedence() {
        let cause = Cause::die(Defect::msg("defect"))
            .then(Cause::interrupt())
            .both(Cause::fail("typed"));
        assert!(matches!(cause.squash(), Squashed::Failure("typed")));

        let cause: Cause<&str> = Cause::interrupt().then(Cause::die(Defect::msg("defect")));
        match cause.squash() {
            Squashed::Defect(defect) => assert_eq!(defect.to_string(), "defect"),
            other => panic!("unexpected squash result: {:?}", other),
        }

        assert!(matches!(
            Cause::<&str>::interrupt().squash(),
            Squashed::Interrupted
        ));
        assert!(matches!(Cause::<&str>::empty().squash(), Squashed::Empty));
    }

    #[test]
    fn test_map_rewrites_every_failure() {
        let cause = Cause::fail(1).both(Cause::fail(2)).map(|n| n * 10);
        assert_eq!(cause.failures(), vec![&10, &20]);
    }

    #[test]
    fn test_panic_payload_becomes_defect() {
        let payload = std::panic::catch_unwind(|| panic!("kaboom")).unwrap_err();
        assert_eq!(Defect::from_panic(payload).to_string(), "panicked: kaboom");
    }

    #[test]
    fn test_exit_helpers() {
        let exit: Exit<&str, i32> = Exit::interrupt();
        assert!(exit.is_interrupted());
        assert!(exit.is_failure());
        assert_eq!(exit.describe(), "interrupted");

        let exit: Exit<&str, i32> = Exit::succeed(2).map(|n| n + 1);
        assert_eq!(exit.clone().into_result(), Ok(3));
        assert_eq!(exit.fold(|_| 0, |n| n), 3);
    }
}
