use thiserror::Error;

use crate::cause::Defect;

/// A failure cause collapsed into a single error value.
///
/// Returned by `Runtime::execute_or_throw`. The full cause tree is still available through
/// the structured run methods.
#[derive(Debug, Error)]
pub enum Squashed<E> {
    #[error("{0}")]
    Failure(E),

    #[error("defect: {0}")]
    Defect(Defect),

    #[error("interrupted")]
    Interrupted,

    #[error("failed with an empty cause")]
    Empty,
}

impl<E> Squashed<E> {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Squashed::Interrupted)
    }

    /// The typed failure, if the cause carried one
    pub fn into_failure(self) -> Option<E> {
        match self {
            Squashed::Failure(error) => Some(error),
            _ => None,
        }
    }
}
