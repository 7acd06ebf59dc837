//! Continuation frames
//!
//! The frame stack holds "the rest of the program" while the loop descends into an inner
//! node. Frames are popped in LIFO order when a value or a failure comes back up.

use crate::effect::node::{Cont, Env, Node, Recover};

pub(crate) enum Frame {
    /// Pending `Chain` continuation
    Apply(Cont),
    /// Pending `Match`: `recover` on failure, `apply` on success
    Fold { recover: Recover, apply: Cont },
    /// Cleanup that runs however the inner node ends
    Finalizer(Cleanup),
}

pub(crate) enum Cleanup {
    /// Run a finalizer effect
    Run(Node),
    /// Restore the environment replaced by `Give`
    Restore(Env),
}

#[derive(Default)]
pub(crate) struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }
}
