//! Concurrent groups (`All`)
//!
//! Every child runs in its own interpreter under a group token linked to the parent's.
//! Children are interleaved inside the current task, not spawned.

use std::future::poll_fn;
use std::task::Poll;

use futures_util::future::BoxFuture;
use tracing::debug;

use super::exec_loop::{interpret, Interpreter, Step};
use crate::cause::Exit;
use crate::effect::node::{ErasedCause, ErasedExit, Node, Value};
use crate::interrupt::InterruptToken;

impl Interpreter {
    /// Run `children` concurrently and continue with their values in input order
    pub(super) async fn join_group(&mut self, children: Vec<Node>) -> Step {
        let group = InterruptToken::new();
        let link = self.token.link(&group);

        let branches: Vec<_> = children
            .into_iter()
            .map(|child| interpret(child, self.environment().clone(), group.clone(), self.settings))
            .collect();
        debug!(branches = branches.len(), "Joining concurrent group");

        let exits = fan_in(branches, group).await;
        drop(link);

        if self.token.is_interrupted() {
            return Step::Interrupted;
        }

        let mut values: Vec<Value> = Vec::with_capacity(exits.len());
        let mut failure: Option<ErasedCause> = None;
        let mut interrupted = false;

        for exit in exits {
            match exit {
                Exit::Success(value) => values.push(value),
                Exit::Failure(cause) if cause.is_interrupted_only() => interrupted = true,
                Exit::Failure(cause) => {
                    failure = Some(match failure {
                        Some(previous) => previous.both(cause),
                        None => cause,
                    });
                }
            }
        }

        match failure {
            Some(cause) => Step::Continue(Node::Fail(cause)),
            // A child interrupted itself: the whole run is interrupted
            None if interrupted => {
                self.token.interrupt();
                Step::Interrupted
            }
            None => Step::Continue(Node::Succeed(Box::new(values))),
        }
    }
}

/// Drive every branch to completion, keeping exits in branch order.
///
/// Each round polls every unfinished branch. If any branch failed during the round the
/// group token is interrupted afterwards, so the remaining branches stop cooperatively.
async fn fan_in(
    mut branches: Vec<BoxFuture<'static, ErasedExit>>,
    group: InterruptToken,
) -> Vec<ErasedExit> {
    let mut exits: Vec<Option<ErasedExit>> = branches.iter().map(|_| None).collect();
    let mut pending = branches.len();

    poll_fn(|cx| {
        let mut failed = false;

        for (branch, slot) in branches.iter_mut().zip(exits.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            if let Poll::Ready(exit) = branch.as_mut().poll(cx) {
                failed |= exit.is_failure();
                *slot = Some(exit);
                pending -= 1;
            }
        }

        if failed && !group.is_interrupted() {
            debug!(pending, "Branch failed, interrupting siblings");
            group.interrupt();
        }

        if pending == 0 {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    })
    .await;

    exits.into_iter().flatten().collect()
}
