//! Erased effect nodes
//!
//! The interpreter works on `Node`, a closed enum with type-erased payloads. The typed
//! `Effect` layer erases values on the way in and downcasts them on the way out.

use std::any::{type_name, Any};
use std::mem;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::adapter::OnInterrupt;
use crate::cause::{Cause, Defect, Exit};

pub(crate) type Value = Box<dyn Any + Send>;
pub(crate) type Erased = Box<dyn Any + Send>;
pub(crate) type ErasedCause = Cause<Erased>;
pub(crate) type ErasedExit = Exit<Erased, Value>;
pub(crate) type Env = Arc<dyn Any + Send + Sync>;

pub(crate) type Thunk = Box<dyn FnOnce() -> Result<Value, WrappedCause> + Send>;
pub(crate) type Cont = Box<dyn FnOnce(Value) -> Node + Send>;
pub(crate) type Recover = Box<dyn FnOnce(ErasedCause) -> Node + Send>;
pub(crate) type Factory = Box<dyn FnOnce() -> Node + Send>;
pub(crate) type Reader = Box<dyn FnOnce(&Env) -> Node + Send>;

pub(crate) type PromiseFactory =
    Box<dyn FnOnce(OnInterrupt) -> BoxFuture<'static, Result<Value, Erased>> + Send>;
pub(crate) type RejectMapper = Box<dyn FnOnce(Erased) -> ErasedCause + Send>;

/// A failure raised from inside a lazy success thunk
pub(crate) struct WrappedCause(pub(crate) ErasedCause);

impl WrappedCause {
    pub(crate) fn fail<E: Send + 'static>(error: E) -> Self {
        Self(Cause::fail(Box::new(error)))
    }
}

/// One host future waiting to be started, plus the mapping for its rejection
pub(crate) struct Promise {
    pub(crate) factory: PromiseFactory,
    pub(crate) on_reject: RejectMapper,
}

pub(crate) enum Node {
    Succeed(Value),
    SucceedLazy(Thunk),
    Fail(ErasedCause),
    Interrupt,
    Asks(Reader),
    Give(Subtree, Env),
    All(Vec<Node>),
    Defer(Factory),
    LiftPromise(Promise),
    Chain(Subtree, Cont),
    Match(Subtree, Recover, Cont),
    Ensuring(Subtree, Subtree),
}

impl Node {
    pub(crate) fn die(defect: Defect) -> Self {
        Node::Fail(Cause::Die(defect))
    }

    /// Placeholder left behind when a subtree is moved out. Boxing `()` does not allocate.
    fn hollow() -> Self {
        Node::Succeed(Box::new(()))
    }

    /// Move every direct child into `out`, leaving this node shallow
    fn detach_children(&mut self, out: &mut Vec<Node>) {
        match self {
            Node::Give(inner, _) | Node::Chain(inner, _) | Node::Match(inner, ..) => {
                out.push(inner.take());
            }
            Node::Ensuring(inner, finalizer) => {
                out.push(inner.take());
                out.push(finalizer.take());
            }
            Node::All(children) => out.append(children),
            _ => {}
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Node::Succeed(_) => "succeed",
            Node::SucceedLazy(_) => "succeed_lazy",
            Node::Fail(_) => "fail",
            Node::Interrupt => "interrupt",
            Node::Asks(_) => "asks",
            Node::Give(..) => "give",
            Node::All(_) => "all",
            Node::Defer(_) => "defer",
            Node::LiftPromise(_) => "lift_promise",
            Node::Chain(..) => "chain",
            Node::Match(..) => "match",
            Node::Ensuring(..) => "ensuring",
        }
    }
}

/* ===================== Subtree ===================== */

/// Owned child node.
///
/// Dropping a subtree walks it with an explicit work list, so a deep tree that never ran
/// (a cancelled run, a discarded effect) is released in constant native stack space.
pub(crate) struct Subtree(Box<Node>);

impl Subtree {
    pub(crate) fn new(node: Node) -> Self {
        Self(Box::new(node))
    }

    pub(crate) fn into_node(mut self) -> Node {
        self.take()
    }

    fn take(&mut self) -> Node {
        mem::replace(&mut *self.0, Node::hollow())
    }
}

impl Drop for Subtree {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.0.detach_children(&mut pending);
        while let Some(mut node) = pending.pop() {
            node.detach_children(&mut pending);
        }
    }
}

/* ===================== Erasure ===================== */

pub(crate) fn erase<A: Send + 'static>(value: A) -> Value {
    Box::new(value)
}

pub(crate) fn unerase<A: 'static>(value: Value) -> Result<A, Defect> {
    value
        .downcast::<A>()
        .map(|value| *value)
        .map_err(|_| Defect::msg(format!("effect value is not a {}", type_name::<A>())))
}

pub(crate) fn erase_cause<E: Send + 'static>(cause: Cause<E>) -> ErasedCause {
    cause.map(|error| Box::new(error) as Erased)
}

pub(crate) fn reify_cause<E: 'static>(cause: ErasedCause) -> Cause<E> {
    cause.flat_map_failures(&mut |error: Erased| match error.downcast::<E>() {
        Ok(error) => Cause::Fail(*error),
        Err(_) => Cause::Die(Defect::msg(format!(
            "typed failure is not a {}",
            type_name::<E>()
        ))),
    })
}

pub(crate) fn reify_exit<E: 'static, A: 'static>(exit: ErasedExit) -> Exit<E, A> {
    match exit {
        Exit::Success(value) => match unerase::<A>(value) {
            Ok(value) => Exit::Success(value),
            Err(defect) => Exit::Failure(Cause::Die(defect)),
        },
        Exit::Failure(cause) => Exit::Failure(reify_cause(cause)),
    }
}
