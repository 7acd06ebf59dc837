//! Environment and service access

use std::any::type_name;
use std::sync::Arc;

use super::node::{Env, Node, Subtree};
use super::{halt, succeed, Effect};
use crate::cause::Defect;
use crate::context::Context;

/// Read the environment and continue with the effect `f` builds from it
pub fn asks<R, E, A, F>(f: F) -> Effect<R, E, A>
where
    R: Send + Sync + 'static,
    F: FnOnce(&R) -> Effect<R, E, A> + Send + 'static,
{
    let read = move |env: &Env| match (**env).downcast_ref::<R>() {
        Some(environment) => f(environment).into_node(),
        None => Node::die(Defect::msg(format!(
            "environment is not a {}",
            type_name::<R>()
        ))),
    };
    Effect::from_node(Node::Asks(Box::new(read)))
}

/// The whole environment
pub fn environment<R, E>() -> Effect<R, E, R>
where
    R: Clone + Send + Sync + 'static,
{
    asks(|environment: &R| succeed(environment.clone()))
}

/// Look up a service in the context. A missing service is a defect.
pub fn service<S, E>() -> Effect<Context, E, Arc<S>>
where
    S: Send + Sync + 'static,
{
    service_with(|service: &Arc<S>| succeed(service.clone()))
}

/// Look up a service and continue with the effect `f` builds from it
pub fn service_with<S, E, A, F>(f: F) -> Effect<Context, E, A>
where
    S: Send + Sync + 'static,
    F: FnOnce(&Arc<S>) -> Effect<Context, E, A> + Send + 'static,
{
    asks(move |context: &Context| match context.get::<S>() {
        Some(service) => f(&service),
        None => halt(Defect::msg(format!(
            "service {} is not provided",
            type_name::<S>()
        ))),
    })
}

impl<R, E, A> Effect<R, E, A> {
    /// Run this effect with `environment`, restoring the outer one afterwards
    pub fn provide<R0>(self, environment: R) -> Effect<R0, E, A>
    where
        R: Send + Sync + 'static,
    {
        Effect::from_node(Node::Give(Subtree::new(self.node), Arc::new(environment)))
    }
}

impl<E, A> Effect<Context, E, A>
where
    E: 'static,
    A: 'static,
{
    /// Add `service` to the current context for the duration of this effect
    pub fn provide_service<S>(self, service: S) -> Effect<Context, E, A>
    where
        S: Send + Sync + 'static,
    {
        self.provide_context(Context::new().with(service))
    }

    /// Merge `context` over the current one for the duration of this effect
    pub fn provide_context(self, context: Context) -> Effect<Context, E, A> {
        asks(move |current: &Context| {
            let merged = current.clone().merge(context);
            Effect::from_node(Node::Give(Subtree::new(self.node), Arc::new(merged)))
        })
    }
}
