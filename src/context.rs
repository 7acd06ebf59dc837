//! Service context
//!
//! A structurally-merged record of services keyed by type. Effects that need services use
//! `Context` as their environment and read from it with `service` / `service_with`.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Context {
    services: HashMap<TypeId, Entry>,
}

#[derive(Clone)]
struct Entry {
    name: &'static str,
    service: Arc<dyn Any + Send + Sync>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service, replacing any existing one of the same type
    pub fn with<S>(mut self, service: S) -> Self
    where
        S: Send + Sync + 'static,
    {
        self.insert(service);
        self
    }

    pub fn insert<S>(&mut self, service: S)
    where
        S: Send + Sync + 'static,
    {
        self.services.insert(
            TypeId::of::<S>(),
            Entry {
                name: type_name::<S>(),
                service: Arc::new(service),
            },
        );
    }

    pub fn get<S>(&self) -> Option<Arc<S>>
    where
        S: Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<S>())
            .and_then(|entry| entry.service.clone().downcast::<S>().ok())
    }

    pub fn contains<S: 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<S>())
    }

    /// Combine two contexts. Services in `other` win.
    pub fn merge(mut self, other: Context) -> Self {
        self.services.extend(other.services);
        self
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.services.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        f.debug_struct("Context").field("services", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Clock(u64);

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    #[test]
    fn test_get_by_type() {
        let context = Context::new().with(Clock(7)).with(Greeting("hi"));

        assert_eq!(context.len(), 2);
        assert_eq!(*context.get::<Clock>().unwrap(), Clock(7));
        assert_eq!(*context.get::<Greeting>().unwrap(), Greeting("hi"));
        assert!(context.get::<String>().is_none());
    }

    #[test]
    fn test_merge_is_right_biased() {
        let left = Context::new().with(Clock(1)).with(Greeting("left"));
        let right = Context::new().with(Clock(2));

        let merged = left.merge(right);
        assert_eq!(*merged.get::<Clock>().unwrap(), Clock(2));
        assert_eq!(*merged.get::<Greeting>().unwrap(), Greeting("left"));
    }

    #[test]
    fn test_debug_lists_service_names() {
        let context = Context::new().with(Clock(1));
        assert!(format!("{:?}", context).contains("Clock"));
        assert!(Context::new().is_empty());
        assert!(context.contains::<Clock>());
    }
}
