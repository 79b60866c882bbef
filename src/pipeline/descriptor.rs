//! Handler descriptors.
//!
//! # Responsibilities
//! - Describe one pipeline stage: context type, filters, order, lifetime, kind
//! - Resolve the handler instance to run for an invocation
//!
//! # Design Decisions
//! - Immutable once built; cloning shares the handler and filters
//! - Lower order runs first

use async_trait::async_trait;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::error::{EndSessionError, EndSessionResult};
use crate::pipeline::filter::Filter;

/// A pipeline stage for contexts of type `C`.
#[async_trait]
pub trait Handler<C>: Send + Sync {
    /// Process the context. Returning an error aborts the exchange.
    async fn handle(&self, context: &mut C) -> EndSessionResult<()>;
}

type HandlerFactory<C> = Arc<dyn Fn() -> Box<dyn Handler<C>> + Send + Sync>;

/// How handler instances are provided.
pub enum HandlerLifetime<C> {
    /// One instance shared by every invocation.
    Singleton(Arc<dyn Handler<C>>),
    /// A fresh instance per invocation.
    Scoped(HandlerFactory<C>),
}

impl<C> Clone for HandlerLifetime<C> {
    fn clone(&self) -> Self {
        match self {
            HandlerLifetime::Singleton(handler) => HandlerLifetime::Singleton(handler.clone()),
            HandlerLifetime::Scoped(factory) => HandlerLifetime::Scoped(factory.clone()),
        }
    }
}

impl<C> fmt::Debug for HandlerLifetime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerLifetime::Singleton(_) => f.write_str("Singleton"),
            HandlerLifetime::Scoped(_) => f.write_str("Scoped"),
        }
    }
}

/// Whether the handler ships with the crate or was added by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    BuiltIn,
    Custom,
}

/// Describes a handler registered for contexts of type `C`.
pub struct HandlerDescriptor<C> {
    name: &'static str,
    filters: Vec<Arc<dyn Filter<C>>>,
    order: i32,
    lifetime: HandlerLifetime<C>,
    kind: HandlerKind,
}

impl<C: Send + 'static> HandlerDescriptor<C> {
    /// Start describing a handler. `name` identifies it in logs.
    pub fn builder(name: &'static str) -> HandlerDescriptorBuilder<C> {
        HandlerDescriptorBuilder {
            name,
            filters: Vec::new(),
            order: 0,
            lifetime: None,
            kind: HandlerKind::Custom,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the context type this descriptor applies to.
    pub fn context_type(&self) -> &'static str {
        type_name::<C>()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn lifetime(&self) -> &HandlerLifetime<C> {
        &self.lifetime
    }

    pub fn filters(&self) -> &[Arc<dyn Filter<C>>] {
        &self.filters
    }

    /// True if every filter accepts the context.
    pub fn accepts(&self, context: &C) -> bool {
        self.filters.iter().all(|filter| filter.accepts(context))
    }

    /// Run the handler against the context.
    pub async fn invoke(&self, context: &mut C) -> EndSessionResult<()> {
        match &self.lifetime {
            HandlerLifetime::Singleton(handler) => handler.handle(context).await,
            HandlerLifetime::Scoped(factory) => {
                let handler = factory();
                handler.handle(context).await
            }
        }
    }
}

impl<C> Clone for HandlerDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            filters: self.filters.clone(),
            order: self.order,
            lifetime: self.lifetime.clone(),
            kind: self.kind,
        }
    }
}

impl<C> fmt::Debug for HandlerDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("context", &type_name::<C>())
            .field("filters", &self.filters)
            .field("order", &self.order)
            .field("lifetime", &self.lifetime)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Builder for [`HandlerDescriptor`].
pub struct HandlerDescriptorBuilder<C> {
    name: &'static str,
    filters: Vec<Arc<dyn Filter<C>>>,
    order: i32,
    lifetime: Option<HandlerLifetime<C>>,
    kind: HandlerKind,
}

impl<C: Send + 'static> HandlerDescriptorBuilder<C> {
    pub fn add_filter(mut self, filter: impl Filter<C> + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn set_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn set_kind(mut self, kind: HandlerKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn use_singleton_handler(mut self, handler: impl Handler<C> + 'static) -> Self {
        self.lifetime = Some(HandlerLifetime::Singleton(Arc::new(handler)));
        self
    }

    pub fn use_scoped_handler<H, F>(mut self, factory: F) -> Self
    where
        H: Handler<C> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.lifetime = Some(HandlerLifetime::Scoped(Arc::new(move || {
            Box::new(factory()) as Box<dyn Handler<C>>
        })));
        self
    }

    pub fn build(self) -> EndSessionResult<HandlerDescriptor<C>> {
        let lifetime = self.lifetime.ok_or_else(|| {
            EndSessionError::configuration(format!(
                "handler descriptor `{}` has no handler",
                self.name
            ))
        })?;

        Ok(HandlerDescriptor {
            name: self.name,
            filters: self.filters,
            order: self.order,
            lifetime,
            kind: self.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::filter::filter_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Vec<&'static str>);

    struct Push(&'static str);

    #[async_trait]
    impl Handler<Counter> for Push {
        async fn handle(&self, context: &mut Counter) -> EndSessionResult<()> {
            context.0.push(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_build_requires_handler() {
        let err = HandlerDescriptor::<Counter>::builder("empty").build().unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_filters_use_and_semantics() {
        let descriptor = HandlerDescriptor::<Counter>::builder("push")
            .add_filter(filter_fn("non-empty", |c: &Counter| !c.0.is_empty()))
            .add_filter(filter_fn("short", |c: &Counter| c.0.len() < 2))
            .use_singleton_handler(Push("a"))
            .build()
            .unwrap();

        assert!(!descriptor.accepts(&Counter(vec![])));
        assert!(descriptor.accepts(&Counter(vec!["x"])));
        assert!(!descriptor.accepts(&Counter(vec!["x", "y"])));
    }

    #[test]
    fn test_descriptor_metadata() {
        let descriptor = HandlerDescriptor::<Counter>::builder("push")
            .set_order(100)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(Push("a"))
            .build()
            .unwrap();

        assert_eq!(descriptor.name(), "push");
        assert_eq!(descriptor.order(), 100);
        assert_eq!(descriptor.kind(), HandlerKind::BuiltIn);
        assert!(descriptor.context_type().ends_with("Counter"));
    }

    #[tokio::test]
    async fn test_scoped_handler_created_per_invocation() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let descriptor = HandlerDescriptor::<Counter>::builder("scoped")
            .use_scoped_handler(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Push("scoped")
            })
            .build()
            .unwrap();

        let mut context = Counter(vec![]);
        descriptor.invoke(&mut context).await.unwrap();
        descriptor.invoke(&mut context).await.unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(context.0, vec!["scoped", "scoped"]);
    }
}
