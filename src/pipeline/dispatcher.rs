//! Pipeline construction and dispatch.
//!
//! # Responsibilities
//! - Collect descriptors per context type at startup
//! - Freeze them into an immutable, sorted [`Pipeline`]
//! - Run the matching handlers for a context, in order
//!
//! # Design Decisions
//! - One list per context type, keyed by `TypeId`
//! - Stable sort: equal orders keep registration sequence
//! - Dispatch stops at the first terminal processing state
//! - Handler errors propagate; the pipeline never catches and continues

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::error::EndSessionResult;
use crate::pipeline::context::EventContext;
use crate::pipeline::descriptor::HandlerDescriptor;

/// A descriptor list with its context type erased.
trait DescriptorList: Send + Sync {
    fn sort(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Send + 'static> DescriptorList for Vec<HandlerDescriptor<C>> {
    fn sort(&mut self) {
        self.sort_by_key(|descriptor| descriptor.order());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Collects handler descriptors before the pipeline is frozen.
#[derive(Default)]
pub struct PipelineBuilder {
    handlers: HashMap<TypeId, Box<dyn DescriptorList>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for its context type.
    pub fn register<C: EventContext + 'static>(mut self, descriptor: HandlerDescriptor<C>) -> Self {
        self.list_mut::<C>().push(descriptor);
        self
    }

    /// Register several handlers for the same context type.
    pub fn register_all<C, I>(mut self, descriptors: I) -> Self
    where
        C: EventContext + 'static,
        I: IntoIterator<Item = HandlerDescriptor<C>>,
    {
        self.list_mut::<C>().extend(descriptors);
        self
    }

    /// Sort every list by order and freeze the pipeline.
    pub fn build(mut self) -> Pipeline {
        for list in self.handlers.values_mut() {
            list.sort();
        }
        Pipeline {
            handlers: self.handlers,
        }
    }

    fn list_mut<C: EventContext + 'static>(&mut self) -> &mut Vec<HandlerDescriptor<C>> {
        let list = self
            .handlers
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Box::new(Vec::<HandlerDescriptor<C>>::new()));

        match list.as_any_mut().downcast_mut::<Vec<HandlerDescriptor<C>>>() {
            Some(list) => list,
            None => unreachable!("descriptor lists are keyed by their own TypeId"),
        }
    }
}

/// An immutable set of handlers, ready to dispatch contexts.
///
/// Shared between concurrent exchanges via `Arc`; dispatch only reads it.
pub struct Pipeline {
    handlers: HashMap<TypeId, Box<dyn DescriptorList>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Descriptors registered for `C`, in dispatch order.
    pub fn descriptors<C: EventContext + 'static>(&self) -> &[HandlerDescriptor<C>] {
        self.handlers
            .get(&TypeId::of::<C>())
            .and_then(|list| list.as_any().downcast_ref::<Vec<HandlerDescriptor<C>>>())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Run every accepting handler for the context, in ascending order,
    /// until one leaves the context in a terminal state.
    pub async fn dispatch<C: EventContext + 'static>(&self, context: &mut C) -> EndSessionResult<()> {
        for descriptor in self.descriptors::<C>() {
            if !descriptor.accepts(context) {
                tracing::trace!(
                    handler = descriptor.name(),
                    order = descriptor.order(),
                    "Handler skipped by filter"
                );
                continue;
            }

            tracing::trace!(
                handler = descriptor.name(),
                order = descriptor.order(),
                "Invoking handler"
            );
            descriptor.invoke(context).await?;

            if context.state().is_terminal() {
                tracing::trace!(
                    handler = descriptor.name(),
                    state = ?context.state(),
                    "Dispatch stopped"
                );
                break;
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("context_types", &self.handlers.len())
            .finish()
    }
}
