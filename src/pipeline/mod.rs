//! Ordered, filterable handler pipeline.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     HandlerDescriptor<C>[] (filters, order, lifetime, kind)
//!     → PipelineBuilder::register
//!     → build(): stable sort by order per context type
//!     → Pipeline (immutable, shared via Arc)
//!
//! Per exchange:
//!     Pipeline::dispatch(&mut C)
//!     → for each descriptor of C, in order
//!         → all filters accept? else skip
//!         → run handler (error aborts dispatch)
//!         → context handled/skipped/rejected? stop
//! ```
//!
//! # Design Decisions
//! - Descriptors are resolved once; dispatch never mutates the registered set
//! - Equal orders keep registration sequence
//! - Filters are pure predicates combined with AND semantics
//! - Handlers run strictly sequentially within one dispatch

pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod filter;

pub use context::{EventContext, ProcessingState};
pub use descriptor::{Handler, HandlerDescriptor, HandlerDescriptorBuilder, HandlerKind, HandlerLifetime};
pub use dispatcher::{Pipeline, PipelineBuilder};
pub use filter::{filter_fn, Filter};
