//! Handler filters.
//!
//! A filter decides whether a handler applies to a context. Filters must
//! not mutate anything: the same context always yields the same answer.

use std::fmt;

/// Predicate evaluated before a handler runs.
pub trait Filter<C>: Send + Sync + fmt::Debug {
    /// Returns true if the handler should run for this context.
    fn accepts(&self, context: &C) -> bool;
}

/// A filter backed by a plain function.
pub struct FnFilter<F> {
    name: &'static str,
    predicate: F,
}

impl<F> fmt::Debug for FnFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter").field("name", &self.name).finish()
    }
}

impl<C, F> Filter<C> for FnFilter<F>
where
    F: Fn(&C) -> bool + Send + Sync,
{
    fn accepts(&self, context: &C) -> bool {
        (self.predicate)(context)
    }
}

/// Build a named filter from a predicate.
pub fn filter_fn<C, F>(name: &'static str, predicate: F) -> FnFilter<F>
where
    F: Fn(&C) -> bool + Send + Sync,
{
    FnFilter { name, predicate }
}
