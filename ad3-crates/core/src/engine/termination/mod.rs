//! A [`TerminationCondition`] is a condition which is polled by the branch-and-bound search
//! after every explored node. It indicates when the search should stop, even if optimality has
//! not been proven. The most common example would be [`time_budget::TimeBudget`], which gives
//! the search a certain time budget to complete.

pub(crate) mod combinator;
pub(crate) mod indefinite;
pub(crate) mod node_budget;
pub(crate) mod time_budget;

/// The central trait that defines a termination condition. A termination condition determines
/// when the search should give up looking for a better solution.
pub trait TerminationCondition {
    /// Returns `true` when the search should stop, `false` otherwise.
    fn should_stop(&mut self) -> bool;

    fn node_has_been_explored(&mut self) {}
}

impl<T: TerminationCondition> TerminationCondition for Option<T> {
    fn should_stop(&mut self) -> bool {
        match self {
            Some(t) => t.should_stop(),
            None => false,
        }
    }

    fn node_has_been_explored(&mut self) {
        if let Some(t) = self {
            t.node_has_been_explored()
        }
    }
}

impl<T: TerminationCondition + ?Sized> TerminationCondition for &mut T {
    fn should_stop(&mut self) -> bool {
        (**self).should_stop()
    }

    fn node_has_been_explored(&mut self) {
        (**self).node_has_been_explored()
    }
}
