use super::TerminationCondition;

/// Stops the search as soon as either of its conditions does; both are informed of every
/// explored node.
///
/// The branch-and-bound search combines the node budget of the
/// [`SolverOptions`](crate::SolverOptions) with the condition passed by the caller this way.
#[derive(Clone, Copy, Debug)]
pub struct Combinator<First, Second> {
    first: First,
    second: Second,
}

impl<First, Second> Combinator<First, Second> {
    pub fn new(first: First, second: Second) -> Self {
        Combinator { first, second }
    }
}

impl<First, Second> TerminationCondition for Combinator<First, Second>
where
    First: TerminationCondition,
    Second: TerminationCondition,
{
    fn should_stop(&mut self) -> bool {
        // every condition is polled, even when the first one stops
        let first_stops = self.first.should_stop();
        let second_stops = self.second.should_stop();
        first_stops || second_stops
    }

    fn node_has_been_explored(&mut self) {
        self.first.node_has_been_explored();
        self.second.node_has_been_explored();
    }
}
