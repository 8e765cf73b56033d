use std::fmt::Display;
use std::fmt::Formatter;

use crate::basic_types::BinaryVariable;
use crate::basic_types::FactorId;
use crate::basic_types::Literal;
use crate::basic_types::MultiVariable;
use crate::containers::StorageKey;
#[cfg(doc)]
use crate::termination::TerminationCondition;
#[cfg(doc)]
use crate::FactorGraph;

/// The status of a call to [`FactorGraph::solve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    /// The marginals form a feasible 0/1 assignment. It is optimal if it was found by an
    /// exhausted branch-and-bound search or certified by the dual bound.
    Integral,
    /// The relaxation did not produce an integral solution; the marginals are the fractional
    /// consensus.
    Fractional,
    /// The branch-and-bound search proved that no assignment satisfies all factors.
    Infeasible,
    /// The branch-and-bound search was stopped by a [`TerminationCondition`] before it found a
    /// feasible assignment.
    Unsolved,
}

impl Display for SolverStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverStatus::Integral => write!(f, "integral"),
            SolverStatus::Fractional => write!(f, "fractional"),
            SolverStatus::Infeasible => write!(f, "infeasible"),
            SolverStatus::Unsolved => write!(f, "unsolved"),
        }
    }
}

/// The result of a call to [`FactorGraph::solve`].
///
/// The marginals are indexed by [`BinaryVariable`] (the states of a [`MultiVariable`] are
/// consecutive), the edge marginals are the additional posteriors of the declared factors in
/// declaration order. Only factors with additional variables contribute edge marginals: the
/// joint states of a dense factor (row-major), the conjunction of a pair factor and the
/// transitions of a segmentation factor.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverResult {
    pub status: SolverStatus,
    /// The objective value of the returned marginals, or minus infinity if the graph is
    /// infeasible.
    pub value: f64,
    /// An upper bound on the MAP value.
    pub upper_bound: f64,
    pub marginals: Vec<f64>,
    pub edge_marginals: Vec<f64>,
    /// The offset of the edge marginals of every declared factor, followed by their total count.
    pub(crate) edge_offsets: Vec<usize>,
    /// The number of consensus iterations over all relaxations which were solved.
    pub num_iterations: u64,
    /// The number of branch-and-bound nodes which were explored.
    pub num_nodes: u64,
}

impl SolverResult {
    /// The marginal of `variable`.
    ///
    /// # Panics
    /// If `variable` was not created by the graph which produced this result.
    pub fn marginal(&self, variable: BinaryVariable) -> f64 {
        assert!(
            variable.index() < self.marginals.len(),
            "variable {} is not part of a graph with {} variables",
            variable.index(),
            self.marginals.len()
        );
        self.marginals[variable.index()]
    }

    /// The marginal of the literal, which is `1 - p` for a negated literal.
    ///
    /// # Panics
    /// If the variable of `literal` was not created by the graph which produced this result.
    pub fn literal_marginal(&self, literal: Literal) -> f64 {
        let marginal = self.marginal(literal.variable());
        if literal.is_negated() {
            1.0 - marginal
        } else {
            marginal
        }
    }

    /// The marginals of the states of `variable`.
    ///
    /// # Panics
    /// If `variable` was not created by the graph which produced this result.
    pub fn state_marginals(&self, variable: MultiVariable) -> &[f64] {
        let first_state = variable.first_state().index();
        &self.marginals[first_state..first_state + variable.num_states()]
    }

    /// The state with the largest marginal; ties are broken towards the lowest state.
    pub fn best_state(&self, variable: MultiVariable) -> usize {
        self.state_marginals(variable)
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (state, &marginal)| {
                if marginal > best.1 {
                    (state, marginal)
                } else {
                    best
                }
            })
            .0
    }

    /// The edge marginals of a single declared factor.
    ///
    /// # Panics
    /// If `factor` was not declared in the graph which produced this result.
    pub fn factor_edge_marginals(&self, factor: FactorId) -> &[f64] {
        let index = factor.index();
        &self.edge_marginals[self.edge_offsets[index]..self.edge_offsets[index + 1]]
    }

    /// The value of `variable` in the returned assignment, if the result is integral.
    pub fn value_of(&self, variable: BinaryVariable) -> Option<bool> {
        (self.status == SolverStatus::Integral).then(|| self.marginal(variable) >= 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> SolverResult {
        SolverResult {
            status: SolverStatus::Fractional,
            value: 1.0,
            upper_bound: 2.0,
            marginals: vec![0.25, 0.5, 0.25, 1.0],
            edge_marginals: vec![0.1, 0.2, 0.3],
            edge_offsets: vec![0, 0, 2, 3],
            num_iterations: 10,
            num_nodes: 0,
        }
    }

    #[test]
    #[should_panic(expected = "is not part of a graph with 4 variables")]
    fn marginal_of_a_foreign_variable_panics() {
        let _ = result().marginal(BinaryVariable::new(4));
    }

    #[test]
    fn state_marginals_are_the_consecutive_states() {
        let multi = MultiVariable::new(0, BinaryVariable::new(0), 3);

        assert_eq!(result().state_marginals(multi), &[0.25, 0.5, 0.25]);
        assert_eq!(result().best_state(multi), 1);
    }

    #[test]
    fn edge_marginals_are_split_per_factor() {
        let result = result();

        assert!(result
            .factor_edge_marginals(FactorId::create_from_index(0))
            .is_empty());
        assert_eq!(
            result.factor_edge_marginals(FactorId::create_from_index(1)),
            &[0.1, 0.2]
        );
        assert_eq!(
            result.factor_edge_marginals(FactorId::create_from_index(2)),
            &[0.3]
        );
    }

    #[test]
    fn values_are_only_reported_for_integral_results() {
        let mut result = result();
        assert_eq!(result.value_of(BinaryVariable::new(3)), None);

        result.status = SolverStatus::Integral;
        assert_eq!(result.value_of(BinaryVariable::new(3)), Some(true));
        assert_eq!(result.literal_marginal(!BinaryVariable::new(3)), 0.0);
    }
}
