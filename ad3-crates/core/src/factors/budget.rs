use std::cmp::Ordering;

use super::projections::project_onto_budget_polytope;
use super::Subproblem;

/// At most `budget` of the literals are true.
#[derive(Clone, Debug)]
pub(crate) struct BudgetFactor {
    budget: usize,
}

impl BudgetFactor {
    pub(crate) fn new(budget: usize) -> Self {
        BudgetFactor { budget }
    }
}

impl Subproblem for BudgetFactor {
    fn project(
        &mut self,
        target: &[f64],
        _additional_scores: &[f64],
        posteriors: &mut [f64],
        _additional_posteriors: &mut [f64],
    ) -> usize {
        posteriors.copy_from_slice(target);
        project_onto_budget_polytope(posteriors, self.budget as f64);
        0
    }

    fn maximize(&self, scores: &[f64], _additional_scores: &[f64]) -> f64 {
        let mut positive = scores
            .iter()
            .copied()
            .filter(|score| *score > 0.0)
            .collect::<Vec<_>>();
        positive.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        positive.iter().take(self.budget).sum()
    }

    fn evaluate(
        &self,
        assignment: &[bool],
        _additional_scores: &[f64],
        _additional_posteriors: &mut [f64],
    ) -> Option<f64> {
        (assignment.iter().filter(|value| **value).count() <= self.budget).then_some(0.0)
    }
}
