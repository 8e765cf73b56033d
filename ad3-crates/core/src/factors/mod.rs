//! The catalogue of factors.
//!
//! Every factor solves two local problems for the consensus loop: the proximal projection
//! `max b . r - 1/2 |q - a|^2` over its marginal polytope, and the MAP problem
//! `max w . q + c . r` which yields the dual bound. [`LogicOperator`] factors and budgets have
//! closed-form projections; the other factors only provide a MAP oracle through
//! [`GenericFactor`] and are projected by the [`ActiveSetFactor`] solver.
mod active_set;
mod budget;
mod dense;
mod knapsack;
mod logic;
mod matching;
mod pair;
pub(crate) mod projections;
mod segmentation;

pub use active_set::ActiveSetCache;
pub use active_set::ActiveSetFactor;
pub use active_set::GenericFactor;
pub use active_set::QpSolution;
pub(crate) use budget::BudgetFactor;
pub use dense::DenseFactor;
pub use knapsack::KnapsackFactor;
pub(crate) use logic::LogicFactor;
pub use logic::LogicOperator;
pub use matching::MatchingFactor;
pub use pair::PairFactor;
pub use segmentation::SegmentationFactor;

use crate::basic_types::BinaryVariable;
use crate::basic_types::ConstructionError;
use crate::basic_types::Literal;
use crate::basic_types::MultiVariable;
use crate::containers::StorageKey;

/// The description of a factor which is passed to
/// [`FactorGraph::declare_factor`](crate::FactorGraph::declare_factor).
#[derive(Clone, Debug, PartialEq)]
pub enum FactorDefinition {
    /// A hard logic constraint over the literals.
    Logic {
        operator: LogicOperator,
        literals: Vec<Literal>,
    },
    /// A pairwise factor whose single additional variable is `first AND second`.
    Pair {
        first: Literal,
        second: Literal,
        edge_log_potential: f64,
    },
    /// At most `budget` of the literals are true.
    Budget { literals: Vec<Literal>, budget: usize },
    /// The total cost of the true literals is at most `budget`; costs and budget must be
    /// non-negative integers.
    Knapsack {
        literals: Vec<Literal>,
        costs: Vec<f64>,
        budget: f64,
    },
    /// A factor with one log-potential per joint state of the multi-state variables.
    Dense {
        variables: Vec<MultiVariable>,
        log_potentials: Vec<f64>,
    },
    /// A bipartite matching over `num_rows * num_columns` variables in row-major order.
    Matching {
        variables: Vec<BinaryVariable>,
        num_rows: usize,
        num_columns: usize,
    },
    /// A semi-Markov segmentation over one variable per interval of a sequence of `length`
    /// positions, with one transition log-potential per interval which does not start at 0.
    Segmentation {
        variables: Vec<BinaryVariable>,
        length: usize,
        transitions: Vec<f64>,
    },
}

/// The local problems of a factor, expressed over its literals (negations already applied).
pub(crate) trait Subproblem {
    /// Writes the solution of `max b . r - 1/2 |q - a|^2` over the marginal polytope, where
    /// `a` is `target` and `b` are the `additional_scores`. Returns the number of inner
    /// iterations which were needed.
    fn project(
        &mut self,
        target: &[f64],
        additional_scores: &[f64],
        posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    ) -> usize;

    /// The value of the best configuration for the given scores.
    fn maximize(&self, scores: &[f64], additional_scores: &[f64]) -> f64;

    /// Returns the score of the additional variables for a 0/1 assignment of the literals, and
    /// writes their values; `None` if the assignment violates the factor.
    fn evaluate(
        &self,
        assignment: &[bool],
        additional_scores: &[f64],
        additional_posteriors: &mut [f64],
    ) -> Option<f64>;

    /// Forgets any warm-start state.
    fn reset(&mut self) {}
}

#[derive(Clone, Debug)]
pub(crate) enum FactorKind {
    Logic(LogicFactor),
    Budget(BudgetFactor),
    Pair(ActiveSetFactor<PairFactor>),
    Dense(ActiveSetFactor<DenseFactor>),
    Knapsack(ActiveSetFactor<KnapsackFactor>),
    Matching(ActiveSetFactor<MatchingFactor>),
    Segmentation(ActiveSetFactor<SegmentationFactor>),
}

macro_rules! dispatch {
    ($kind:expr, $factor:ident => $body:expr) => {
        match $kind {
            FactorKind::Logic($factor) => $body,
            FactorKind::Budget($factor) => $body,
            FactorKind::Pair($factor) => $body,
            FactorKind::Dense($factor) => $body,
            FactorKind::Knapsack($factor) => $body,
            FactorKind::Matching($factor) => $body,
            FactorKind::Segmentation($factor) => $body,
        }
    };
}

impl FactorKind {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            FactorKind::Logic(_) => "logic",
            FactorKind::Budget(_) => "budget",
            FactorKind::Pair(_) => "pair",
            FactorKind::Dense(_) => "dense",
            FactorKind::Knapsack(_) => "knapsack",
            FactorKind::Matching(_) => "matching",
            FactorKind::Segmentation(_) => "segmentation",
        }
    }

    fn set_max_active_set_iterations(&mut self, max_iterations: usize) {
        match self {
            FactorKind::Logic(_) | FactorKind::Budget(_) => {}
            FactorKind::Pair(factor) => factor.set_max_iterations(max_iterations),
            FactorKind::Dense(factor) => factor.set_max_iterations(max_iterations),
            FactorKind::Knapsack(factor) => factor.set_max_iterations(max_iterations),
            FactorKind::Matching(factor) => factor.set_max_iterations(max_iterations),
            FactorKind::Segmentation(factor) => factor.set_max_iterations(max_iterations),
        }
    }

    /// Solves the proximal problem to optimality; `None` for factors with a closed-form
    /// projection.
    fn solve_qp(
        &mut self,
        variable_scores: &[f64],
        additional_scores: &[f64],
    ) -> Option<Result<QpSolution, ConstructionError>> {
        match self {
            FactorKind::Logic(_) | FactorKind::Budget(_) => None,
            FactorKind::Pair(factor) => Some(factor.solve_qp(variable_scores, additional_scores)),
            FactorKind::Dense(factor) => Some(factor.solve_qp(variable_scores, additional_scores)),
            FactorKind::Knapsack(factor) => {
                Some(factor.solve_qp(variable_scores, additional_scores))
            }
            FactorKind::Matching(factor) => {
                Some(factor.solve_qp(variable_scores, additional_scores))
            }
            FactorKind::Segmentation(factor) => {
                Some(factor.solve_qp(variable_scores, additional_scores))
            }
        }
    }
}

impl Subproblem for FactorKind {
    fn project(
        &mut self,
        target: &[f64],
        additional_scores: &[f64],
        posteriors: &mut [f64],
        additional_posteriors: &mut [f64],
    ) -> usize {
        dispatch!(self, factor => factor.project(target, additional_scores, posteriors, additional_posteriors))
    }

    fn maximize(&self, scores: &[f64], additional_scores: &[f64]) -> f64 {
        dispatch!(self, factor => factor.maximize(scores, additional_scores))
    }

    fn evaluate(
        &self,
        assignment: &[bool],
        additional_scores: &[f64],
        additional_posteriors: &mut [f64],
    ) -> Option<f64> {
        dispatch!(self, factor => factor.evaluate(assignment, additional_scores, additional_posteriors))
    }

    fn reset(&mut self) {
        dispatch!(self, factor => factor.reset())
    }
}

/// The state of a factor which lives for the duration of a single solve.
#[derive(Clone, Debug, Default)]
pub(crate) struct DualState {
    /// One Lagrange multiplier per incident variable.
    pub(crate) multipliers: Vec<f64>,
    /// The local copies `q_f` of the marginals of the incident variables.
    pub(crate) posteriors: Vec<f64>,
    pub(crate) additional_posteriors: Vec<f64>,
    target: Vec<f64>,
    literal_posteriors: Vec<f64>,
    additional_scores: Vec<f64>,
    /// Inner iterations used by the projections since the last reset.
    pub(crate) num_inner_iterations: u64,
}

/// A factor as stored by the [`FactorGraph`](crate::FactorGraph).
///
/// The [`FactorKind`] works over the literals of the factor; this struct translates between
/// variables and literals by flipping the values of negated literals.
#[derive(Clone, Debug)]
pub(crate) struct Factor {
    pub(crate) variables: Box<[BinaryVariable]>,
    negated: Box<[bool]>,
    pub(crate) additional_log_potentials: Box<[f64]>,
    pub(crate) kind: FactorKind,
    pub(crate) dual: DualState,
}

impl Factor {
    pub(crate) fn new(
        literals: Vec<Literal>,
        additional_log_potentials: Vec<f64>,
        kind: FactorKind,
    ) -> Self {
        Factor {
            variables: literals.iter().map(|literal| literal.variable()).collect(),
            negated: literals.iter().map(|literal| literal.is_negated()).collect(),
            additional_log_potentials: additional_log_potentials.into(),
            kind,
            dual: DualState::default(),
        }
    }

    pub(crate) fn num_additionals(&self) -> usize {
        self.additional_log_potentials.len()
    }

    /// Clears the dual state and the warm-start caches before a solve.
    pub(crate) fn reset(&mut self, max_active_set_iterations: usize) {
        let num_variables = self.variables.len();
        let num_additionals = self.num_additionals();

        self.kind.reset();
        self.kind
            .set_max_active_set_iterations(max_active_set_iterations);
        self.dual = DualState {
            multipliers: vec![0.0; num_variables],
            posteriors: vec![0.0; num_variables],
            additional_posteriors: vec![0.0; num_additionals],
            target: vec![0.0; num_variables],
            literal_posteriors: vec![0.0; num_variables],
            additional_scores: vec![0.0; num_additionals],
            num_inner_iterations: 0,
        };
    }

    /// Solves the proximal step of the factor for step size `eta`: the local posteriors are
    /// projected from `p + (theta_f + lambda_f) / eta`, where `theta_f` is the share of the
    /// log-potentials of this factor.
    pub(crate) fn solve_proximal_step(
        &mut self,
        consensus: &[f64],
        log_potentials: &[f64],
        degrees: &[usize],
        eta: f64,
    ) {
        let Factor {
            variables,
            negated,
            additional_log_potentials,
            kind,
            dual,
        } = self;

        for (index, variable) in variables.iter().enumerate() {
            let variable = variable.index();
            let share = log_potentials[variable] / degrees[variable] as f64;
            let target = consensus[variable] + (share + dual.multipliers[index]) / eta;
            dual.target[index] = if negated[index] { 1.0 - target } else { target };
        }
        for (score, log_potential) in dual
            .additional_scores
            .iter_mut()
            .zip(additional_log_potentials.iter())
        {
            *score = log_potential / eta;
        }

        dual.num_inner_iterations += kind.project(
            &dual.target,
            &dual.additional_scores,
            &mut dual.literal_posteriors,
            &mut dual.additional_posteriors,
        ) as u64;

        for ((posterior, literal_posterior), is_negated) in dual
            .posteriors
            .iter_mut()
            .zip(dual.literal_posteriors.iter())
            .zip(negated.iter())
        {
            *posterior = if *is_negated {
                1.0 - literal_posterior
            } else {
                *literal_posterior
            };
        }
    }

    /// The MAP value of the factor when its variables are scored with `scores`.
    pub(crate) fn maximize(&self, scores: &[f64]) -> f64 {
        let mut constant = 0.0;
        let literal_scores = scores
            .iter()
            .zip(self.negated.iter())
            .map(|(&score, &is_negated)| {
                if is_negated {
                    constant += score;
                    -score
                } else {
                    score
                }
            })
            .collect::<Vec<_>>();

        constant
            + self
                .kind
                .maximize(&literal_scores, &self.additional_log_potentials)
    }

    /// Whether some feasible configuration of the factor agrees with the values in `fixed`,
    /// which is indexed by variable.
    ///
    /// Fixed-true literals are scored 1, fixed-false literals -1 and free ones 0, so a
    /// configuration agrees exactly when it reaches the number of fixed-true literals.
    pub(crate) fn admits(&self, fixed: &[Option<bool>]) -> bool {
        let mut num_required = 0;
        let literal_scores = self
            .variables
            .iter()
            .zip(self.negated.iter())
            .map(|(variable, &is_negated)| {
                match fixed[variable.index()].map(|value| value != is_negated) {
                    Some(true) => {
                        num_required += 1;
                        1.0
                    }
                    Some(false) => -1.0,
                    None => 0.0,
                }
            })
            .collect::<Vec<_>>();
        if literal_scores.iter().all(|score| *score == 0.0) {
            return true;
        }

        let additional_scores = vec![0.0; self.additional_log_potentials.len()];
        self.kind.maximize(&literal_scores, &additional_scores) > num_required as f64 - 0.5
    }

    /// Checks a 0/1 assignment of the variables of the factor; see [`Subproblem::evaluate`].
    pub(crate) fn evaluate(
        &self,
        assignment: &[bool],
        additional_posteriors: &mut [f64],
    ) -> Option<f64> {
        let literal_assignment = assignment
            .iter()
            .zip(self.negated.iter())
            .map(|(&value, &is_negated)| value != is_negated)
            .collect::<Vec<_>>();

        self.kind.evaluate(
            &literal_assignment,
            &self.additional_log_potentials,
            additional_posteriors,
        )
    }

    pub(crate) fn solve_qp(
        &mut self,
        variable_scores: &[f64],
        additional_scores: &[f64],
    ) -> Option<Result<QpSolution, ConstructionError>> {
        self.kind.solve_qp(variable_scores, additional_scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literals(negated: &[bool]) -> Vec<Literal> {
        negated
            .iter()
            .enumerate()
            .map(|(index, &negated)| Literal::new(BinaryVariable::new(index as u32), negated))
            .collect()
    }

    #[test]
    fn negated_literals_flip_the_map_scores() {
        // OR(!x0, x1): the best assignment with x0 = 1 and x1 = 0 is infeasible
        let factor = Factor::new(
            literals(&[true, false]),
            vec![],
            FactorKind::Logic(LogicFactor::new(LogicOperator::Or, 2)),
        );

        assert_eq!(factor.maximize(&[2.0, -1.0]), 2.0 - 1.0);
        assert_eq!(factor.maximize(&[-2.0, -1.0]), 0.0);
    }

    #[test]
    fn negated_literals_flip_the_assignment() {
        let factor = Factor::new(
            literals(&[true, false]),
            vec![],
            FactorKind::Logic(LogicFactor::new(LogicOperator::Xor, 2)),
        );

        assert_eq!(factor.evaluate(&[true, true], &mut []), Some(0.0));
        assert_eq!(factor.evaluate(&[false, true], &mut []), None);
    }

    #[test]
    fn fixed_values_are_admitted_when_a_configuration_agrees() {
        // XOR(!x0, x1) forces x0 = x1
        let factor = Factor::new(
            literals(&[true, false]),
            vec![],
            FactorKind::Logic(LogicFactor::new(LogicOperator::Xor, 2)),
        );

        assert!(factor.admits(&[None, None]));
        assert!(factor.admits(&[Some(true), None]));
        assert!(factor.admits(&[Some(true), Some(true)]));
        assert!(!factor.admits(&[Some(true), Some(false)]));
        assert!(!factor.admits(&[Some(false), Some(true)]));
    }

    #[test]
    fn proximal_step_projects_in_variable_space() {
        // XOR(!x0, x1) forces x0 = x1
        let mut factor = Factor::new(
            literals(&[true, false]),
            vec![],
            FactorKind::Logic(LogicFactor::new(LogicOperator::Xor, 2)),
        );
        factor.reset(10);

        factor.solve_proximal_step(&[0.5, 0.5], &[1.0, 1.0], &[1, 1], 1.0);

        assert!((factor.dual.posteriors[0] - factor.dual.posteriors[1]).abs() < 1e-9);
        assert!((factor.dual.posteriors[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pair_factor_reports_the_edge_value_of_an_assignment() {
        let factor = Factor::new(
            literals(&[false, true]),
            vec![0.7],
            FactorKind::Pair(ActiveSetFactor::new(PairFactor)),
        );
        let mut edge = [0.0];

        let value = factor.evaluate(&[true, false], &mut edge);

        assert_eq!(value, Some(0.7));
        assert_eq!(edge, [1.0]);
    }
}
