use log::debug;
use log::trace;
use log::warn;

use crate::engine::dual_decomposition::evaluate_assignment;
use crate::engine::dual_decomposition::solve_relaxation;
use crate::engine::dual_decomposition::IntegralAssignment;
use crate::engine::dual_decomposition::Relaxation;
use crate::engine::dual_decomposition::INTEGRALITY_TOLERANCE;
use crate::engine::solver_statistics::SolverStatistics;
use crate::engine::SolverOptions;
use crate::factors::Factor;
use crate::termination::Combinator;
use crate::termination::NodeBudget;
use crate::termination::TerminationCondition;

/// A node cannot improve on the incumbent when its bound exceeds it by at most this much.
const PRUNING_TOLERANCE: f64 = 1e-9;

/// An open node of the search tree.
#[derive(Clone, Debug)]
struct Node {
    fixed: Vec<Option<bool>>,
    /// The bound of the parent, which is also valid for this node.
    parent_bound: f64,
}

/// The outcome of the branch-and-bound search.
#[derive(Clone, Debug)]
pub(crate) struct SearchOutcome {
    /// The best feasible assignment found.
    pub(crate) incumbent: Option<IntegralAssignment>,
    /// Whether the whole tree was explored, which proves the incumbent optimal (or the problem
    /// infeasible when there is none).
    pub(crate) exhausted: bool,
    /// An upper bound on the MAP value.
    pub(crate) upper_bound: f64,
}

fn cannot_improve(bound: f64, incumbent: &Option<IntegralAssignment>) -> bool {
    incumbent.as_ref().is_some_and(|incumbent| {
        bound <= incumbent.value + PRUNING_TOLERANCE * incumbent.value.abs().max(1.0)
    })
}

fn update_incumbent(
    incumbent: &mut Option<IntegralAssignment>,
    candidate: IntegralAssignment,
    statistics: &mut SolverStatistics,
) {
    let improves = match incumbent {
        Some(incumbent) => candidate.value > incumbent.value,
        None => true,
    };
    if improves {
        debug!("new incumbent with value {}", candidate.value);
        statistics.search_statistics.num_incumbent_updates += 1;
        *incumbent = Some(candidate);
    }
}

/// Pushes the two children of `node` created by branching on `variable`; the child which
/// agrees with the rounded `preferred_value` is explored first.
fn branch(
    stack: &mut Vec<Node>,
    node: &Node,
    variable: usize,
    preferred_value: bool,
    bound: f64,
) {
    for value in [!preferred_value, preferred_value] {
        let mut fixed = node.fixed.clone();
        fixed[variable] = Some(value);
        stack.push(Node {
            fixed,
            parent_bound: bound,
        });
    }
}

/// Picks the variable to branch on, falling back to the first unfixed variable when the
/// consensus is integral on every unfixed variable but was not accepted.
fn select_variable(
    relaxation: &Relaxation,
    fixed: &[Option<bool>],
    options: &SolverOptions,
) -> Option<usize> {
    options
        .variable_selection
        .select(&relaxation.consensus, fixed, INTEGRALITY_TOLERANCE)
        .or_else(|| fixed.iter().position(|value| value.is_none()))
}

/// Searches for a MAP assignment by depth-first branch-and-bound, starting from the relaxation
/// of the root.
pub(crate) fn branch_and_bound(
    factors: &mut [Factor],
    log_potentials: &[f64],
    root: &Relaxation,
    options: &SolverOptions,
    termination: &mut impl TerminationCondition,
    statistics: &mut SolverStatistics,
) -> SearchOutcome {
    let mut termination = Combinator::new(NodeBudget::new(options.max_nodes), termination);
    let mut incumbent = root.integral.clone();

    if root.certified {
        return SearchOutcome {
            upper_bound: root.upper_bound,
            incumbent,
            exhausted: true,
        };
    }

    let num_variables = log_potentials.len();
    let root_node = Node {
        fixed: vec![None; num_variables],
        parent_bound: root.upper_bound,
    };
    let mut stack = Vec::new();
    if let Some(variable) = select_variable(root, &root_node.fixed, options) {
        let preferred = root.consensus[variable] >= 0.5;
        branch(&mut stack, &root_node, variable, preferred, root.upper_bound);
    }

    let mut exhausted = true;
    while let Some(node) = stack.pop() {
        if termination.should_stop() {
            stack.push(node);
            exhausted = false;
            break;
        }

        if cannot_improve(node.parent_bound, &incumbent) {
            statistics.search_statistics.num_nodes_pruned += 1;
            continue;
        }

        if !factors.iter().all(|factor| factor.admits(&node.fixed)) {
            trace!("pruning a node which violates a hard constraint");
            statistics.search_statistics.num_nodes_pruned += 1;
            continue;
        }

        if node.fixed.iter().all(|value| value.is_some()) {
            let assignment = node
                .fixed
                .iter()
                .map(|value| value.unwrap_or(false))
                .collect::<Vec<_>>();
            if let Some(value) = evaluate_assignment(factors, log_potentials, &assignment) {
                update_incumbent(
                    &mut incumbent,
                    IntegralAssignment { assignment, value },
                    statistics,
                );
            }
            continue;
        }

        let relaxation = solve_relaxation(
            factors,
            log_potentials,
            &node.fixed,
            options,
            &mut statistics.engine_statistics,
        );
        statistics.search_statistics.num_nodes_explored += 1;
        termination.node_has_been_explored();

        let bound = relaxation.upper_bound.min(node.parent_bound);
        if let Some(integral) = relaxation.integral.clone() {
            update_incumbent(&mut incumbent, integral, statistics);
        }

        if relaxation.certified || cannot_improve(bound, &incumbent) {
            statistics.search_statistics.num_nodes_pruned += 1;
            continue;
        }

        if let Some(variable) = select_variable(&relaxation, &node.fixed, options) {
            let preferred = relaxation.consensus[variable] >= 0.5;
            branch(&mut stack, &node, variable, preferred, bound);
        }
    }

    let upper_bound = if exhausted {
        incumbent
            .as_ref()
            .map_or(f64::NEG_INFINITY, |incumbent| incumbent.value)
    } else {
        let open_bound = stack
            .iter()
            .map(|node| node.parent_bound)
            .fold(f64::NEG_INFINITY, f64::max);
        let incumbent_value = incumbent
            .as_ref()
            .map_or(f64::NEG_INFINITY, |incumbent| incumbent.value);
        open_bound.max(incumbent_value).min(root.upper_bound)
    };

    if !exhausted {
        if incumbent.is_some() {
            warn!("the search budget was exhausted; the returned solution is not proven optimal");
        } else {
            warn!("the search budget was exhausted before a feasible solution was found");
        }
    }

    SearchOutcome {
        incumbent,
        exhausted,
        upper_bound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::BinaryVariable;
    use crate::containers::StorageKey;
    use crate::engine::solver_statistics::EngineStatistics;
    use crate::factors::ActiveSetFactor;
    use crate::factors::FactorKind;
    use crate::factors::KnapsackFactor;
    use crate::factors::LogicFactor;
    use crate::factors::LogicOperator;
    use crate::termination::Indefinite;

    fn variable(index: usize) -> BinaryVariable {
        BinaryVariable::create_from_index(index)
    }

    fn knapsack() -> Vec<Factor> {
        vec![Factor::new(
            (0..5).map(|index| variable(index).literal()).collect(),
            vec![],
            FactorKind::Knapsack(ActiveSetFactor::new(KnapsackFactor::new(
                vec![3, 5, 5, 5, 2],
                5,
            ))),
        )]
    }

    fn solve(
        factors: &mut [Factor],
        log_potentials: &[f64],
        termination: &mut impl TerminationCondition,
    ) -> (SearchOutcome, SolverStatistics) {
        let options = SolverOptions::default();
        let root = solve_relaxation(
            factors,
            log_potentials,
            &vec![None; log_potentials.len()],
            &options,
            &mut EngineStatistics::default(),
        );
        let mut statistics = SolverStatistics::default();
        let outcome = branch_and_bound(
            factors,
            log_potentials,
            &root,
            &options,
            termination,
            &mut statistics,
        );
        (outcome, statistics)
    }

    #[test]
    fn knapsack_search_finds_the_optimum() {
        let log_potentials = [100.0, 1.0, 100.0, 1.0, 100.0];

        let (outcome, _) = solve(&mut knapsack(), &log_potentials, &mut Indefinite);

        assert!(outcome.exhausted);
        let incumbent = outcome.incumbent.expect("feasible problem");
        assert_eq!(incumbent.assignment, vec![true, false, false, false, true]);
        assert_eq!(incumbent.value, 200.0);
    }

    /// Pairwise XORs over an odd cycle; the relaxation is satisfied by all variables at 0.5
    /// but no assignment is feasible.
    fn odd_cycle() -> Vec<Factor> {
        let xor = |first: usize, second: usize| {
            Factor::new(
                vec![variable(first).literal(), variable(second).literal()],
                vec![],
                FactorKind::Logic(LogicFactor::new(LogicOperator::Xor, 2)),
            )
        };
        vec![xor(0, 1), xor(0, 2), xor(1, 2)]
    }

    #[test]
    fn odd_cycle_of_xors_is_infeasible() {
        let (outcome, statistics) = solve(&mut odd_cycle(), &[0.1, 0.2, 0.3], &mut Indefinite);

        assert!(outcome.exhausted);
        assert!(outcome.incumbent.is_none());
        assert!(statistics.search_statistics.num_nodes_explored > 0);
    }

    #[test]
    fn nodes_violating_a_hard_constraint_are_pruned_without_a_relaxation() {
        // the odd cycle over the first three variables, followed by unconstrained ones
        let mut log_potentials = vec![0.1, 0.2, 0.3];
        log_potentials.extend((0..20).map(|index| if index % 2 == 0 { 1.0 } else { -1.0 }));

        let (outcome, statistics) = solve(&mut odd_cycle(), &log_potentials, &mut Indefinite);

        assert!(outcome.exhausted);
        assert!(outcome.incumbent.is_none());
        assert!(statistics.search_statistics.num_nodes_explored <= 8);
        assert!(statistics.search_statistics.num_nodes_pruned > 0);
    }

    #[test]
    fn exhausted_budget_without_incumbent_is_reported() {
        let (outcome, _) = solve(&mut odd_cycle(), &[0.1, 0.2, 0.3], &mut NodeBudget::new(0));

        assert!(!outcome.exhausted);
        assert!(outcome.incumbent.is_none());
    }
}
