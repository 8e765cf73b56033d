use std::time::Instant;

use log::debug;
use log::warn;

use super::outputs::SolverResult;
use super::outputs::SolverStatus;
use crate::basic_types::BinaryVariable;
use crate::basic_types::ConstructionError;
use crate::basic_types::FactorId;
use crate::basic_types::Literal;
use crate::basic_types::MultiVariable;
use crate::containers::HashSet;
use crate::containers::KeyedVec;
use crate::containers::StorageKey;
use crate::engine::dual_decomposition::solve_relaxation;
use crate::engine::dual_decomposition::IntegralAssignment;
use crate::engine::SolverOptions;
use crate::engine::SolverStatistics;
use crate::factors::ActiveSetFactor;
use crate::factors::BudgetFactor;
use crate::factors::DenseFactor;
use crate::factors::Factor;
use crate::factors::FactorDefinition;
use crate::factors::FactorKind;
use crate::factors::KnapsackFactor;
use crate::factors::LogicFactor;
use crate::factors::LogicOperator;
use crate::factors::MatchingFactor;
use crate::factors::PairFactor;
use crate::factors::QpSolution;
use crate::factors::SegmentationFactor;
use crate::optimisation::branch_and_bound::branch_and_bound;
use crate::statistics::log_statistic;
use crate::statistics::log_statistic_postfix;
use crate::statistics::should_log_statistics;
use crate::statistics::Statistic;
use crate::statistics::StatisticLogger;
use crate::termination::Indefinite;
use crate::termination::TerminationCondition;

/// The main interaction point which allows the creation of variables, the declaration of
/// factors, and solving the MAP problem.
///
/// The MAP problem maximises the sum of the log-potentials of the true binary variables plus
/// the log-potentials of the additional variables of the factors, subject to every factor being
/// satisfied.
///
/// ```rust
/// # use ad3_core::FactorGraph;
/// # use ad3_core::LogicOperator;
/// # use ad3_core::SolverOptions;
/// # use ad3_core::results::SolverStatus;
/// let mut graph = FactorGraph::default();
///
/// let variables = (0..3)
///     .map(|_| graph.create_binary_variable())
///     .collect::<Vec<_>>();
/// for (variable, log_potential) in variables.iter().zip([0.5, 2.0, 1.0]) {
///     graph.set_log_potential(*variable, log_potential).unwrap();
/// }
///
/// // exactly one of the variables is true
/// let _ = graph
///     .create_factor_logic(
///         LogicOperator::Xor,
///         variables.iter().map(|variable| variable.literal()).collect(),
///     )
///     .unwrap();
///
/// let result = graph.solve(SolverOptions::default());
///
/// assert_eq!(result.status, SolverStatus::Integral);
/// assert_eq!(result.value_of(variables[1]), Some(true));
/// ```
///
/// Factor declarations are validated before the graph is changed; a declaration which fails
/// leaves the graph untouched. After the first call to [`FactorGraph::solve`] no more factors
/// can be declared, but the log-potentials can still be changed between solves.
#[derive(Clone, Debug, Default)]
pub struct FactorGraph {
    log_potentials: KeyedVec<BinaryVariable, f64>,
    multi_variables: Vec<MultiVariable>,
    /// The multi-state variables whose states are tied together by a dense factor.
    covered_by_dense: HashSet<MultiVariable>,
    /// The declared factors, followed by the implicit exactly-one factors of the multi-state
    /// variables which appear in no dense factor.
    factors: KeyedVec<FactorId, Factor>,
    num_declared_factors: usize,
    /// The number of multi-state variables which have been given their implicit factor.
    num_grouped_multi_variables: usize,
    sealed: bool,
    statistics: SolverStatistics,
}

/// Methods to create and inspect variables.
impl FactorGraph {
    /// Creates a binary variable with log-potential 0.
    pub fn create_binary_variable(&mut self) -> BinaryVariable {
        self.log_potentials.push(0.0)
    }

    /// Creates a variable with `num_states` mutually exclusive states, each with log-potential
    /// 0.
    pub fn create_multi_variable(
        &mut self,
        num_states: usize,
    ) -> Result<MultiVariable, ConstructionError> {
        if num_states == 0 {
            return Err(ConstructionError::EmptyDomain);
        }

        let first_state = self.log_potentials.next_key();
        for _ in 0..num_states {
            let _ = self.log_potentials.push(0.0);
        }
        let multi_variable = MultiVariable::new(
            self.multi_variables.len() as u32,
            first_state,
            num_states as u32,
        );
        self.multi_variables.push(multi_variable);

        Ok(multi_variable)
    }

    pub fn set_log_potential(
        &mut self,
        variable: BinaryVariable,
        log_potential: f64,
    ) -> Result<(), ConstructionError> {
        self.check_variable(variable)?;
        self.log_potentials[variable] = log_potential;
        Ok(())
    }

    pub fn set_state_log_potential(
        &mut self,
        variable: MultiVariable,
        state: usize,
        log_potential: f64,
    ) -> Result<(), ConstructionError> {
        self.check_multi_variable(variable)?;
        let state_variable =
            variable
                .get_state(state)
                .ok_or(ConstructionError::StateOutOfRange {
                    state,
                    num_states: variable.num_states(),
                })?;
        self.log_potentials[state_variable] = log_potential;
        Ok(())
    }

    pub fn log_potential(&self, variable: BinaryVariable) -> Option<f64> {
        self.log_potentials
            .contains_key(&variable)
            .then(|| self.log_potentials[variable])
    }

    /// The number of binary variables, which includes the states of the multi-state variables.
    pub fn num_binary_variables(&self) -> usize {
        self.log_potentials.len()
    }

    pub fn num_multi_variables(&self) -> usize {
        self.multi_variables.len()
    }

    /// The number of factors declared by the user.
    pub fn num_factors(&self) -> usize {
        self.num_declared_factors
    }

    fn check_variable(&self, variable: BinaryVariable) -> Result<(), ConstructionError> {
        if self.log_potentials.contains_key(&variable) {
            Ok(())
        } else {
            Err(ConstructionError::UnknownVariable(variable.id()))
        }
    }

    fn check_multi_variable(&self, variable: MultiVariable) -> Result<(), ConstructionError> {
        match self.multi_variables.get(variable.id() as usize) {
            Some(known) if *known == variable => Ok(()),
            _ => Err(ConstructionError::UnknownVariable(variable.id())),
        }
    }

    /// Checks that every literal belongs to this graph and that no variable occurs twice.
    fn check_literals(&self, literals: &[Literal]) -> Result<(), ConstructionError> {
        let mut seen: HashSet<BinaryVariable> = HashSet::default();
        for literal in literals {
            let variable = literal.variable();
            self.check_variable(variable)?;
            if !seen.insert(variable) {
                return Err(ConstructionError::DuplicateVariable(variable.id()));
            }
        }
        Ok(())
    }
}

/// Methods to declare factors.
impl FactorGraph {
    /// Declares the factor described by `definition`.
    ///
    /// Returns an error, and leaves the graph unchanged, if the definition is inconsistent or if
    /// the graph has already been solved.
    pub fn declare_factor(
        &mut self,
        definition: FactorDefinition,
    ) -> Result<FactorId, ConstructionError> {
        if self.sealed {
            return Err(ConstructionError::GraphSealed);
        }

        let dense_variables = match &definition {
            FactorDefinition::Dense { variables, .. } => variables.clone(),
            _ => vec![],
        };
        let factor = self.create_factor(definition)?;

        self.covered_by_dense.extend(dense_variables);
        self.num_declared_factors += 1;
        let kind = factor.kind.name();
        let id = self.factors.push(factor);
        debug!(
            "declared {kind} factor {} over {} variables",
            id.id(),
            self.factors[id].variables.len()
        );
        Ok(id)
    }

    /// Declares a hard logic constraint over the literals; see [`LogicOperator`] for the role
    /// of the last literal.
    pub fn create_factor_logic(
        &mut self,
        operator: LogicOperator,
        literals: Vec<Literal>,
    ) -> Result<FactorId, ConstructionError> {
        self.declare_factor(FactorDefinition::Logic { operator, literals })
    }

    /// Declares a pairwise factor which adds `edge_log_potential` when both literals are true.
    pub fn create_factor_pair(
        &mut self,
        first: Literal,
        second: Literal,
        edge_log_potential: f64,
    ) -> Result<FactorId, ConstructionError> {
        self.declare_factor(FactorDefinition::Pair {
            first,
            second,
            edge_log_potential,
        })
    }

    pub fn create_factor_budget(
        &mut self,
        literals: Vec<Literal>,
        budget: usize,
    ) -> Result<FactorId, ConstructionError> {
        self.declare_factor(FactorDefinition::Budget { literals, budget })
    }

    /// Declares that the total cost of the true literals is at most `budget`.
    ///
    /// The costs and the budget have to be non-negative integers; a negative integral budget is
    /// replaced by 0.
    pub fn create_factor_knapsack(
        &mut self,
        literals: Vec<Literal>,
        costs: Vec<f64>,
        budget: f64,
    ) -> Result<FactorId, ConstructionError> {
        self.declare_factor(FactorDefinition::Knapsack {
            literals,
            costs,
            budget,
        })
    }

    /// Declares a factor with one log-potential per joint state of `variables`, row-major with
    /// the last variable changing fastest.
    pub fn create_factor_dense(
        &mut self,
        variables: Vec<MultiVariable>,
        log_potentials: Vec<f64>,
    ) -> Result<FactorId, ConstructionError> {
        self.declare_factor(FactorDefinition::Dense {
            variables,
            log_potentials,
        })
    }

    pub fn create_factor_matching(
        &mut self,
        variables: Vec<BinaryVariable>,
        num_rows: usize,
        num_columns: usize,
    ) -> Result<FactorId, ConstructionError> {
        self.declare_factor(FactorDefinition::Matching {
            variables,
            num_rows,
            num_columns,
        })
    }

    /// Declares a segmentation of a sequence of `length` positions over one variable per
    /// interval, ordered by start and then by end, with one transition log-potential per
    /// interval which does not start at position 0.
    pub fn create_factor_binary_segmentation(
        &mut self,
        variables: Vec<BinaryVariable>,
        length: usize,
        transitions: Vec<f64>,
    ) -> Result<FactorId, ConstructionError> {
        self.declare_factor(FactorDefinition::Segmentation {
            variables,
            length,
            transitions,
        })
    }

    /// Replaces the log-potentials of the additional variables of a declared factor.
    pub fn set_additional_log_potentials(
        &mut self,
        factor: FactorId,
        log_potentials: Vec<f64>,
    ) -> Result<(), ConstructionError> {
        self.check_factor(factor)?;
        let expected = self.factors[factor].num_additionals();
        if log_potentials.len() != expected {
            return Err(ConstructionError::LengthMismatch {
                what: "additional log-potentials",
                expected,
                actual: log_potentials.len(),
            });
        }
        self.factors[factor].additional_log_potentials = log_potentials.into();
        Ok(())
    }

    fn check_factor(&self, factor: FactorId) -> Result<(), ConstructionError> {
        if factor.index() < self.num_declared_factors {
            Ok(())
        } else {
            Err(ConstructionError::UnknownFactor(factor.id()))
        }
    }

    /// Validates the definition and creates the factor, without modifying the graph.
    fn create_factor(&self, definition: FactorDefinition) -> Result<Factor, ConstructionError> {
        match definition {
            FactorDefinition::Logic { operator, literals } => {
                let minimum = operator.minimum_arity();
                if literals.len() < minimum {
                    return Err(ConstructionError::NotEnoughLiterals {
                        operator,
                        minimum,
                        actual: literals.len(),
                    });
                }
                self.check_literals(&literals)?;

                let arity = literals.len();
                Ok(Factor::new(
                    literals,
                    vec![],
                    FactorKind::Logic(LogicFactor::new(operator, arity)),
                ))
            }
            FactorDefinition::Pair {
                first,
                second,
                edge_log_potential,
            } => {
                let literals = vec![first, second];
                self.check_literals(&literals)?;

                Ok(Factor::new(
                    literals,
                    vec![edge_log_potential],
                    FactorKind::Pair(ActiveSetFactor::new(PairFactor)),
                ))
            }
            FactorDefinition::Budget { literals, budget } => {
                self.check_literals(&literals)?;

                Ok(Factor::new(
                    literals,
                    vec![],
                    FactorKind::Budget(BudgetFactor::new(budget)),
                ))
            }
            FactorDefinition::Knapsack {
                literals,
                costs,
                budget,
            } => {
                if costs.len() != literals.len() {
                    return Err(ConstructionError::LengthMismatch {
                        what: "costs",
                        expected: literals.len(),
                        actual: costs.len(),
                    });
                }
                self.check_literals(&literals)?;

                let costs = costs
                    .into_iter()
                    .map(|cost| to_non_negative_integer("cost", cost))
                    .collect::<Result<Vec<_>, _>>()?;
                let capacity = if is_integer(budget) && budget < 0.0 {
                    warn!("knapsack budget {budget} is negative and is replaced by 0");
                    0
                } else {
                    to_non_negative_integer("budget", budget)?
                };

                Ok(Factor::new(
                    literals,
                    vec![],
                    FactorKind::Knapsack(ActiveSetFactor::new(KnapsackFactor::new(
                        costs, capacity,
                    ))),
                ))
            }
            FactorDefinition::Dense {
                variables,
                log_potentials,
            } => {
                if variables.is_empty() {
                    return Err(ConstructionError::ShapeMismatch(
                        "a dense factor needs at least one variable".to_owned(),
                    ));
                }
                for variable in &variables {
                    self.check_multi_variable(*variable)?;
                }

                let num_states = variables
                    .iter()
                    .map(|variable| variable.num_states())
                    .collect::<Vec<_>>();
                let num_joint_states = num_states
                    .iter()
                    .try_fold(1_usize, |product, &states| product.checked_mul(states));
                if num_joint_states != Some(log_potentials.len()) {
                    return Err(ConstructionError::ShapeMismatch(format!(
                        "{} log-potentials do not match the joint states of variables with \
                         {num_states:?} states",
                        log_potentials.len()
                    )));
                }

                let literals = variables
                    .iter()
                    .flat_map(|variable| variable.states())
                    .map(Literal::from)
                    .collect::<Vec<_>>();
                self.check_literals(&literals)?;

                Ok(Factor::new(
                    literals,
                    log_potentials,
                    FactorKind::Dense(ActiveSetFactor::new(DenseFactor::new(num_states))),
                ))
            }
            FactorDefinition::Matching {
                variables,
                num_rows,
                num_columns,
            } => {
                if num_rows == 0 || num_columns == 0 {
                    return Err(ConstructionError::ShapeMismatch(format!(
                        "a matching needs at least one row and one column, got \
                         {num_rows}x{num_columns}"
                    )));
                }
                let expected = num_rows.saturating_mul(num_columns);
                if variables.len() != expected {
                    return Err(ConstructionError::LengthMismatch {
                        what: "variables",
                        expected,
                        actual: variables.len(),
                    });
                }

                let literals = variables.into_iter().map(Literal::from).collect::<Vec<_>>();
                self.check_literals(&literals)?;

                Ok(Factor::new(
                    literals,
                    vec![],
                    FactorKind::Matching(ActiveSetFactor::new(MatchingFactor::new(
                        num_rows,
                        num_columns,
                    ))),
                ))
            }
            FactorDefinition::Segmentation {
                variables,
                length,
                transitions,
            } => {
                if length == 0 {
                    return Err(ConstructionError::ShapeMismatch(
                        "a segmentation needs at least one position".to_owned(),
                    ));
                }
                let num_intervals = SegmentationFactor::num_intervals(length);
                if variables.len() != num_intervals {
                    return Err(ConstructionError::LengthMismatch {
                        what: "variables",
                        expected: num_intervals,
                        actual: variables.len(),
                    });
                }
                let num_transitions = SegmentationFactor::num_transitions(length);
                if transitions.len() != num_transitions {
                    return Err(ConstructionError::LengthMismatch {
                        what: "transition log-potentials",
                        expected: num_transitions,
                        actual: transitions.len(),
                    });
                }

                let literals = variables.into_iter().map(Literal::from).collect::<Vec<_>>();
                self.check_literals(&literals)?;

                Ok(Factor::new(
                    literals,
                    transitions,
                    FactorKind::Segmentation(ActiveSetFactor::new(SegmentationFactor::new(
                        length,
                    ))),
                ))
            }
        }
    }
}

fn is_integer(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

fn to_non_negative_integer(
    parameter: &'static str,
    value: f64,
) -> Result<usize, ConstructionError> {
    if is_integer(value) && value >= 0.0 {
        Ok(value as usize)
    } else {
        Err(ConstructionError::InvalidParameterType {
            parameter,
            expected: "a non-negative integer",
            value,
        })
    }
}

/// Methods for solving.
impl FactorGraph {
    /// Solves the MAP problem of the graph; see [`SolverOptions`] for the available settings.
    ///
    /// The first call seals the graph: afterwards no more factors can be declared.
    pub fn solve(&mut self, options: SolverOptions) -> SolverResult {
        self.solve_with_termination(options, &mut Indefinite)
    }

    /// Solves the MAP problem, where the branch-and-bound search (if enabled) additionally stops
    /// when `termination` triggers.
    pub fn solve_with_termination(
        &mut self,
        options: SolverOptions,
        termination: &mut impl TerminationCondition,
    ) -> SolverResult {
        let start_time = Instant::now();
        self.seal();
        self.statistics = SolverStatistics::default();

        let num_variables = self.log_potentials.len();
        let root = solve_relaxation(
            self.factors.as_mut_slice(),
            self.log_potentials.as_slice(),
            &vec![None; num_variables],
            &options,
            &mut self.statistics.engine_statistics,
        );

        let result = if !options.branch_and_bound || root.certified {
            match &root.integral {
                Some(integral) => self.integral_result(integral, root.upper_bound),
                None => self.create_result(
                    SolverStatus::Fractional,
                    root.value,
                    root.upper_bound,
                    root.consensus,
                    self.relaxed_edge_marginals(),
                ),
            }
        } else {
            // the search overwrites the posteriors of the factors
            let root_edge_marginals = self.relaxed_edge_marginals();
            let outcome = branch_and_bound(
                self.factors.as_mut_slice(),
                self.log_potentials.as_slice(),
                &root,
                &options,
                termination,
                &mut self.statistics,
            );

            match outcome.incumbent {
                Some(incumbent) => self.integral_result(&incumbent, outcome.upper_bound),
                None if outcome.exhausted => self.create_result(
                    SolverStatus::Infeasible,
                    f64::NEG_INFINITY,
                    outcome.upper_bound,
                    root.consensus,
                    root_edge_marginals,
                ),
                None => self.create_result(
                    SolverStatus::Unsolved,
                    root.value,
                    outcome.upper_bound,
                    root.consensus,
                    root_edge_marginals,
                ),
            }
        };

        self.statistics.time_spent_in_solver_ms = start_time.elapsed().as_millis() as u64;
        result
    }

    /// Solves the proximal subproblem of a single factor to optimality, for the scores of its
    /// literals (in declaration order) and of its additional variables.
    ///
    /// Only the factors which are projected with the active-set method (pair, dense, knapsack,
    /// matching and segmentation factors) support this; the warm-start cache of the factor is
    /// reused between calls.
    pub fn solve_factor_qp(
        &mut self,
        factor: FactorId,
        variable_scores: &[f64],
        additional_scores: &[f64],
    ) -> Result<QpSolution, ConstructionError> {
        self.check_factor(factor)?;
        self.factors[factor]
            .solve_qp(variable_scores, additional_scores)
            .unwrap_or(Err(ConstructionError::NoActiveSetSolver(factor.id())))
    }

    /// The statistics of the last solve.
    pub fn statistics(&self) -> SolverStatistics {
        self.statistics
    }

    /// Logs the statistics of the last solve.
    pub fn log_statistics(&self) {
        if should_log_statistics() {
            log_statistic("num_binary_variables", self.num_binary_variables());
            log_statistic("num_factors", self.factors.len());
            self.statistics.log(StatisticLogger::default());
        }
        log_statistic_postfix();
    }

    /// Prevents further factor declarations and groups the states of every new multi-state
    /// variable which is not covered by a dense factor.
    fn seal(&mut self) {
        self.sealed = true;

        while self.num_grouped_multi_variables < self.multi_variables.len() {
            let variable = self.multi_variables[self.num_grouped_multi_variables];
            self.num_grouped_multi_variables += 1;
            if self.covered_by_dense.contains(&variable) {
                continue;
            }

            let _ = self.factors.push(Factor::new(
                variable.states().map(Literal::from).collect(),
                vec![],
                FactorKind::Logic(LogicFactor::new(
                    LogicOperator::Xor,
                    variable.num_states(),
                )),
            ));
        }
    }

    fn declared_factors(&self) -> impl Iterator<Item = &Factor> {
        self.factors.iter().take(self.num_declared_factors)
    }

    fn relaxed_edge_marginals(&self) -> Vec<f64> {
        self.declared_factors()
            .flat_map(|factor| factor.dual.additional_posteriors.iter().copied())
            .collect()
    }

    fn integral_result(&self, integral: &IntegralAssignment, upper_bound: f64) -> SolverResult {
        let mut edge_marginals = Vec::new();
        for factor in self.declared_factors() {
            let local_assignment = factor
                .variables
                .iter()
                .map(|variable| integral.assignment[variable.index()])
                .collect::<Vec<_>>();
            let mut additional_posteriors = vec![0.0; factor.num_additionals()];
            let _ = factor.evaluate(&local_assignment, &mut additional_posteriors);
            edge_marginals.extend(additional_posteriors);
        }

        let marginals = integral
            .assignment
            .iter()
            .map(|&value| f64::from(u8::from(value)))
            .collect();

        self.create_result(
            SolverStatus::Integral,
            integral.value,
            upper_bound.max(integral.value),
            marginals,
            edge_marginals,
        )
    }

    fn create_result(
        &self,
        status: SolverStatus,
        value: f64,
        upper_bound: f64,
        marginals: Vec<f64>,
        edge_marginals: Vec<f64>,
    ) -> SolverResult {
        let edge_offsets = std::iter::once(0)
            .chain(self.declared_factors().scan(0, |offset, factor| {
                *offset += factor.num_additionals();
                Some(*offset)
            }))
            .collect();

        SolverResult {
            status,
            value,
            upper_bound,
            marginals,
            edge_marginals,
            edge_offsets,
            num_iterations: self.statistics.engine_statistics.num_iterations,
            num_nodes: self.statistics.search_statistics.num_nodes_explored,
        }
    }
}
