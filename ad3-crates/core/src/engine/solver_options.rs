use crate::optimisation::VariableSelection;

/// Options which determine how [`FactorGraph::solve`](crate::FactorGraph::solve) behaves.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolverOptions {
    /// The initial step size (penalty) of the consensus iterations.
    pub eta: f64,
    /// Whether the step size is rebalanced from the ratio between the primal and dual
    /// residuals.
    pub adapt_eta: bool,
    /// The maximum number of consensus iterations per relaxation.
    pub max_iterations: u64,
    /// The relaxation has converged when both residuals are below this threshold.
    pub residual_threshold: f64,
    /// Whether to search for an exact solution with branch-and-bound when the relaxation is
    /// fractional.
    pub branch_and_bound: bool,
    /// The variable which is branched on in a fractional node.
    pub variable_selection: VariableSelection,
    /// The maximum number of nodes explored by the branch-and-bound search.
    ///
    /// Every explored node solves a relaxation. A node is only discarded early when its bound
    /// cannot beat the incumbent or when its fixed values already violate a single factor, so
    /// proving an instance infeasible may use up the whole budget when the conflict only shows
    /// across several factors.
    pub max_nodes: u64,
    /// The number of active-set iterations per proximal step of the factors which are solved
    /// with the active-set method.
    pub max_active_set_iterations: usize,
    /// Whether the factors are projected in parallel.
    pub parallel: bool,
    /// `0` is silent, `1` logs a summary of every relaxation at the info level, higher values
    /// also log every iteration at the debug level.
    pub verbosity: u8,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            eta: 0.1,
            adapt_eta: true,
            max_iterations: 1000,
            residual_threshold: 1e-6,
            branch_and_bound: false,
            variable_selection: VariableSelection::default(),
            max_nodes: 100_000,
            max_active_set_iterations: 10,
            parallel: false,
            verbosity: 0,
        }
    }
}
