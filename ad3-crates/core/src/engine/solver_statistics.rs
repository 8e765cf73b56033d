use crate::create_statistics_struct;

create_statistics_struct!(
    /// Structure responsible for storing several statistics of the last solve of a
    /// [`FactorGraph`](crate::FactorGraph).
    SolverStatistics {
        /// Statistics of the consensus iterations
        engine_statistics: EngineStatistics,
        /// Statistics of the branch-and-bound search
        search_statistics: SearchStatistics,
        /// The amount of time (in milliseconds) which is spent in the solver
        time_spent_in_solver_ms: u64,
    }
);

create_statistics_struct!(
    /// Statistics of the consensus iterations, accumulated over all relaxations.
    EngineStatistics {
        /// The number of relaxations which were solved
        num_relaxations: u64,
        /// The number of consensus iterations
        num_iterations: u64,
        /// The number of iterations spent inside the projections of the factors
        num_inner_iterations: u64,
        /// The number of times the step size was rescaled
        num_eta_adaptations: u64,
        /// The step size at the end of the last relaxation
        final_eta: f64,
});

create_statistics_struct!(
    /// Statistics of the branch-and-bound search.
    SearchStatistics {
        /// The number of nodes for which a relaxation was solved
        num_nodes_explored: u64,
        /// The number of nodes discarded because their bound could not beat the incumbent
        num_nodes_pruned: u64,
        /// The number of times a better integral solution was found
        num_incumbent_updates: u64,
});
