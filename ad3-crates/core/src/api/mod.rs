pub(crate) mod factor_graph;
mod outputs;

pub mod results {
    //! Contains the outputs of solving a [`FactorGraph`].
    //!
    //! Every solve produces a [`SolverResult`] whose [`SolverStatus`] tells whether the marginals
    //! form an assignment:
    //! - [`SolverStatus::Integral`] when a feasible 0/1 assignment was found
    //! - [`SolverStatus::Fractional`] when only the relaxation was solved and it is fractional
    //! - [`SolverStatus::Infeasible`] and [`SolverStatus::Unsolved`] when the branch-and-bound
    //!   search proved infeasibility or ran out of budget
    pub use crate::api::outputs::SolverResult;
    pub use crate::api::outputs::SolverStatus;
    pub use crate::factors::QpSolution;
    #[cfg(doc)]
    use crate::FactorGraph;
}

pub mod variables {
    //! Contains the variables of a [`FactorGraph`].
    //!
    //! We define 2 types of variables:
    //! - Binary variables ([`BinaryVariable`]) - These are created using
    //!   [`FactorGraph::create_binary_variable`]. A [`Literal`] is a binary variable which is
    //!   possibly negated; factors are declared over literals.
    //! - Multi-state variables ([`MultiVariable`]) - These are created using
    //!   [`FactorGraph::create_multi_variable`] and consist of one binary variable per state,
    //!   exactly one of which is true.
    pub use crate::basic_types::BinaryVariable;
    pub use crate::basic_types::FactorId;
    pub use crate::basic_types::Literal;
    pub use crate::basic_types::MultiVariable;
    #[cfg(doc)]
    use crate::FactorGraph;
}

pub mod options {
    //! Contains the options which can be passed to [`FactorGraph::solve`].
    //!
    //! These influence the following aspects:
    //! - The step size of the consensus iterations
    //! - The stopping criteria of a single relaxation
    //! - Whether and how the branch-and-bound search branches
    pub use crate::engine::SolverOptions;
    pub use crate::optimisation::VariableSelection;
    #[cfg(doc)]
    use crate::FactorGraph;
}

pub mod termination {
    //! Contains the conditions which are used to determine when the branch-and-bound search of
    //! [`FactorGraph::solve_with_termination`] should stop even when optimality has not been
    //! proven.
    //!
    //! The most common example would be [`TimeBudget`], which stops the search whenever the time
    //! budget is exceeded.
    pub use crate::engine::termination::combinator::*;
    pub use crate::engine::termination::indefinite::*;
    pub use crate::engine::termination::node_budget::*;
    pub use crate::engine::termination::time_budget::*;
    pub use crate::engine::termination::TerminationCondition;
    #[cfg(doc)]
    use crate::FactorGraph;
}
