//! # AD3
//! An engine for maximum-a-posteriori (MAP) inference in factor graphs over discrete variables,
//! based on the alternating directions dual decomposition algorithm (AD3).
//!
//! A [`FactorGraph`] consists of binary and multi-state variables, each state carrying a
//! log-potential, and of factors which are hard constraints over (possibly negated) binary
//! variables, or which score the joint states of their variables. The solver looks for the
//! assignment which maximises the total log-potential while satisfying every factor.
//!
//! Every call to [`FactorGraph::solve`] first solves the linear relaxation of the problem: the
//! factors repeatedly solve a small quadratic problem over their own marginal polytope, after
//! which their local marginals are averaged into a consensus and the Lagrange multipliers which
//! enforce agreement are updated. When the relaxation is not integral and
//! [`SolverOptions::branch_and_bound`] is set, a depth-first branch-and-bound search uses the
//! relaxation as an upper bound to find a provably optimal assignment.
//!
//! # Factors
//! The following factors can be declared (see [`FactorDefinition`]):
//! - Logic constraints ([`LogicOperator`]): `XOR`, `XOROUT`, `ATMOSTONE`, `OR`, `OROUT`,
//!   `ANDOUT` and `IMPLY`
//! - Pairwise factors, which score the conjunction of two literals
//! - Budget and knapsack constraints
//! - Dense factors, which score every joint state of a number of multi-state variables
//! - Bipartite matchings
//! - Semi-Markov segmentations
//!
//! # Using AD3
//! ```rust
//! # use ad3_core::FactorGraph;
//! # use ad3_core::SolverOptions;
//! # use ad3_core::results::SolverStatus;
//! let mut graph = FactorGraph::default();
//!
//! // Two variables with three states each
//! let first = graph.create_multi_variable(3).unwrap();
//! let second = graph.create_multi_variable(3).unwrap();
//! for (state, (first_potential, second_potential)) in
//!     [(10.0, 1000.0), (11.0, 1100.0), (0.0, 1200.0)].into_iter().enumerate()
//! {
//!     graph.set_state_log_potential(first, state, first_potential).unwrap();
//!     graph.set_state_log_potential(second, state, second_potential).unwrap();
//! }
//!
//! // A dense factor which rewards the two variables for taking equal states
//! let mut log_potentials = vec![0.0; 9];
//! for state in 0..3 {
//!     log_potentials[state * 3 + state] = 5.0;
//! }
//! let _ = graph
//!     .create_factor_dense(vec![first, second], log_potentials)
//!     .unwrap();
//!
//! let result = graph.solve(SolverOptions {
//!     branch_and_bound: true,
//!     ..Default::default()
//! });
//!
//! assert_eq!(result.status, SolverStatus::Integral);
//! assert_eq!(result.best_state(first), 1);
//! assert_eq!(result.best_state(second), 2);
//! ```
#[doc(hidden)]
pub mod asserts;
pub(crate) mod basic_types;
pub mod containers;
pub(crate) mod engine;
pub mod factors;
pub mod optimisation;
pub mod statistics;

pub use convert_case;

// We declare a private module with public use, so that all exports from API are exports directly
// from the crate.
//
// Example:
// `use ad3_core::FactorGraph;`
// vs.
// `use ad3_core::api::FactorGraph;`
mod api;

pub use api::*;

pub use crate::api::factor_graph::FactorGraph;
pub use crate::basic_types::BinaryVariable;
pub use crate::basic_types::ConstructionError;
pub use crate::basic_types::FactorId;
pub use crate::basic_types::Literal;
pub use crate::basic_types::MultiVariable;
pub use crate::engine::EngineStatistics;
pub use crate::engine::SearchStatistics;
pub use crate::engine::SolverOptions;
pub use crate::engine::SolverStatistics;
pub use crate::factors::FactorDefinition;
pub use crate::factors::LogicOperator;
