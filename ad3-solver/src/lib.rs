//! # AD3 solver
//! MAP inference in factor graphs with the alternating directions dual decomposition algorithm.
//!
//! This crate re-exports the library in [`ad3_core`] and ships the `ad3-solver` binary, which
//! reads a factor graph in a line-based text format, solves it and prints the marginals.
//!
//! ```rust
//! # use ad3_solver::FactorGraph;
//! # use ad3_solver::SolverOptions;
//! # use ad3_solver::results::SolverStatus;
//! let mut graph = FactorGraph::default();
//! let variables = (0..5)
//!     .map(|_| graph.create_binary_variable())
//!     .collect::<Vec<_>>();
//! for (variable, log_potential) in variables.iter().zip([100.0, 1.0, 100.0, 1.0, 100.0]) {
//!     graph.set_log_potential(*variable, log_potential).unwrap();
//! }
//!
//! // the total cost of the true variables is at most 5
//! let _ = graph
//!     .create_factor_knapsack(
//!         variables.iter().map(|variable| variable.literal()).collect(),
//!         vec![3.0, 5.0, 5.0, 5.0, 2.0],
//!         5.0,
//!     )
//!     .unwrap();
//!
//! let result = graph.solve(SolverOptions {
//!     branch_and_bound: true,
//!     ..Default::default()
//! });
//!
//! assert_eq!(result.status, SolverStatus::Integral);
//! assert_eq!(result.marginals, vec![1.0, 0.0, 0.0, 0.0, 1.0]);
//! ```
pub use ad3_core::*;
