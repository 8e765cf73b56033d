pub(crate) mod dual_decomposition;
mod solver_options;
pub(crate) mod solver_statistics;
pub mod termination;

pub use solver_options::SolverOptions;
pub use solver_statistics::EngineStatistics;
pub use solver_statistics::SearchStatistics;
pub use solver_statistics::SolverStatistics;
