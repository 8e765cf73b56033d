use thiserror::Error;

use crate::factors::LogicOperator;
#[cfg(doc)]
use crate::FactorGraph;

/// Errors related to declaring variables and factors in a [`FactorGraph`].
///
/// A declaration which fails leaves the graph unmodified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    /// The number of provided elements does not match what the factor requires.
    #[error("expected {expected} {what}, but {actual} were provided")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A numeric parameter has the wrong type, e.g. a cost which is not a finite integer.
    #[error("parameter `{parameter}` must be {expected}, but got {value}")]
    InvalidParameterType {
        parameter: &'static str,
        expected: &'static str,
        value: f64,
    },
    /// The parameters do not describe a valid shape for the factor.
    #[error("invalid factor shape: {0}")]
    ShapeMismatch(String),
    /// The variable with the given id was not created by this graph.
    #[error("variable {0} does not belong to this factor graph")]
    UnknownVariable(u32),
    /// The variable was declared with fewer states than requested.
    #[error("state {state} is out of range for a variable with {num_states} states")]
    StateOutOfRange { state: usize, num_states: usize },
    /// A multi-state variable needs at least one state.
    #[error("a multi-state variable needs at least one state")]
    EmptyDomain,
    /// The logic operator needs more literals than were provided.
    #[error("the {operator} factor needs at least {minimum} literals, but got {actual}")]
    NotEnoughLiterals {
        operator: LogicOperator,
        minimum: usize,
        actual: usize,
    },
    /// The same binary variable occurs more than once in a single factor.
    #[error("variable {0} occurs more than once in the factor")]
    DuplicateVariable(u32),
    /// The factor with the given id was not declared in this graph.
    #[error("factor {0} does not belong to this factor graph")]
    UnknownFactor(u32),
    /// The factor has a closed-form projection rather than an active-set solver.
    #[error("factor {0} is not solved with the active-set method")]
    NoActiveSetSolver(u32),
    /// Structural changes are not allowed once the graph has been solved.
    #[error("the factor graph has already been solved and cannot be extended")]
    GraphSealed,
}
