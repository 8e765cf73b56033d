//! Exact MAP inference by branch-and-bound over the relaxation.
pub(crate) mod branch_and_bound;
mod variable_selection;

pub use variable_selection::VariableSelection;
