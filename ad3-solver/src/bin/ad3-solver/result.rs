use std::fmt::Display;

use thiserror::Error;

use crate::parser::ParseError;

pub(crate) type Ad3Result<T> = Result<T, Ad3SolverError>;

#[derive(Error, Debug)]
pub(crate) enum Ad3SolverError {
    #[error("IO error, more details: {0}")]
    IOError(#[from] std::io::Error),
    #[error("The file {0} is not supported.")]
    InvalidInstanceFile(String),
    #[error("The factor graph was invalid, more details: {0}")]
    InvalidFactorGraph(#[from] ParseError),
}

impl Ad3SolverError {
    pub(crate) fn invalid_instance(path: impl Display) -> Self {
        Self::InvalidInstanceFile(format!("{}", path))
    }
}
