//! Error types for the association engine.

use crate::utils::parallel::ParallelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssociationError {
    /// Input tables disagree with each other (e.g. a membership set reaches
    /// outside the sample universe).
    #[error("Input consistency error: {0}")]
    InputConsistency(String),

    #[error("Mutation label not found in membership index: {0}")]
    UnknownLabel(String),

    /// A strategy was handed parameters or a table it cannot evaluate.
    #[error("Numerical domain error: {0}")]
    NumericalDomain(String),

    #[error("Parallel execution error: {0}")]
    Parallel(#[from] ParallelError),
}

pub type Result<T> = std::result::Result<T, AssociationError>;
