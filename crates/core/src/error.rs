//! Error types shared by the builder stages.

use crate::duration::DurationError;
use crate::quantity::QuantityError;
use crate::toleration::TolerationError;

/// Failure of a submission build: either a grammar could not be parsed or a
/// validation check rejected the assembled spec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Toleration(#[from] TolerationError),

    #[error(transparent)]
    Quantity(#[from] QuantityError),

    #[error(transparent)]
    Duration(#[from] DurationError),

    #[error("{0}")]
    Validation(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
