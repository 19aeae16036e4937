//! Error types for rental operations

use sofiya_core::SofiyaError;
use sofiya_store::StoreError;
use thiserror::Error;

/// Errors raised by the rental manager and access controller
#[derive(Error, Debug)]
pub enum RentalError {
    /// Underlying store failure
    #[error("Rental storage error: {0}")]
    Store(#[from] StoreError),

    /// Duration or extension was not positive, or moved the end date out of
    /// the representable range
    #[error("Invalid rental duration: {0} hours")]
    InvalidDuration(i64),

    /// Plan name was empty
    #[error("Rental plan name cannot be empty")]
    InvalidPlan,
}

impl From<RentalError> for SofiyaError {
    fn from(err: RentalError) -> Self {
        match err {
            RentalError::Store(e) => e.into(),
            other => SofiyaError::Validation(other.to_string()),
        }
    }
}

/// Result type for rental operations
pub type RentalResult<T> = Result<T, RentalError>;
