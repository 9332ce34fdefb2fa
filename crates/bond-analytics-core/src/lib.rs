pub mod curve;
pub mod error;
pub mod fixed_income;
pub mod math;
pub mod types;

#[cfg(feature = "ladder")]
pub mod ladder;

#[cfg(feature = "portfolio")]
pub mod portfolio;

pub use error::BondAnalyticsError;
pub use types::*;

/// Standard result type for all bond-analytics operations
pub type BondAnalyticsResult<T> = Result<T, BondAnalyticsError>;
