use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BondAnalyticsError {
    #[error("Invalid input: {field}: expected {expected}, got {actual}")]
    InvalidInput {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid bond terms: {field}: {reason}")]
    InvalidBondTerms { field: String, reason: String },

    #[error("Invalid rate: periodic rate {rate} must be greater than -100%")]
    InvalidRate { rate: Decimal },

    #[error("Yield not found: no convergence after {iterations} iterations (best estimate {best_estimate}%, relative price error {relative_error})")]
    YieldNotFound {
        iterations: u32,
        best_estimate: Decimal,
        relative_error: Decimal,
    },

    #[error("Insufficient curve data: {points} point(s) supplied, at least 2 required")]
    InsufficientCurveData { points: usize },

    #[error("Allocation error: {constraint}: expected {expected}, got {actual} (off by {deviation})")]
    Allocation {
        constraint: String,
        expected: Decimal,
        actual: Decimal,
        deviation: Decimal,
    },

    #[error("Constraint violated: {constraint}: limit {limit}, actual {actual}")]
    ConstraintViolation {
        constraint: String,
        limit: Decimal,
        actual: Decimal,
    },

    #[error("Invalid rung count: {requested} requested, between 1 and {max} allowed")]
    RungCount { requested: u32, max: u32 },

    #[error("Numerical overflow in {context}")]
    NumericalOverflow { context: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl BondAnalyticsError {
    /// Shorthand for a validation failure on a single field.
    pub fn invalid_input(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl ToString,
    ) -> Self {
        BondAnalyticsError::InvalidInput {
            field: field.into(),
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    /// Weight-sum violation against a target of 1.
    pub fn weights_sum(constraint: impl Into<String>, actual: Decimal) -> Self {
        BondAnalyticsError::Allocation {
            constraint: constraint.into(),
            expected: Decimal::ONE,
            actual,
            deviation: (actual - Decimal::ONE).abs(),
        }
    }
}

impl From<serde_json::Error> for BondAnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        BondAnalyticsError::SerializationError(e.to_string())
    }
}
