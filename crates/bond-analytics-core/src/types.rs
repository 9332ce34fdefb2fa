use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Used for periodic rates internally.
pub type Rate = Decimal;

/// Annualised rates expressed as percentages (5 = 5%). Every rate that crosses
/// the public API is a `Percent` unless its name says otherwise.
pub type Percent = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// Qualitative risk bucket shared by bond and portfolio analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Interest-rate risk bucket for a modified duration:
    /// above 7 is high, 3 to 7 inclusive is moderate, below 3 is low.
    pub fn from_modified_duration(modified_duration: Decimal) -> Self {
        if modified_duration > Decimal::from(7) {
            RiskLevel::High
        } else if modified_duration >= Decimal::from(3) {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    /// One notch riskier, saturating at `High`.
    pub fn elevate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Moderate,
            RiskLevel::Moderate | RiskLevel::High => RiskLevel::High,
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

/// Convert an annual percentage (5 = 5%) into a decimal rate (0.05).
pub fn percent_to_rate(pct: Percent) -> Rate {
    pct / Decimal::ONE_HUNDRED
}

/// Convert a decimal rate (0.05) into an annual percentage (5).
pub fn rate_to_percent(rate: Rate) -> Percent {
    rate * Decimal::ONE_HUNDRED
}
