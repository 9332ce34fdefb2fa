use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::warn;

use crate::error::BondAnalyticsError;
use crate::fixed_income::{duration, yields, Bond};
use crate::ladder::LadderRung;
use crate::math::check_weights;
use crate::types::{with_metadata, ComputationOutput, Percent, RiskLevel};
use crate::BondAnalyticsResult;

/// Tolerance on the sum of position weights.
pub const WEIGHT_TOLERANCE: Decimal = dec!(0.0001);

/// A single sector above this share of the portfolio is a concentration.
pub const SECTOR_LIMIT: Decimal = dec!(0.40);

/// Sub-investment-grade holdings above this share are a concentration.
pub const HIGH_YIELD_LIMIT: Decimal = dec!(0.30);

fn default_max_position_weight() -> Decimal {
    dec!(0.40)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Analytics supplied directly for a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMetrics {
    pub yield_pct: Percent,
    pub modified_duration: Decimal,
    #[serde(default)]
    pub convexity: Decimal,
}

/// What a position holds. Tagged by `"type"` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instrument {
    Bond(Bond),
    Rung(LadderRung),
    Precomputed(PositionMetrics),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub name: String,
    pub instrument: Instrument,
    /// Share of the portfolio, 0..=1
    pub weight: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    /// Agency rating, S&P/Fitch ("BBB+") or Moody's ("Baa1") style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioInput {
    pub positions: Vec<PortfolioPosition>,
    /// Reject portfolios whose weighted modified duration exceeds this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_portfolio_duration: Option<Decimal>,
    /// Cap on any single position's weight (default 40%)
    #[serde(default = "default_max_position_weight")]
    pub max_position_weight: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionAnalysis {
    pub name: String,
    pub weight: Decimal,
    pub yield_pct: Percent,
    pub modified_duration: Decimal,
    pub convexity: Decimal,
    pub interest_rate_risk: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
}

/// Weight held in one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorWeight {
    pub sector: String,
    pub weight: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAnalysis {
    pub positions: Vec<PositionAnalysis>,
    /// Sum of weight x yield (percent)
    pub weighted_yield: Percent,
    /// Sum of weight x modified duration (linear approximation)
    pub portfolio_duration: Decimal,
    pub weighted_convexity: Decimal,
    /// Sum of squared weights
    pub herfindahl_index: Decimal,
    /// (1 - HHI) x 100
    pub diversification_score: Decimal,
    /// Label from portfolio duration alone
    pub duration_risk: RiskLevel,
    /// Duration label raised one notch per concentration breach
    pub risk_level: RiskLevel,
    pub sector_weights: Vec<SectorWeight>,
    /// Combined weight of sub-investment-grade ratings
    pub high_yield_weight: Decimal,
    pub concentration_flags: Vec<String>,
}

/// Portfolio-level aggregates for a set of positions and weights.
#[derive(Debug, Clone)]
pub(crate) struct Aggregates {
    pub weighted_yield: Percent,
    pub portfolio_duration: Decimal,
    pub weighted_convexity: Decimal,
    pub herfindahl_index: Decimal,
    pub diversification_score: Decimal,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Weighted yield, duration and convexity, diversification and a risk label
/// for a set of positions.
///
/// Portfolio duration is the weighted sum of position durations, a linear
/// approximation that ignores how yields co-move across positions.
pub fn analyze_portfolio(
    input: &PortfolioInput,
) -> BondAnalyticsResult<ComputationOutput<PortfolioAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let positions = position_analytics(input, &mut warnings)?;
    let weights: Vec<Decimal> = positions.iter().map(|p| p.weight).collect();
    let agg = aggregate(&positions, &weights);

    if let Some(limit) = input.max_portfolio_duration {
        if agg.portfolio_duration > limit {
            return Err(BondAnalyticsError::ConstraintViolation {
                constraint: "max_portfolio_duration".into(),
                limit,
                actual: agg.portfolio_duration,
            });
        }
    }

    for p in positions.iter().filter(|p| p.weight > input.max_position_weight) {
        warnings.push(format!(
            "Position '{}' weight {} exceeds the {} position cap",
            p.name, p.weight, input.max_position_weight
        ));
    }

    let sector_weights = sector_weights(&positions);
    let high_yield_weight: Decimal = positions
        .iter()
        .filter(|p| p.rating.as_deref().and_then(is_high_yield) == Some(true))
        .map(|p| p.weight)
        .sum();

    let mut concentration_flags = Vec::new();
    if let Some(top) = sector_weights.iter().find(|s| s.weight > SECTOR_LIMIT) {
        concentration_flags.push(format!(
            "Sector '{}' holds {} of the portfolio (limit {SECTOR_LIMIT})",
            top.sector, top.weight
        ));
    }
    if high_yield_weight > HIGH_YIELD_LIMIT {
        concentration_flags.push(format!(
            "Sub-investment-grade ratings hold {high_yield_weight} of the portfolio (limit {HIGH_YIELD_LIMIT})"
        ));
    }

    let duration_risk = RiskLevel::from_modified_duration(agg.portfolio_duration);
    let risk_level = concentration_flags
        .iter()
        .fold(duration_risk, |level, _| level.elevate());

    let output = PortfolioAnalysis {
        positions,
        weighted_yield: agg.weighted_yield,
        portfolio_duration: agg.portfolio_duration,
        weighted_convexity: agg.weighted_convexity,
        herfindahl_index: agg.herfindahl_index,
        diversification_score: agg.diversification_score,
        duration_risk,
        risk_level,
        sector_weights,
        high_yield_weight,
        concentration_flags,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "portfolio_duration": "weighted sum of modified durations",
        "weight_tolerance": WEIGHT_TOLERANCE.to_string(),
        "sector_limit": SECTOR_LIMIT.to_string(),
        "high_yield_limit": HIGH_YIELD_LIMIT.to_string(),
    });

    Ok(with_metadata(
        "Fixed-income portfolio aggregation: weighted yield/duration/convexity, HHI diversification, concentration-adjusted risk",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// `Some(true)` for sub-investment-grade, `Some(false)` for investment
/// grade, `None` for unrated or unrecognised ratings.
pub fn is_high_yield(rating: &str) -> Option<bool> {
    let grade: String = rating
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    match grade.as_str() {
        "AAA" | "AA" | "A" | "BBB" | "BAA" => Some(false),
        "BB" | "B" | "CCC" | "CC" | "C" | "D" | "BA" | "CAA" | "CA" => Some(true),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

pub(crate) fn validate_input(input: &PortfolioInput) -> BondAnalyticsResult<()> {
    if input.positions.is_empty() {
        return Err(BondAnalyticsError::invalid_input(
            "positions",
            "at least one position",
            0,
        ));
    }
    if input.max_position_weight <= Decimal::ZERO || input.max_position_weight > Decimal::ONE {
        return Err(BondAnalyticsError::invalid_input(
            "max_position_weight",
            "a weight in (0, 1]",
            input.max_position_weight,
        ));
    }
    let weights: Vec<Decimal> = input.positions.iter().map(|p| p.weight).collect();
    check_weights("weights", &weights, WEIGHT_TOLERANCE)
}

/// Yield, duration and convexity for every position.
pub(crate) fn position_analytics(
    input: &PortfolioInput,
    warnings: &mut Vec<String>,
) -> BondAnalyticsResult<Vec<PositionAnalysis>> {
    input
        .positions
        .iter()
        .map(|position| {
            let metrics = instrument_metrics(position, warnings)?;
            Ok(PositionAnalysis {
                name: position.name.clone(),
                weight: position.weight,
                yield_pct: metrics.yield_pct,
                modified_duration: metrics.modified_duration,
                convexity: metrics.convexity,
                interest_rate_risk: RiskLevel::from_modified_duration(metrics.modified_duration),
                sector: position.sector.clone(),
                rating: position.rating.clone(),
            })
        })
        .collect()
}

fn instrument_metrics(
    position: &PortfolioPosition,
    warnings: &mut Vec<String>,
) -> BondAnalyticsResult<PositionMetrics> {
    match &position.instrument {
        Instrument::Precomputed(m) => {
            if m.modified_duration < Decimal::ZERO {
                return Err(BondAnalyticsError::invalid_input(
                    format!("{}.modified_duration", position.name),
                    "a non-negative duration",
                    m.modified_duration,
                ));
            }
            Ok(m.clone())
        }
        Instrument::Rung(rung) => bond_metrics(&rung.bond(), Some(rung.rate), &position.name, warnings),
        Instrument::Bond(bond) => bond_metrics(bond, None, &position.name, warnings),
    }
}

fn bond_metrics(
    bond: &Bond,
    known_yield: Option<Percent>,
    name: &str,
    warnings: &mut Vec<String>,
) -> BondAnalyticsResult<PositionMetrics> {
    bond.validate()?;
    let yield_pct = match (known_yield, bond.market_price, bond.current_yield) {
        (Some(y), _, _) => y,
        (None, Some(_), _) => {
            let solution = yields::yield_from_price(bond)?;
            if solution.converged {
                solution.yield_pct
            } else {
                let approx = yields::approximate_ytm(bond)?;
                warn!(position = name, "yield solver did not converge; using approximate YTM");
                warnings.push(format!(
                    "'{name}': yield solver did not converge, approximate YTM {} used",
                    approx.round_dp(4)
                ));
                approx
            }
        }
        (None, None, Some(cy)) => cy,
        (None, None, None) => {
            return Err(BondAnalyticsError::invalid_input(
                format!("{name}.market_price"),
                "a market price or current yield",
                "none",
            ))
        }
    };

    let risk = duration::risk_metrics(bond, yield_pct)?;
    Ok(PositionMetrics {
        yield_pct,
        modified_duration: risk.modified_duration,
        convexity: risk.convexity,
    })
}

pub(crate) fn aggregate(positions: &[PositionAnalysis], weights: &[Decimal]) -> Aggregates {
    let mut agg = Aggregates {
        weighted_yield: Decimal::ZERO,
        portfolio_duration: Decimal::ZERO,
        weighted_convexity: Decimal::ZERO,
        herfindahl_index: Decimal::ZERO,
        diversification_score: Decimal::ZERO,
    };
    for (p, &w) in positions.iter().zip(weights) {
        agg.weighted_yield += w * p.yield_pct;
        agg.portfolio_duration += w * p.modified_duration;
        agg.weighted_convexity += w * p.convexity;
        agg.herfindahl_index += w * w;
    }
    agg.diversification_score = (Decimal::ONE - agg.herfindahl_index) * Decimal::ONE_HUNDRED;
    agg
}

fn sector_weights(positions: &[PositionAnalysis]) -> Vec<SectorWeight> {
    let mut by_sector: BTreeMap<&str, Decimal> = BTreeMap::new();
    for p in positions {
        if let Some(sector) = p.sector.as_deref() {
            *by_sector.entry(sector).or_insert(Decimal::ZERO) += p.weight;
        }
    }
    let mut weights: Vec<SectorWeight> = by_sector
        .into_iter()
        .map(|(sector, weight)| SectorWeight {
            sector: sector.to_string(),
            weight,
        })
        .collect();
    weights.sort_by(|a, b| b.weight.cmp(&a.weight));
    weights
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
