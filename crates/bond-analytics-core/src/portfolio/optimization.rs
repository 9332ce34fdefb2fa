//! Greedy reallocation toward yield per unit of duration.
//!
//! Positions are ranked by yield / modified duration and filled in that order
//! up to the single-position cap until the whole portfolio is allocated. This
//! is a ranking heuristic, not a mean-variance optimizer: it ignores
//! correlations and never trades off risk against return.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::time::Instant;

use super::analysis::{aggregate, position_analytics, validate_input, PortfolioInput, PositionAnalysis};
use crate::error::BondAnalyticsError;
use crate::types::{with_metadata, ComputationOutput, Percent, RiskLevel};
use crate::BondAnalyticsResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetWeight {
    pub name: String,
    pub current_weight: Decimal,
    pub target_weight: Decimal,
    pub change: Decimal,
    /// yield / modified duration; absent for zero-duration positions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yield_per_duration: Option<Decimal>,
}

/// Headline numbers for one set of weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub weighted_yield: Percent,
    pub portfolio_duration: Decimal,
    pub diversification_score: Decimal,
    pub duration_risk: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// In input order
    pub allocations: Vec<TargetWeight>,
    pub current: AllocationSummary,
    pub optimized: AllocationSummary,
}

/// Rebalance toward the best yield per unit of duration, capping every
/// position at `max_position_weight`.
pub fn optimize_allocation(
    input: &PortfolioInput,
) -> BondAnalyticsResult<ComputationOutput<OptimizationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let cap = input.max_position_weight;
    let capacity = cap * Decimal::from(input.positions.len() as u64);
    if capacity < Decimal::ONE {
        return Err(BondAnalyticsError::ConstraintViolation {
            constraint: format!(
                "{} positions capped at {cap} cannot hold the whole portfolio",
                input.positions.len()
            ),
            limit: Decimal::ONE,
            actual: capacity,
        });
    }

    let positions = position_analytics(input, &mut warnings)?;

    let mut order: Vec<usize> = (0..positions.len()).collect();
    order.sort_by_key(|&i| Reverse(rank_key(&positions[i])));

    let mut targets = vec![Decimal::ZERO; positions.len()];
    let mut remaining = Decimal::ONE;
    for i in order {
        if remaining <= Decimal::ZERO {
            break;
        }
        let w = cap.min(remaining);
        targets[i] = w;
        remaining -= w;
    }

    let current_weights: Vec<Decimal> = positions.iter().map(|p| p.weight).collect();
    let current = summary(&positions, &current_weights);
    let optimized = summary(&positions, &targets);

    if let Some(limit) = input.max_portfolio_duration {
        if optimized.portfolio_duration > limit {
            warnings.push(format!(
                "Optimized duration {} exceeds the {limit} limit",
                optimized.portfolio_duration.round_dp(4)
            ));
        }
    }

    let allocations = positions
        .iter()
        .zip(&targets)
        .map(|(p, &target)| TargetWeight {
            name: p.name.clone(),
            current_weight: p.weight,
            target_weight: target,
            change: target - p.weight,
            yield_per_duration: p.yield_pct.checked_div(p.modified_duration),
        })
        .collect();

    let output = OptimizationResult {
        allocations,
        current,
        optimized,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "method": "greedy fill by yield per unit of modified duration",
        "max_position_weight": cap.to_string(),
        "mean_variance": false,
    });

    Ok(with_metadata(
        "Greedy yield-per-duration allocation with a single-position cap (not mean-variance)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Sort key for yield per unit of duration. Durations are non-negative, so a
/// zero duration (or a ratio past `Decimal::MAX`) is an unbounded ratio: it
/// ranks above every finite key for a positive yield and below for a negative
/// one.
fn rank_key(p: &PositionAnalysis) -> (i8, Decimal) {
    if p.yield_pct.is_zero() {
        return (0, Decimal::ZERO);
    }
    match p.yield_pct.checked_div(p.modified_duration) {
        Some(ratio) => (0, ratio),
        None if p.yield_pct > Decimal::ZERO => (1, Decimal::ZERO),
        None => (-1, Decimal::ZERO),
    }
}

fn summary(positions: &[PositionAnalysis], weights: &[Decimal]) -> AllocationSummary {
    let agg = aggregate(positions, weights);
    AllocationSummary {
        weighted_yield: agg.weighted_yield,
        portfolio_duration: agg.portfolio_duration,
        diversification_score: agg.diversification_score,
        duration_risk: RiskLevel::from_modified_duration(agg.portfolio_duration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{Instrument, PortfolioPosition, PositionMetrics};
    use rust_decimal_macros::dec;

    fn position(name: &str, weight: Decimal, yield_pct: Decimal, duration: Decimal) -> PortfolioPosition {
        PortfolioPosition {
            name: name.into(),
            instrument: Instrument::Precomputed(PositionMetrics {
                yield_pct,
                modified_duration: duration,
                convexity: Decimal::ZERO,
            }),
            weight,
            sector: None,
            rating: None,
        }
    }

    fn three_positions(cap: Decimal) -> PortfolioInput {
        PortfolioInput {
            positions: vec![
                position("long", dec!(0.4), dec!(5), dec!(10)),   // 0.5 per year
                position("mid", dec!(0.3), dec!(4.5), dec!(5)),   // 0.9
                position("short", dec!(0.3), dec!(4), dec!(2)),   // 2.0
            ],
            max_portfolio_duration: None,
            max_position_weight: cap,
        }
    }

    #[test]
    fn test_greedy_fill_by_yield_per_duration() {
        let out = optimize_allocation(&three_positions(dec!(0.4))).unwrap();
        let targets: Vec<Decimal> = out.result.allocations.iter().map(|a| a.target_weight).collect();
        assert_eq!(targets, vec![dec!(0.2), dec!(0.4), dec!(0.4)]);
        let total: Decimal = targets.iter().sum();
        assert_eq!(total, Decimal::ONE);
        assert!(out.result.optimized.portfolio_duration < out.result.current.portfolio_duration);
    }

    #[test]
    fn test_cap_respected() {
        let out = optimize_allocation(&three_positions(dec!(0.5))).unwrap();
        assert!(out
            .result
            .allocations
            .iter()
            .all(|a| a.target_weight <= dec!(0.5)));
        assert_eq!(out.result.allocations[0].target_weight, Decimal::ZERO);
    }

    #[test]
    fn test_infeasible_cap_rejected() {
        let err = optimize_allocation(&three_positions(dec!(0.3))).unwrap_err();
        match err {
            BondAnalyticsError::ConstraintViolation { actual, .. } => assert_eq!(actual, dec!(0.9)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_duration_with_mixed_sign_yields() {
        let input = PortfolioInput {
            positions: vec![
                position("cash_short", dec!(0.2), dec!(-1), Decimal::ZERO),
                position("bond", dec!(0.2), dec!(4), dec!(5)),
                position("cash", dec!(0.2), dec!(3), Decimal::ZERO),
                position("flat", dec!(0.2), Decimal::ZERO, Decimal::ZERO),
                position("bill", dec!(0.2), dec!(2), Decimal::ZERO),
            ],
            max_portfolio_duration: None,
            max_position_weight: dec!(0.3),
        };
        let out = optimize_allocation(&input).unwrap();
        let targets: Vec<Decimal> = out.result.allocations.iter().map(|a| a.target_weight).collect();
        // cash and bill tie above any finite ratio and keep input order
        assert_eq!(
            targets,
            vec![Decimal::ZERO, dec!(0.3), dec!(0.3), dec!(0.1), dec!(0.3)]
        );
        assert_eq!(targets.iter().sum::<Decimal>(), Decimal::ONE);
        assert_eq!(out.result.allocations[0].yield_per_duration, None);
        assert_eq!(out.result.allocations[1].yield_per_duration, Some(dec!(0.8)));
    }

    #[test]
    fn test_rank_key_is_total_over_zero_durations() {
        let analyses = [
            (dec!(-2), Decimal::ZERO),
            (dec!(3), Decimal::ZERO),
            (Decimal::ZERO, Decimal::ZERO),
            (dec!(-1), dec!(4)),
            (dec!(10), dec!(0.0000000000000000000000000001)),
        ];
        let keys: Vec<(i8, Decimal)> = analyses
            .iter()
            .map(|&(y, d)| {
                let input = PortfolioInput {
                    positions: vec![position("p", Decimal::ONE, y, d)],
                    max_portfolio_duration: None,
                    max_position_weight: Decimal::ONE,
                };
                let mut warnings = Vec::new();
                rank_key(&position_analytics(&input, &mut warnings).unwrap()[0])
            })
            .collect();
        assert_eq!(keys[0], (-1, Decimal::ZERO));
        assert_eq!(keys[1], (1, Decimal::ZERO));
        assert_eq!(keys[2], (0, Decimal::ZERO));
        assert_eq!(keys[3], (0, dec!(-0.25)));
        assert_eq!(keys[4], (1, Decimal::ZERO));
    }

    #[test]
    fn test_invalid_current_weights_rejected() {
        let mut input = three_positions(dec!(0.4));
        input.positions[0].weight = dec!(0.9);
        let err = optimize_allocation(&input).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::Allocation { .. }));
    }
}
