//! Yield curve: tenor/rate points with linear interpolation, shape
//! classification, forward rates and parallel shifts.

pub mod shape;
pub mod yield_curve;

pub use shape::{CurveShape, CurveShapeReport, SHAPE_THRESHOLD_PP};
pub use yield_curve::{YieldCurve, YieldCurvePoint};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput, Percent, Years};
use crate::BondAnalyticsResult;

pub fn build_curve(points: Vec<YieldCurvePoint>) -> BondAnalyticsResult<YieldCurve> {
    YieldCurve::new(points)
}

pub fn curve_rate_at(curve: &YieldCurve, tenor: Years) -> BondAnalyticsResult<Percent> {
    curve.rate_at(tenor)
}

pub fn curve_shape(curve: &YieldCurve) -> CurveShapeReport {
    curve.shape()
}

/// Input for a curve analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveInput {
    pub points: Vec<YieldCurvePoint>,
    /// Tenors to interpolate (default: none)
    #[serde(default)]
    pub tenors: Vec<Years>,
}

/// Forward rate between two consecutive curve points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardRate {
    pub start: Years,
    pub end: Years,
    pub rate: Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveAnalysisOutput {
    pub shape: CurveShape,
    pub spread: Percent,
    pub shape_report: CurveShapeReport,
    pub interpolated: Vec<YieldCurvePoint>,
    pub forward_rates: Vec<ForwardRate>,
}

/// Shape, requested interpolations and knot-to-knot forward rates.
pub fn analyze_curve(
    input: &CurveInput,
) -> BondAnalyticsResult<ComputationOutput<CurveAnalysisOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let curve = build_curve(input.points.clone())?;
    let report = curve.shape();

    let mut interpolated = Vec::with_capacity(input.tenors.len());
    for &tenor in &input.tenors {
        if tenor < curve.shortest().tenor || tenor > curve.longest().tenor {
            warnings.push(format!(
                "Tenor {tenor}y is outside the curve; end rate used"
            ));
        }
        interpolated.push(YieldCurvePoint::new(tenor, curve.rate_at(tenor)?));
    }

    let mut forward_rates = Vec::with_capacity(curve.points().len() - 1);
    let mut prev = Decimal::ZERO;
    for point in curve.points() {
        forward_rates.push(ForwardRate {
            start: prev,
            end: point.tenor,
            rate: curve.forward_rate(prev, point.tenor)?,
        });
        prev = point.tenor;
    }

    let output = CurveAnalysisOutput {
        shape: report.shape,
        spread: report.spread,
        shape_report: report,
        interpolated,
        forward_rates,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "interpolation": "linear, clamped to end rates",
        "shape_threshold_pp": SHAPE_THRESHOLD_PP.to_string(),
        "forward_compounding": "continuous",
    });

    Ok(with_metadata(
        "Yield curve interpolation and shape classification",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_analyze_curve() {
        let out = analyze_curve(&CurveInput {
            points: vec![
                YieldCurvePoint::new(dec!(1), dec!(4.0)),
                YieldCurvePoint::new(dec!(5), dec!(4.5)),
                YieldCurvePoint::new(dec!(10), dec!(4.2)),
            ],
            tenors: vec![dec!(3), dec!(20)],
        })
        .unwrap();
        let r = &out.result;
        assert_eq!(r.shape, CurveShape::Humped);
        assert_eq!(r.interpolated[0].rate, dec!(4.25));
        assert_eq!(r.interpolated[1].rate, dec!(4.2));
        assert_eq!(out.warnings.len(), 1);
        // First forward runs from 0 to the first knot at the flat short rate
        assert_eq!(r.forward_rates.len(), 3);
        assert_eq!(r.forward_rates[0].rate, dec!(4.0));
    }

    #[test]
    fn test_curve_rate_at_free_function() {
        let curve = build_curve(vec![
            YieldCurvePoint::new(dec!(2), dec!(3)),
            YieldCurvePoint::new(dec!(4), dec!(5)),
        ])
        .unwrap();
        assert_eq!(curve_rate_at(&curve, dec!(3)).unwrap(), dec!(4));
        assert_eq!(curve_shape(&curve).shape, CurveShape::Normal);
    }
}
