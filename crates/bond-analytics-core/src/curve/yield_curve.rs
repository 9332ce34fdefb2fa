use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::shape::{classify_shape, CurveShapeReport};
use crate::error::BondAnalyticsError;
use crate::types::{Percent, Years};
use crate::BondAnalyticsResult;

/// One tenor/rate observation. Rate is an annual percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldCurvePoint {
    pub tenor: Years,
    pub rate: Percent,
}

impl YieldCurvePoint {
    pub fn new(tenor: Years, rate: Percent) -> Self {
        YieldCurvePoint { tenor, rate }
    }
}

/// Piecewise-linear yield curve over at least two strictly increasing tenors.
///
/// Points are kept exactly as supplied: the constructor rejects unordered or
/// duplicate tenors rather than sorting them. Serializes as a plain array of
/// points and is validated again on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<YieldCurvePoint>", into = "Vec<YieldCurvePoint>")]
pub struct YieldCurve {
    points: Vec<YieldCurvePoint>,
}

impl YieldCurve {
    pub fn new(points: Vec<YieldCurvePoint>) -> BondAnalyticsResult<Self> {
        if points.len() < 2 {
            return Err(BondAnalyticsError::InsufficientCurveData {
                points: points.len(),
            });
        }

        for (i, point) in points.iter().enumerate() {
            if point.tenor <= Decimal::ZERO {
                return Err(BondAnalyticsError::invalid_input(
                    format!("points[{i}].tenor"),
                    "a positive tenor in years",
                    point.tenor,
                ));
            }
            if i > 0 && point.tenor <= points[i - 1].tenor {
                return Err(BondAnalyticsError::invalid_input(
                    format!("points[{i}].tenor"),
                    format!("a tenor greater than {}", points[i - 1].tenor),
                    point.tenor,
                ));
            }
        }

        Ok(YieldCurve { points })
    }

    pub fn points(&self) -> &[YieldCurvePoint] {
        &self.points
    }

    pub fn shortest(&self) -> YieldCurvePoint {
        self.points[0]
    }

    pub fn longest(&self) -> YieldCurvePoint {
        self.points[self.points.len() - 1]
    }

    /// Rate at `tenor`, interpolated linearly between the bracketing points.
    /// Tenors outside the curve take the nearest end rate.
    pub fn rate_at(&self, tenor: Years) -> BondAnalyticsResult<Percent> {
        if tenor < Decimal::ZERO {
            return Err(BondAnalyticsError::invalid_input(
                "tenor",
                "a non-negative tenor in years",
                tenor,
            ));
        }

        let first = self.shortest();
        let last = self.longest();
        if tenor <= first.tenor {
            return Ok(first.rate);
        }
        if tenor >= last.tenor {
            return Ok(last.rate);
        }

        for pair in self.points.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if tenor <= hi.tenor {
                let weight = (tenor - lo.tenor) / (hi.tenor - lo.tenor);
                return Ok(lo.rate + (hi.rate - lo.rate) * weight);
            }
        }

        Ok(last.rate)
    }

    /// Forward rate between two tenors under continuous compounding:
    /// (r2 t2 - r1 t1) / (t2 - t1), in percent.
    pub fn forward_rate(&self, start: Years, end: Years) -> BondAnalyticsResult<Percent> {
        if start < Decimal::ZERO || end <= start {
            return Err(BondAnalyticsError::invalid_input(
                "end",
                format!("a tenor greater than start {start}"),
                end,
            ));
        }
        let r1 = self.rate_at(start)?;
        let r2 = self.rate_at(end)?;
        Ok((r2 * end - r1 * start) / (end - start))
    }

    /// The same curve with every rate moved by `shift_bps` basis points.
    pub fn shifted(&self, shift_bps: Decimal) -> YieldCurve {
        let shift = shift_bps / Decimal::ONE_HUNDRED;
        YieldCurve {
            points: self
                .points
                .iter()
                .map(|p| YieldCurvePoint::new(p.tenor, p.rate + shift))
                .collect(),
        }
    }

    pub fn shape(&self) -> CurveShapeReport {
        classify_shape(self)
    }
}

impl TryFrom<Vec<YieldCurvePoint>> for YieldCurve {
    type Error = BondAnalyticsError;

    fn try_from(points: Vec<YieldCurvePoint>) -> Result<Self, Self::Error> {
        YieldCurve::new(points)
    }
}

impl From<YieldCurve> for Vec<YieldCurvePoint> {
    fn from(curve: YieldCurve) -> Self {
        curve.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn curve() -> YieldCurve {
        YieldCurve::new(vec![
            YieldCurvePoint::new(dec!(1), dec!(4.0)),
            YieldCurvePoint::new(dec!(5), dec!(4.5)),
            YieldCurvePoint::new(dec!(10), dec!(4.2)),
        ])
        .unwrap()
    }

    #[test]
    fn test_single_point_rejected() {
        let err = YieldCurve::new(vec![YieldCurvePoint::new(dec!(1), dec!(4))]).unwrap_err();
        match err {
            BondAnalyticsError::InsufficientCurveData { points } => assert_eq!(points, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unordered_tenors_rejected() {
        let err = YieldCurve::new(vec![
            YieldCurvePoint::new(dec!(5), dec!(4.5)),
            YieldCurvePoint::new(dec!(1), dec!(4.0)),
        ])
        .unwrap_err();
        match err {
            BondAnalyticsError::InvalidInput { field, .. } => assert_eq!(field, "points[1].tenor"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_and_non_positive_tenors_rejected() {
        assert!(YieldCurve::new(vec![
            YieldCurvePoint::new(dec!(2), dec!(4)),
            YieldCurvePoint::new(dec!(2), dec!(5)),
        ])
        .is_err());
        assert!(YieldCurve::new(vec![
            YieldCurvePoint::new(dec!(0), dec!(4)),
            YieldCurvePoint::new(dec!(2), dec!(5)),
        ])
        .is_err());
    }

    #[test]
    fn test_rate_at_knots_and_between() {
        let c = curve();
        assert_eq!(c.rate_at(dec!(5)).unwrap(), dec!(4.5));
        assert_eq!(c.rate_at(dec!(3)).unwrap(), dec!(4.25));
        assert_eq!(c.rate_at(dec!(7.5)).unwrap(), dec!(4.35));
    }

    #[test]
    fn test_rate_at_clamps_outside_range() {
        let c = curve();
        assert_eq!(c.rate_at(dec!(0.25)).unwrap(), dec!(4.0));
        assert_eq!(c.rate_at(dec!(30)).unwrap(), dec!(4.2));
        assert!(c.rate_at(dec!(-1)).is_err());
    }

    #[test]
    fn test_forward_rate() {
        // (4.5 * 5 - 4.0 * 1) / 4 = 4.625
        assert_eq!(curve().forward_rate(dec!(1), dec!(5)).unwrap(), dec!(4.625));
        assert!(curve().forward_rate(dec!(5), dec!(5)).is_err());
    }

    #[test]
    fn test_shifted_moves_every_rate() {
        let up = curve().shifted(dec!(100));
        assert_eq!(up.rate_at(dec!(1)).unwrap(), dec!(5.0));
        assert_eq!(up.rate_at(dec!(10)).unwrap(), dec!(5.2));
    }

    #[test]
    fn test_serde_validates_points() {
        let c: YieldCurve =
            serde_json::from_str(r#"[{"tenor":"1","rate":"4"},{"tenor":"2","rate":"4.5"}]"#).unwrap();
        assert_eq!(c.points().len(), 2);
        let bad: Result<YieldCurve, _> = serde_json::from_str(r#"[{"tenor":"1","rate":"4"}]"#);
        assert!(bad.is_err());
    }
}
