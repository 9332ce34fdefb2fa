use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::yield_curve::{YieldCurve, YieldCurvePoint};
use crate::types::{Percent, Years};

/// Rate differences (percentage points) at or below this count as equal when
/// comparing the two ends. A hump needs no margin over either end.
pub const SHAPE_THRESHOLD_PP: Decimal = dec!(0.1);

/// Tenor treated as the middle of the curve.
const MID_TENOR: Years = dec!(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveShape {
    Normal,
    Inverted,
    Flat,
    Humped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveShapeReport {
    pub shape: CurveShape,
    pub short_end: YieldCurvePoint,
    pub mid: YieldCurvePoint,
    pub long_end: YieldCurvePoint,
    /// long_end.rate - short_end.rate
    pub spread: Percent,
    pub notes: Vec<String>,
}

/// Point closest to 5y. Interior points win over the ends when the curve has
/// any; equal distances go to the shorter tenor.
fn mid_point(points: &[YieldCurvePoint]) -> YieldCurvePoint {
    let candidates = if points.len() > 2 {
        &points[1..points.len() - 1]
    } else {
        points
    };

    let mut best = candidates[0];
    for p in &candidates[1..] {
        if (p.tenor - MID_TENOR).abs() < (best.tenor - MID_TENOR).abs() {
            best = *p;
        }
    }
    best
}

pub(crate) fn classify_shape(curve: &YieldCurve) -> CurveShapeReport {
    let short_end = curve.shortest();
    let long_end = curve.longest();
    let mid = mid_point(curve.points());
    let spread = long_end.rate - short_end.rate;
    let thr = SHAPE_THRESHOLD_PP;

    let mut notes = Vec::new();
    let shape = if mid.rate > short_end.rate && mid.rate > long_end.rate {
        notes.push(format!(
            "{}y rate {}% exceeds both {}y ({}%) and {}y ({}%)",
            mid.tenor, mid.rate, short_end.tenor, short_end.rate, long_end.tenor, long_end.rate
        ));
        CurveShape::Humped
    } else if -spread > thr {
        notes.push(format!(
            "Short rates exceed long rates by {}pp; often read as a recession signal",
            -spread
        ));
        CurveShape::Inverted
    } else if spread.abs() <= thr {
        notes.push(format!(
            "Short and long rates within {thr}pp; little term premium"
        ));
        CurveShape::Flat
    } else {
        notes.push(format!("Long rates exceed short rates by {spread}pp"));
        CurveShape::Normal
    };

    CurveShapeReport {
        shape,
        short_end,
        mid,
        long_end,
        spread,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: &[(Decimal, Decimal)]) -> YieldCurve {
        YieldCurve::new(
            points
                .iter()
                .map(|&(t, r)| YieldCurvePoint::new(t, r))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_humped() {
        let c = curve(&[(dec!(1), dec!(4.0)), (dec!(5), dec!(4.5)), (dec!(10), dec!(4.2))]);
        let report = c.shape();
        assert_eq!(report.shape, CurveShape::Humped);
        assert_eq!(report.mid.tenor, dec!(5));
        assert_eq!(report.spread, dec!(0.2));
        assert_eq!(report.notes.len(), 1);
    }

    #[test]
    fn test_small_hump_ignores_threshold() {
        let c = curve(&[(dec!(1), dec!(4.0)), (dec!(5), dec!(4.05)), (dec!(10), dec!(4.0))]);
        let report = c.shape();
        assert_eq!(report.shape, CurveShape::Humped);
        assert_eq!(report.spread, Decimal::ZERO);
    }

    #[test]
    fn test_mid_equal_to_an_end_is_not_humped() {
        let c = curve(&[(dec!(1), dec!(4.0)), (dec!(5), dec!(4.0)), (dec!(10), dec!(3.95))]);
        assert_eq!(c.shape().shape, CurveShape::Flat);
    }

    #[test]
    fn test_normal() {
        let c = curve(&[(dec!(1), dec!(3.0)), (dec!(5), dec!(3.8)), (dec!(30), dec!(4.5))]);
        assert_eq!(c.shape().shape, CurveShape::Normal);
    }

    #[test]
    fn test_inverted() {
        let c = curve(&[(dec!(0.5), dec!(5.5)), (dec!(5), dec!(4.8)), (dec!(10), dec!(4.4))]);
        assert_eq!(c.shape().shape, CurveShape::Inverted);
    }

    #[test]
    fn test_flat_at_threshold() {
        let c = curve(&[(dec!(1), dec!(4.0)), (dec!(10), dec!(4.1))]);
        assert_eq!(c.shape().shape, CurveShape::Flat);
    }

    #[test]
    fn test_two_point_curve_never_humped() {
        let c = curve(&[(dec!(2), dec!(4.0)), (dec!(5), dec!(6.0))]);
        let report = c.shape();
        assert_eq!(report.mid.tenor, dec!(5));
        assert_eq!(report.shape, CurveShape::Normal);
    }

    #[test]
    fn test_mid_prefers_interior_and_shorter_on_ties() {
        let c = curve(&[
            (dec!(1), dec!(4.0)),
            (dec!(3), dec!(4.2)),
            (dec!(7), dec!(4.4)),
            (dec!(10), dec!(4.6)),
        ]);
        assert_eq!(c.shape().mid.tenor, dec!(3));

        let c = curve(&[(dec!(5), dec!(4.0)), (dec!(6), dec!(4.2)), (dec!(30), dec!(4.6))]);
        assert_eq!(c.shape().mid.tenor, dec!(6));
    }
}
