use bond_analytics_core::curve::{self, CurveShape, YieldCurve, YieldCurvePoint};
use bond_analytics_core::ladder::{build_ladder, LadderInput, RateScenario};
use bond_analytics_core::BondAnalyticsError;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn humped_curve() -> YieldCurve {
    curve::build_curve(vec![
        YieldCurvePoint::new(dec!(1), dec!(4.0)),
        YieldCurvePoint::new(dec!(5), dec!(4.5)),
        YieldCurvePoint::new(dec!(10), dec!(4.2)),
    ])
    .unwrap()
}

fn ladder_input(total: Decimal, rungs: u32, max: Decimal) -> LadderInput {
    LadderInput {
        total_investment: total,
        rung_count: rungs,
        max_maturity: max,
        maturities: None,
        weights: None,
        payment_frequency: 2,
    }
}

// ---------------------------------------------------------------------------
// Yield curve
// ---------------------------------------------------------------------------

#[test]
fn test_humped_curve_shape() {
    let report = curve::curve_shape(&humped_curve());
    assert_eq!(report.shape, CurveShape::Humped);
    assert_eq!(report.short_end.tenor, dec!(1));
    assert_eq!(report.long_end.tenor, dec!(10));
}

#[test]
fn test_curve_rate_at_between_points() {
    let c = humped_curve();
    let r = curve::curve_rate_at(&c, dec!(2)).unwrap();
    assert_eq!(r, dec!(4.125));
    assert!(r >= dec!(4.0) && r <= dec!(4.5));
}

#[test]
fn test_curve_from_json() {
    let c: YieldCurve = serde_json::from_str(
        r#"[{"tenor":"0.25","rate":"5.3"},{"tenor":"2","rate":"4.6"},{"tenor":"10","rate":"4.1"}]"#,
    )
    .unwrap();
    assert_eq!(c.shape().shape, CurveShape::Inverted);
}

#[test]
fn test_insufficient_curve_data() {
    let err = curve::build_curve(vec![]).unwrap_err();
    assert!(matches!(
        err,
        BondAnalyticsError::InsufficientCurveData { points: 0 }
    ));
}

// ---------------------------------------------------------------------------
// Ladder
// ---------------------------------------------------------------------------

#[test]
fn test_equal_weight_five_rung_ladder() {
    let ladder = build_ladder(&ladder_input(dec!(100000), 5, dec!(10)), &humped_curve())
        .unwrap()
        .result;
    assert_eq!(ladder.rungs.len(), 5);
    let maturities: Vec<Decimal> = ladder.rungs.iter().map(|r| r.maturity).collect();
    assert_eq!(maturities, vec![dec!(2), dec!(4), dec!(6), dec!(8), dec!(10)]);
    for rung in &ladder.rungs {
        assert_eq!(rung.principal, dec!(20000));
    }
}

#[test]
fn test_ladder_rates_sampled_from_curve() {
    let c = humped_curve();
    let ladder = build_ladder(&ladder_input(dec!(100000), 5, dec!(10)), &c)
        .unwrap()
        .result;
    for rung in &ladder.rungs {
        assert_eq!(rung.rate, c.rate_at(rung.maturity).unwrap());
    }
    let wavg = ladder.weighted_average_yield;
    assert!(wavg > dec!(4.0) && wavg < dec!(4.5));
}

#[test]
fn test_reinvestment_scenarios_cover_horizon() {
    let ladder = build_ladder(&ladder_input(dec!(100000), 4, dec!(7.5)), &humped_curve())
        .unwrap()
        .result;
    let scenarios: Vec<RateScenario> = ladder
        .reinvestment_scenarios
        .iter()
        .map(|p| p.scenario)
        .collect();
    assert_eq!(
        scenarios,
        vec![RateScenario::Unchanged, RateScenario::Up100, RateScenario::Down100]
    );
    for projection in &ladder.reinvestment_scenarios {
        assert_eq!(projection.annual_income.len(), 8);
    }
    let up = &ladder.reinvestment_scenarios[1];
    let down = &ladder.reinvestment_scenarios[2];
    assert!(up.total_income > down.total_income);
}

#[test]
fn test_ladder_weight_errors() {
    let mut input = ladder_input(dec!(100000), 3, dec!(6));
    input.weights = Some(vec![dec!(0.2), dec!(0.2), dec!(0.2)]);
    match build_ladder(&input, &humped_curve()).unwrap_err() {
        BondAnalyticsError::Allocation { actual, .. } => assert_eq!(actual, dec!(0.6)),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_ladder_input_from_json_defaults() {
    let input: LadderInput = serde_json::from_str(
        r#"{"total_investment":"50000","rung_count":2,"max_maturity":"4"}"#,
    )
    .unwrap();
    assert_eq!(input.payment_frequency, 2);
    let ladder = build_ladder(&input, &humped_curve()).unwrap().result;
    assert_eq!(ladder.total_principal, dec!(50000));
}
