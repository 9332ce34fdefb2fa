//! Coupon and principal schedule generation.
//!
//! Period count policy: `years_to_maturity * payment_frequency` periods. A
//! count within [`STUB_TOLERANCE`] of a whole number is rounded to it;
//! otherwise the schedule carries `floor(count)` full periods followed by a
//! short final stub at the fractional period index, paying a pro-rated
//! coupon together with the face value.

use chrono::{Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::bonds::Bond;
use crate::error::BondAnalyticsError;
use crate::math::decimal_to_u32;
use crate::types::{Money, Years};
use crate::BondAnalyticsResult;

/// Period counts closer than this to a whole number are rounded to it.
pub const STUB_TOLERANCE: Decimal = dec!(0.01);

/// A single scheduled payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowEvent {
    /// Period index from valuation (1, 2, ...; fractional for a final stub)
    pub period: Decimal,
    /// Time of payment in years
    pub time_years: Years,
    /// Human-readable label, e.g. "P3 (1.5y)"
    pub label: String,
    /// Calendar payment date, when the bond carries a settlement date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    /// Coupon portion of the payment
    pub coupon: Money,
    /// Principal portion of the payment (face value on the final period)
    pub principal: Money,
    /// Gross payment = coupon + principal
    pub amount: Money,
    /// Present value of `amount`; set only on discounted schedules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present_value: Option<Money>,
}

/// Resolved number of coupon periods for a maturity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCount {
    /// Whole coupon periods
    pub full_periods: u32,
    /// Fraction of a period paid as a final stub (zero when none)
    pub stub_fraction: Decimal,
}

impl PeriodCount {
    pub fn has_stub(&self) -> bool {
        !self.stub_fraction.is_zero()
    }

    /// Total number of payments in the schedule.
    pub fn payments(&self) -> u32 {
        self.full_periods + u32::from(self.has_stub())
    }
}

/// Resolve `years * frequency` into whole periods plus an optional stub.
pub fn period_count(years_to_maturity: Years, payment_frequency: u8) -> BondAnalyticsResult<PeriodCount> {
    let raw = years_to_maturity * Decimal::from(payment_frequency);
    let nearest = raw.round();

    let count = if (raw - nearest).abs() <= STUB_TOLERANCE {
        PeriodCount {
            full_periods: decimal_to_u32(nearest),
            stub_fraction: Decimal::ZERO,
        }
    } else {
        let whole = raw.floor();
        PeriodCount {
            full_periods: decimal_to_u32(whole),
            stub_fraction: raw - whole,
        }
    };

    if count.payments() == 0 {
        return Err(BondAnalyticsError::InvalidBondTerms {
            field: "years_to_maturity".into(),
            reason: format!(
                "{years_to_maturity} years at frequency {payment_frequency} resolves to no coupon periods"
            ),
        });
    }

    Ok(count)
}

/// Build the undiscounted payment schedule for a bond.
pub fn cash_flows(bond: &Bond) -> BondAnalyticsResult<Vec<CashFlowEvent>> {
    bond.validate()?;

    let freq = bond.frequency();
    let count = period_count(bond.years_to_maturity, bond.payment_frequency)?;
    let coupon = bond.periodic_coupon();

    let mut periods: Vec<(Decimal, Money)> = (1..=count.full_periods)
        .map(|k| (Decimal::from(k), coupon))
        .collect();
    if count.has_stub() {
        periods.push((
            Decimal::from(count.full_periods) + count.stub_fraction,
            coupon * count.stub_fraction,
        ));
    }

    let last = periods.len() - 1;
    let events = periods
        .into_iter()
        .enumerate()
        .map(|(i, (period, coupon))| {
            let principal = if i == last {
                bond.face_value
            } else {
                Decimal::ZERO
            };
            let time_years = period / freq;
            CashFlowEvent {
                period,
                time_years,
                label: format!(
                    "P{} ({}y)",
                    period.round_dp(4).normalize(),
                    time_years.round_dp(4).normalize()
                ),
                payment_date: bond
                    .settlement_date
                    .and_then(|d| payment_date(d, period, bond.payment_frequency)),
                coupon,
                principal,
                amount: coupon + principal,
                present_value: None,
            }
        })
        .collect();

    Ok(events)
}

/// Calendar date of a (possibly fractional) period after settlement.
///
/// Whole months are added with end-of-month clamping; a fractional month is
/// converted to days against a 30-day month.
fn payment_date(settlement: NaiveDate, period: Decimal, payment_frequency: u8) -> Option<NaiveDate> {
    let months = period * Decimal::from(12 / u32::from(payment_frequency));
    let whole = months.trunc();
    let extra_days = decimal_to_u32((months - whole) * dec!(30));

    settlement
        .checked_add_months(Months::new(decimal_to_u32(whole)))?
        .checked_add_signed(Duration::days(i64::from(extra_days)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn ten_year_semiannual() -> Bond {
        Bond::new(dec!(1000), dec!(5), dec!(10), 2)
    }

    #[test]
    fn test_semiannual_schedule_shape() {
        let flows = cash_flows(&ten_year_semiannual()).unwrap();
        assert_eq!(flows.len(), 20);
        assert!(flows[..19].iter().all(|cf| cf.amount == dec!(25)));
        assert_eq!(flows[19].amount, dec!(1025));
        assert_eq!(flows[19].principal, dec!(1000));
        assert_eq!(flows[19].time_years, dec!(10));
    }

    #[test]
    fn test_periods_strictly_increasing() {
        let flows = cash_flows(&ten_year_semiannual()).unwrap();
        assert!(flows.windows(2).all(|w| w[0].period < w[1].period));
    }

    #[test]
    fn test_zero_coupon_single_payment() {
        let bond = Bond::new(dec!(1000), Decimal::ZERO, dec!(10), 1);
        let flows = cash_flows(&bond).unwrap();
        assert_eq!(flows.len(), 10);
        assert!(flows[..9].iter().all(|cf| cf.amount.is_zero()));
        assert_eq!(flows[9].amount, dec!(1000));
    }

    #[test]
    fn test_near_integer_period_count_rounds() {
        // 10.004 years * 2 = 20.008 periods, within tolerance of 20
        let count = period_count(dec!(10.004), 2).unwrap();
        assert_eq!(count.full_periods, 20);
        assert!(!count.has_stub());
    }

    #[test]
    fn test_stub_period_pro_rated() {
        // 2.25 years semi-annual = 4.5 periods: four full coupons and a half stub
        let bond = Bond::new(dec!(1000), dec!(6), dec!(2.25), 2);
        let flows = cash_flows(&bond).unwrap();
        assert_eq!(flows.len(), 5);
        let stub = &flows[4];
        assert_eq!(stub.period, dec!(4.5));
        assert_eq!(stub.time_years, dec!(2.25));
        assert_eq!(stub.coupon, dec!(15));
        assert_eq!(stub.amount, dec!(1015));
    }

    #[test]
    fn test_short_bond_single_stub() {
        // A quarter year at annual frequency is a single stub payment.
        let bond = Bond::new(dec!(1000), dec!(4), dec!(0.25), 1);
        let flows = cash_flows(&bond).unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].coupon, dec!(10));
        assert_eq!(flows[0].amount, dec!(1010));
    }

    #[test]
    fn test_vanishing_maturity_rejected() {
        let err = period_count(dec!(0.001), 1).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::InvalidBondTerms { .. }));
    }

    #[test]
    fn test_payment_dates_follow_settlement() {
        let settlement = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let bond = Bond::new(dec!(1000), dec!(5), dec!(1), 4).with_settlement_date(settlement);
        let flows = cash_flows(&bond).unwrap();
        let dates: Vec<NaiveDate> = flows.iter().filter_map(|cf| cf.payment_date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
                NaiveDate::from_ymd_opt(2024, 7, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 10, 31).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            ]
        );
    }

    #[test]
    fn test_labels() {
        let flows = cash_flows(&ten_year_semiannual()).unwrap();
        assert_eq!(flows[2].label, "P3 (1.5y)");
    }
}
