use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use bond_analytics_core::curve::{self, CurveInput, YieldCurvePoint};

use crate::input;

/// Arguments for yield curve analysis
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct CurveArgs {
    /// Curve points as tenor:rate pairs in percent, e.g. "1:4.0,5:4.5,10:4.2"
    #[arg(long)]
    pub points: Option<String>,

    /// Tenor to interpolate (repeatable)
    #[arg(long = "tenor")]
    pub tenors: Vec<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_curve(args: CurveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let curve_input = match input::load_request::<CurveInput>(args.input.as_deref())? {
        Some(request) => request,
        None => {
            let spec = args
                .points
                .as_deref()
                .ok_or("--points is required (or provide --input)")?;
            CurveInput {
                points: parse_points(spec)?,
                tenors: args.tenors,
            }
        }
    };
    let result = curve::analyze_curve(&curve_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Parse "tenor:rate" pairs separated by commas.
pub fn parse_points(spec: &str) -> Result<Vec<YieldCurvePoint>, Box<dyn std::error::Error>> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (tenor, rate) = pair
                .split_once(':')
                .ok_or_else(|| format!("Invalid curve point '{pair}', expected tenor:rate"))?;
            let tenor = Decimal::from_str(tenor.trim())
                .map_err(|e| format!("Invalid tenor in '{pair}': {e}"))?;
            let rate = Decimal::from_str(rate.trim())
                .map_err(|e| format!("Invalid rate in '{pair}': {e}"))?;
            Ok(YieldCurvePoint::new(tenor, rate))
        })
        .collect()
}
