use clap::Args;
use serde_json::Value;

use bond_analytics_core::portfolio::{self, PortfolioInput};

use crate::input;

/// Arguments for portfolio analysis and optimization
#[derive(Args)]
pub struct PortfolioArgs {
    /// Path to JSON input file with `positions`
    #[arg(long)]
    pub input: Option<String>,
}

fn load_portfolio(args: &PortfolioArgs) -> Result<PortfolioInput, Box<dyn std::error::Error>> {
    input::load_request(args.input.as_deref())?
        .ok_or_else(|| "--input <file.json> or stdin required for portfolio analysis".into())
}

pub fn run_portfolio(args: PortfolioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let portfolio_input = load_portfolio(&args)?;
    let result = portfolio::analyze_portfolio(&portfolio_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_optimize(args: PortfolioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let portfolio_input = load_portfolio(&args)?;
    let result = portfolio::optimize_allocation(&portfolio_input)?;
    Ok(serde_json::to_value(result)?)
}
