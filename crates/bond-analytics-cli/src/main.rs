mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::curve::CurveArgs;
use commands::fixed_income::{BondArgs, PriceArgs, RiskArgs, YieldArgs};
use commands::ladder::LadderArgs;
use commands::portfolio::PortfolioArgs;

/// Fixed-income analytics with decimal precision
#[derive(Parser)]
#[command(
    name = "bfa",
    version,
    about = "Fixed-income analytics with decimal precision",
    long_about = "A CLI for bond analytics with decimal precision. Prices bonds, \
                  solves yield to maturity, computes duration and convexity, \
                  classifies yield curves, builds bond ladders and aggregates \
                  fixed-income portfolios. Set RUST_LOG=debug to trace the solver."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Full bond analysis: price, yield, cash flows and risk
    Bond(BondArgs),
    /// Price a bond from a yield
    Price(PriceArgs),
    /// Solve yield to maturity from a market price
    Yield(YieldArgs),
    /// Duration, convexity and DV01
    Risk(RiskArgs),
    /// Interpolate and classify a yield curve
    Curve(CurveArgs),
    /// Build a bond ladder against a yield curve
    Ladder(LadderArgs),
    /// Aggregate portfolio yield, duration and risk
    Portfolio(PortfolioArgs),
    /// Greedy reallocation by yield per unit of duration
    Optimize(PortfolioArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Bond(args) => commands::fixed_income::run_bond(args),
        Commands::Price(args) => commands::fixed_income::run_price(args),
        Commands::Yield(args) => commands::fixed_income::run_yield(args),
        Commands::Risk(args) => commands::fixed_income::run_risk(args),
        Commands::Curve(args) => commands::curve::run_curve(args),
        Commands::Ladder(args) => commands::ladder::run_ladder(args),
        Commands::Portfolio(args) => commands::portfolio::run_portfolio(args),
        Commands::Optimize(args) => commands::portfolio::run_optimize(args),
        Commands::Version => {
            println!("bfa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
