//! Fixed-income portfolio aggregation and allocation.

pub mod analysis;
pub mod optimization;

pub use analysis::{
    analyze_portfolio, is_high_yield, Instrument, PortfolioAnalysis, PortfolioInput,
    PortfolioPosition, PositionAnalysis, PositionMetrics, SectorWeight,
};
pub use optimization::{optimize_allocation, AllocationSummary, OptimizationResult, TargetWeight};
