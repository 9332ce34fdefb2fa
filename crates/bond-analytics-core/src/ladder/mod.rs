//! Bond ladders: an investment split into rungs of staggered maturity.

pub mod builder;
pub mod reinvestment;

pub use builder::{build_ladder, IncomeEvent, Ladder, LadderInput, LadderRung};
pub use reinvestment::{project_reinvestment, AnnualIncome, RateScenario, ReinvestmentProjection};
