pub mod curve;
pub mod fixed_income;
pub mod ladder;
pub mod portfolio;
