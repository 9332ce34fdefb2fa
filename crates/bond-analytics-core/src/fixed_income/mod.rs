//! Bond-level analytics: cash-flow schedules, discounting, yield solving and
//! interest-rate risk.

pub mod bonds;
pub mod cashflows;
pub mod duration;
pub mod present_value;
pub mod yields;

pub use bonds::Bond;
pub use cashflows::CashFlowEvent;
