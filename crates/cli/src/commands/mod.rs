//! CLI command implementations

pub mod audit;
pub mod identity;
pub mod ledger;
