//! Personal time and earnings tracker. Jobs describe a salary and a daily schedule, the engine
//! derives an hourly rate from them and accrues today's earnings against the local clock, while
//! the ledger closes work days into history and keeps the lifetime total consistent across
//! restarts.
//!

pub mod cli;
pub mod engine;
pub mod ledger;
pub mod persistence;
pub mod storage;
pub mod utils;
