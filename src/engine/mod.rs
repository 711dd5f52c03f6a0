//! The earnings engine. Everything in here is a pure function of a job schedule, the ledger state
//! and the current local time:
//!   - [schedule] turns a salary and a schedule into rates and a paid-window predicate.
//!   - [accrual] derives today's worked minutes and earnings.
//!   - [reconcile] closes the days that passed while the application wasn't running.

pub mod accrual;
pub mod reconcile;
pub mod schedule;
