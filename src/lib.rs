//! Home Herald - a household notification bot.
//!
//! Watches trains, reminds about bin collections, and accrues a weekly
//! allowance. A small scheduling kernel drives all three domains from
//! persisted state: each domain derives its next milestone instant from
//! its record, acts when the instant arrives, and reconciles record
//! against clock after a restart, so downtime is caught up instead of
//! compounding drift.

pub mod alert;
pub mod commands;
pub mod config;
pub mod domains;
pub mod provider;
pub mod sched;
pub mod server;
pub mod store;
pub mod types;
