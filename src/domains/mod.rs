//! The three notification domains.
//!
//! Each domain contributes a pure state-transition core, a persisted state
//! record, and a driver implementing [`crate::sched::DomainDriver`] plus
//! its command handlers.

pub mod bins;
pub mod budget;
pub mod trains;

pub use bins::{BinMilestone, BinPhase, BinsDriver, BinsState};
pub use budget::{BudgetDriver, BudgetState, Transaction};
pub use trains::{TrainsDriver, TrainsState, WatchState, WatchSubscription};
