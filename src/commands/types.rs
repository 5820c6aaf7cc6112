//! Parsed command types for the household command surface.
//!
//! Each domain has its own small vocabulary; the parser in
//! [`super::parser`] turns raw chat text into these.

use serde::{Deserialize, Serialize};

use crate::types::{CrsCode, Pence};

/// Budget commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetCommand {
    /// `/balance` - show the current balance.
    Balance,

    /// `/add <amount> [note]` - credit the balance.
    Add { amount: Pence, note: String },

    /// `/spend <amount> [note]` - debit the balance.
    Spend { amount: Pence, note: String },

    /// `/weekly <amount>` - change the weekly allowance.
    SetWeekly { amount: Pence },

    /// `/history` - recent transactions.
    History,

    /// `/usage` or `/help`.
    Usage,
}

/// Bins commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinsCommand {
    /// `/bins` - show the upcoming collection schedule.
    Schedule,

    /// `/usage` or `/help`.
    Usage,
}

/// Trains commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainsCommand {
    /// `/trains [station]` - live departures for a station.
    Departures { station: Option<String> },

    /// `/watch <hh:mm> [station]` - watch the service scheduled at that time.
    Watch {
        scheduled: String,
        station: Option<String>,
    },

    /// `/unwatch` - end the active watch.
    Unwatch,

    /// `/shortcut <name> <crs>` - save a station shortcut.
    AddShortcut { name: String, station: CrsCode },

    /// `/shortcuts` - list saved shortcuts.
    ListShortcuts,

    /// `/usage` or `/help`.
    Usage,
}
