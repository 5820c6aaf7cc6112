//! The household command surface.
//!
//! Inbound chat text is parsed into per-domain commands and dispatched to
//! the domain drivers. Replies (including errors) go straight back to the
//! caller; commands never feed the alert dispatcher. After a handled
//! command the router nudges the domain's scheduler so a changed state
//! (new watch, new weekly amount) is picked up without waiting out a
//! stale sleep.

pub mod parser;
pub mod types;

pub use parser::{parse_bins, parse_budget, parse_trains};

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domains::{BinsDriver, BudgetDriver, TrainsDriver};
use crate::provider::{BinScheduleProvider, ProviderError, TrainBoardProvider};
use crate::sched::DomainMessage;
use crate::store::StoreError;
use crate::types::{CrsCode, Domain};

/// Errors surfaced to the command caller.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A station is needed but none was given and none is in context.
    #[error("no station in context - name one, e.g. /trains KGX")]
    NoContext,

    /// `/unwatch` with nothing being watched.
    #[error("nothing is being watched")]
    NoActiveWatch,

    /// An argument was recognized but unusable.
    #[error("{0}")]
    BadArgument(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-conversation sticky context.
///
/// Carried explicitly by the caller rather than hidden in driver state, so
/// two chats never bleed context into each other.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// The station most recently queried with `/trains`.
    pub last_station: Option<CrsCode>,
}

impl SessionContext {
    /// A session that starts with a default station already in context.
    pub fn with_station(station: Option<CrsCode>) -> Self {
        SessionContext {
            last_station: station,
        }
    }
}

/// Routes parsed commands to domain drivers.
pub struct CommandRouter<TP, BP> {
    budget: BudgetDriver,
    bins: BinsDriver<BP>,
    trains: TrainsDriver<TP>,
    nudges: HashMap<Domain, mpsc::Sender<DomainMessage>>,
}

impl<TP: TrainBoardProvider, BP: BinScheduleProvider> CommandRouter<TP, BP> {
    pub fn new(
        budget: BudgetDriver,
        bins: BinsDriver<BP>,
        trains: TrainsDriver<TP>,
        nudges: HashMap<Domain, mpsc::Sender<DomainMessage>>,
    ) -> Self {
        CommandRouter {
            budget,
            bins,
            trains,
            nudges,
        }
    }

    /// Handles one message aimed at a domain.
    ///
    /// Returns `None` when the text is not a command (ordinary chat),
    /// otherwise the reply text. Errors become replies; they are the
    /// caller's problem, not the scheduler's.
    pub async fn handle(
        &self,
        domain: Domain,
        text: &str,
        session: &mut SessionContext,
    ) -> Option<String> {
        let result = match domain {
            Domain::Budget => {
                let command = parse_budget(text)?;
                self.budget.handle_command(command).await
            }
            Domain::Bins => {
                let command = parse_bins(text)?;
                self.bins.handle_command(command).await
            }
            Domain::Trains => {
                let command = parse_trains(text)?;
                self.trains.handle_command(command, session).await
            }
        };

        match result {
            Ok(reply) => {
                self.nudge(domain).await;
                Some(reply)
            }
            Err(e) => Some(format!("⚠️ {e}")),
        }
    }

    /// Wakes the domain's scheduler to recompute its next milestone.
    async fn nudge(&self, domain: Domain) {
        if let Some(tx) = self.nudges.get(&domain) {
            if tx.send(DomainMessage::Recheck).await.is_err() {
                debug!(%domain, "scheduler not running, nudge dropped");
            }
        }
    }
}
