//! Live train departure watches.
//!
//! The trains domain participates in the same scheduling kernel as the
//! calendar-driven domains, but its milestones are poll ticks: while a
//! watch is active the next milestone is always one poll interval away, and
//! with no watch the domain parks until a command nudges it awake.
//!
//! A watch is identified by the service's scheduled departure time, which
//! is stable across polls while estimates and platforms move. Each tick
//! diffs the current board row against the last known estimate and
//! platform, alerting on change. A terminal observation (departed,
//! cancelled, or vanished from the board) emits one final alert and ends
//! the watch; watches never outlive their train.
//!
//! Watches are process-local: after a restart the train in question has
//! usually departed, so resurrecting a stale watch would only produce
//! noise. Station shortcuts, by contrast, are durable household vocabulary
//! and live in the persisted record.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::alert::Alert;
use crate::commands::types::TrainsCommand;
use crate::commands::{CommandError, SessionContext};
use crate::provider::{TrainBoardProvider, TrainService};
use crate::sched::{CatchUpPolicy, DomainDriver, DomainError};
use crate::store::{PersistedRecord, SharedStore};
use crate::types::{CrsCode, Domain};

/// Status a fresh watch starts with; the first poll reports the real one.
const UNKNOWN_STATUS: &str = "Unknown";

/// An active watch on one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSubscription {
    /// Station whose departure board is polled.
    pub station: CrsCode,

    /// Scheduled departure time, the service's identity on the board.
    pub scheduled: String,

    /// Destination as last seen on the board; unknown until the first poll.
    pub destination: Option<String>,

    /// Last platform seen on the board.
    pub last_platform: Option<String>,

    /// Last estimated departure / status seen on the board.
    pub last_status: String,

    pub created_at: DateTime<Utc>,
}

/// The watch state machine. At most one watch at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WatchState {
    #[default]
    Inactive,
    Active(WatchSubscription),
}

/// Persisted trains state: the household's station shortcuts.
///
/// Keys are lowercased shortcut names; a `BTreeMap` keeps both the listing
/// and the serialized record in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainsState {
    pub schema_version: u32,
    pub shortcuts: BTreeMap<String, CrsCode>,
}

impl TrainsState {
    pub fn new() -> Self {
        TrainsState {
            schema_version: Self::SCHEMA_VERSION,
            shortcuts: BTreeMap::new(),
        }
    }
}

impl Default for TrainsState {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistedRecord for TrainsState {
    const SCHEMA_VERSION: u32 = 1;

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

/// Whether a board status means the service is gone for good.
fn is_terminal(status: &str) -> bool {
    status.eq_ignore_ascii_case("departed") || status.eq_ignore_ascii_case("cancelled")
}

/// Advances the watch state machine against a fresh board.
///
/// Returns at most one alert per tick. Terminal observations transition to
/// `Inactive` exactly once; an inactive watch never alerts.
pub fn watch_tick(state: &mut WatchState, board: &[TrainService]) -> Option<Alert> {
    let WatchState::Active(sub) = state else {
        return None;
    };

    let Some(service) = board.iter().find(|s| s.scheduled == sub.scheduled) else {
        let body = format!(
            "🚆 {} from {} is no longer on the departure board. Watch ended.",
            sub.scheduled, sub.station
        );
        *state = WatchState::Inactive;
        return Some(Alert::warning(Domain::Trains, body));
    };

    sub.destination = Some(service.destination.clone());

    if is_terminal(&service.estimated) {
        let body = format!(
            "🚆 {} to {} is {}. Watch ended.",
            sub.scheduled,
            service.destination,
            service.estimated.to_lowercase()
        );
        *state = WatchState::Inactive;
        return Some(Alert::warning(Domain::Trains, body));
    }

    let mut changes = Vec::new();
    if service.estimated != sub.last_status {
        changes.push(format!("{} → {}", sub.last_status, service.estimated));
    }
    if service.platform != sub.last_platform {
        let old = sub.last_platform.as_deref().unwrap_or("?");
        let new = service.platform.as_deref().unwrap_or("?");
        changes.push(format!("platform {old} → {new}"));
    }

    sub.last_status = service.estimated.clone();
    sub.last_platform = service.platform.clone();

    if changes.is_empty() {
        return None;
    }
    Some(Alert::warning(
        Domain::Trains,
        format!(
            "🚆 {} to {}: {}",
            sub.scheduled,
            service.destination,
            changes.join(", ")
        ),
    ))
}

/// Trains domain driver.
#[derive(Clone)]
pub struct TrainsDriver<P> {
    store: SharedStore<TrainsState>,
    watch: Arc<Mutex<WatchState>>,
    provider: P,
    poll_interval: StdDuration,
}

impl<P: TrainBoardProvider> TrainsDriver<P> {
    pub fn new(store: SharedStore<TrainsState>, provider: P, poll_interval: StdDuration) -> Self {
        TrainsDriver {
            store,
            watch: Arc::new(Mutex::new(WatchState::Inactive)),
            provider,
            poll_interval,
        }
    }

    pub fn store(&self) -> &SharedStore<TrainsState> {
        &self.store
    }

    /// The current watch state (for tests and the state endpoint).
    pub async fn watch_state(&self) -> WatchState {
        self.watch.lock().await.clone()
    }

    /// Resolves a station argument: shortcut name first, then literal CRS
    /// code, then the session's last queried station.
    async fn resolve_station(
        &self,
        arg: Option<&str>,
        session: &SessionContext,
    ) -> Result<CrsCode, CommandError> {
        match arg {
            Some(name) => {
                let shortcut = self
                    .store
                    .read(|s| s.shortcuts.get(&name.to_lowercase()).cloned())
                    .await;
                match shortcut {
                    Some(code) => Ok(code),
                    None => CrsCode::parse(name).map_err(|_| {
                        CommandError::BadArgument(format!(
                            "{name:?} is neither a shortcut nor a station code"
                        ))
                    }),
                }
            }
            None => session
                .last_station
                .clone()
                .ok_or(CommandError::NoContext),
        }
    }

    /// Handles a parsed trains command, returning the reply text.
    pub async fn handle_command(
        &self,
        command: TrainsCommand,
        session: &mut SessionContext,
    ) -> Result<String, CommandError> {
        match command {
            TrainsCommand::Departures { station } => {
                let station = self.resolve_station(station.as_deref(), session).await?;
                let board = self.provider.departures(&station).await?;
                session.last_station = Some(station.clone());

                if board.is_empty() {
                    return Ok(format!("No departures found for {station}."));
                }
                let mut lines = vec![format!("🚆 Departures from {station}:")];
                for service in &board {
                    let platform = service.platform.as_deref().unwrap_or("-");
                    lines.push(format!(
                        "• {} to {} | Plat {} | {}",
                        service.scheduled, service.destination, platform, service.estimated
                    ));
                }
                Ok(lines.join("\n"))
            }
            TrainsCommand::Watch { scheduled, station } => {
                let station = self.resolve_station(station.as_deref(), session).await?;
                session.last_station = Some(station.clone());

                let sub = WatchSubscription {
                    station: station.clone(),
                    scheduled: scheduled.clone(),
                    destination: None,
                    last_platform: None,
                    last_status: UNKNOWN_STATUS.to_string(),
                    created_at: Utc::now(),
                };
                *self.watch.lock().await = WatchState::Active(sub);
                Ok(format!("👀 Watching the {scheduled} from {station}."))
            }
            TrainsCommand::Unwatch => {
                let mut watch = self.watch.lock().await;
                match std::mem::take(&mut *watch) {
                    WatchState::Active(sub) => {
                        Ok(format!("Stopped watching the {} from {}.", sub.scheduled, sub.station))
                    }
                    WatchState::Inactive => Err(CommandError::NoActiveWatch),
                }
            }
            TrainsCommand::AddShortcut { name, station } => {
                self.store
                    .update(|s| s.shortcuts.insert(name.to_lowercase(), station.clone()))
                    .await?;
                Ok(format!("Saved shortcut {name} → {station}"))
            }
            TrainsCommand::ListShortcuts => {
                let shortcuts = self.store.read(|s| s.shortcuts.clone()).await;
                if shortcuts.is_empty() {
                    return Ok("No shortcuts saved.".to_string());
                }
                let mut lines = vec!["🚆 Shortcuts:".to_string()];
                for (name, code) in shortcuts {
                    lines.push(format!("• {name} → {code}"));
                }
                Ok(lines.join("\n"))
            }
            TrainsCommand::Usage => Ok("🚆 Trains commands:\n\
                 • /trains [station] - live departures\n\
                 • /watch <hh:mm> [station] - watch a service\n\
                 • /unwatch - stop watching\n\
                 • /shortcut <name> <crs> - save a station shortcut\n\
                 • /shortcuts - list shortcuts"
                .to_string()),
        }
    }
}

impl<P: TrainBoardProvider> DomainDriver for TrainsDriver<P> {
    fn domain(&self) -> Domain {
        Domain::Trains
    }

    fn catch_up_policy(&self) -> CatchUpPolicy {
        CatchUpPolicy::Discard
    }

    fn retry_delay(&self) -> StdDuration {
        // A failed poll just waits for the next tick
        self.poll_interval
    }

    async fn next_milestone_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &*self.watch.lock().await {
            WatchState::Active(_) => {
                Some(now + chrono::Duration::from_std(self.poll_interval).unwrap_or_default())
            }
            WatchState::Inactive => None,
        }
    }

    async fn on_milestone(&self, _now: DateTime<Utc>) -> Result<Vec<Alert>, DomainError> {
        let station = match &*self.watch.lock().await {
            WatchState::Active(sub) => sub.station.clone(),
            WatchState::Inactive => return Ok(vec![]),
        };

        // Fetch with the lock released; a command may end the watch
        // mid-fetch, in which case the tick below is a no-op.
        let board = self.provider.departures(&station).await?;

        let mut watch = self.watch.lock().await;
        Ok(watch_tick(&mut watch, &board).into_iter().collect())
    }

    async fn reconcile(&self, _now: DateTime<Utc>) -> Result<Vec<Alert>, DomainError> {
        // Watches do not survive a restart; shortcuts need no catch-up.
        Ok(vec![])
    }
}
