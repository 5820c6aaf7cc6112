//! Bin collection reminders.
//!
//! The bins domain caches the council's upcoming collection schedule and
//! derives a three-step reminder ladder for each collection date: a
//! night-before reminder at 18:00, a morning-of reminder at 07:00, and a
//! silent schedule refresh at 09:00 the day after. The persisted state is
//! the cached schedule plus a monotonic pointer to the last milestone acted
//! on; milestones themselves are recomputed from the schedule, never
//! stored.
//!
//! Catch-up discards: a reminder for a collection that happened while the
//! process was down is noise, so reconciliation advances the pointer past
//! stale milestones without alerting and refreshes the schedule if nothing
//! upcoming remains.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::commands::CommandError;
use crate::commands::types::BinsCommand;
use crate::provider::{BinCollection, BinScheduleProvider, ProviderError};
use crate::sched::{CatchUpPolicy, DomainDriver, DomainError};
use crate::store::{PersistedRecord, SharedStore};
use crate::types::Domain;

/// The reminder ladder for one collection date, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinPhase {
    /// 18:00 the day before the collection.
    NightBefore,
    /// 07:00 on the collection day.
    MorningOf,
    /// 09:00 the day after: refresh the cached schedule, no alert.
    Refresh,
}

/// One derived milestone: a phase of a specific collection date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinMilestone {
    pub collection: NaiveDate,
    pub phase: BinPhase,
}

impl BinMilestone {
    /// The wall-clock instant this milestone is due.
    pub fn instant(&self) -> DateTime<Utc> {
        let (date, hour) = match self.phase {
            BinPhase::NightBefore => (self.collection - Days::new(1), 18),
            BinPhase::MorningOf => (self.collection, 7),
            BinPhase::Refresh => (self.collection + Days::new(1), 9),
        };
        date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(hour)
    }
}

/// Persisted bins state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinsState {
    pub schema_version: u32,

    /// Cached collection schedule as last fetched from the provider.
    pub schedule: Vec<BinCollection>,

    /// The last milestone acted on. Only ever advances toward later
    /// instants; everything at or before it is settled.
    pub last_notified: Option<BinMilestone>,
}

impl BinsState {
    pub fn new() -> Self {
        BinsState {
            schema_version: Self::SCHEMA_VERSION,
            schedule: Vec::new(),
            last_notified: None,
        }
    }
}

impl Default for BinsState {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistedRecord for BinsState {
    const SCHEMA_VERSION: u32 = 1;

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

/// All milestones derived from a schedule, ordered by due instant.
fn milestones_for(schedule: &[BinCollection]) -> Vec<BinMilestone> {
    let mut dates: Vec<NaiveDate> = schedule.iter().map(|c| c.date).collect();
    dates.sort_unstable();
    dates.dedup();

    let mut milestones: Vec<BinMilestone> = dates
        .into_iter()
        .flat_map(|collection| {
            [BinPhase::NightBefore, BinPhase::MorningOf, BinPhase::Refresh]
                .into_iter()
                .map(move |phase| BinMilestone { collection, phase })
        })
        .collect();
    milestones.sort_by_key(|m| m.instant());
    milestones
}

/// The next unhandled milestone, if the schedule still has one.
pub fn next_milestone(state: &BinsState) -> Option<BinMilestone> {
    let floor = state.last_notified.map(|m| m.instant());
    milestones_for(&state.schedule)
        .into_iter()
        .find(|m| floor.is_none_or(|f| m.instant() > f))
}

/// Advances the pointer past every milestone due before `now`, without
/// alerting. Returns how many were discarded.
pub fn discard_stale(state: &mut BinsState, now: DateTime<Utc>) -> usize {
    let floor = state.last_notified.map(|m| m.instant());
    let stale: Vec<BinMilestone> = milestones_for(&state.schedule)
        .into_iter()
        .filter(|m| m.instant() < now && floor.is_none_or(|f| m.instant() > f))
        .collect();

    if let Some(last) = stale.last() {
        state.last_notified = Some(*last);
    }
    stale.len()
}

/// What is being collected on a given date, e.g. `"Recycling, Garden waste"`.
pub fn due_kinds(schedule: &[BinCollection], date: NaiveDate) -> String {
    let kinds: Vec<&str> = schedule
        .iter()
        .filter(|c| c.date == date)
        .map(|c| c.kind.as_str())
        .collect();
    kinds.join(", ")
}

fn reminder_alert(state: &BinsState, milestone: BinMilestone) -> Option<Alert> {
    let kinds = due_kinds(&state.schedule, milestone.collection);
    if kinds.is_empty() {
        return None;
    }
    let body = match milestone.phase {
        BinPhase::NightBefore => format!("🗑️ Bins out tonight: {kinds}"),
        BinPhase::MorningOf => format!("🗑️ Bin collection today: {kinds}"),
        BinPhase::Refresh => return None,
    };
    Some(Alert::info(Domain::Bins, body))
}

/// Bins domain driver.
#[derive(Clone)]
pub struct BinsDriver<P> {
    store: SharedStore<BinsState>,
    provider: P,
    retry_delay: StdDuration,
}

impl<P: BinScheduleProvider> BinsDriver<P> {
    pub fn new(store: SharedStore<BinsState>, provider: P, retry_delay: StdDuration) -> Self {
        BinsDriver {
            store,
            provider,
            retry_delay,
        }
    }

    pub fn store(&self) -> &SharedStore<BinsState> {
        &self.store
    }

    /// Fetches a fresh schedule and installs it, discarding any milestones
    /// the new schedule places in the past.
    async fn refresh_schedule(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        let schedule = self.provider.upcoming_collections().await?;
        self.store
            .update(|s| {
                s.schedule = schedule;
                discard_stale(s, now);
            })
            .await?;
        Ok(())
    }

    /// Handles a parsed bins command, returning the reply text.
    pub async fn handle_command(&self, command: BinsCommand) -> Result<String, CommandError> {
        match command {
            BinsCommand::Schedule => {
                let now = Utc::now();
                let schedule = self.provider.upcoming_collections().await?;
                self.store
                    .update(|s| {
                        s.schedule = schedule.clone();
                        // A freshly fetched schedule can still contain
                        // milestones that already passed; they must not fire.
                        discard_stale(s, now);
                    })
                    .await?;

                if schedule.is_empty() {
                    return Ok("No upcoming bin collections found.".to_string());
                }
                let mut lines = vec!["🗑️ Upcoming collections:".to_string()];
                for collection in &schedule {
                    lines.push(format!(
                        "• {} — {}",
                        collection.date.format("%a %d %b"),
                        collection.kind
                    ));
                }
                Ok(lines.join("\n"))
            }
            BinsCommand::Usage => Ok("🗑️ Bins commands:\n\
                 • /bins - show upcoming collections"
                .to_string()),
        }
    }
}

impl<P: BinScheduleProvider> DomainDriver for BinsDriver<P> {
    fn domain(&self) -> Domain {
        Domain::Bins
    }

    fn catch_up_policy(&self) -> CatchUpPolicy {
        CatchUpPolicy::Discard
    }

    fn retry_delay(&self) -> StdDuration {
        self.retry_delay
    }

    async fn next_milestone_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.store.read(next_milestone).await {
            Some(m) => Some(m.instant()),
            // Nothing upcoming: run a milestone now to refresh the schedule.
            // Failures there back off by retry_delay, so this cannot spin.
            None => Some(now),
        }
    }

    async fn on_milestone(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, DomainError> {
        let pending = self.store.read(next_milestone).await;

        let Some(milestone) = pending else {
            // Schedule exhausted or empty
            self.refresh_schedule(now).await?;
            if self.store.read(next_milestone).await.is_none() {
                return Err(DomainError::Provider(ProviderError::Unavailable(
                    "schedule has no upcoming collections".to_string(),
                )));
            }
            return Ok(vec![]);
        };

        if milestone.instant() > now {
            // Spurious wake (nudge raced the timer)
            return Ok(vec![]);
        }

        match milestone.phase {
            BinPhase::NightBefore | BinPhase::MorningOf => {
                let alert = self
                    .store
                    .update(|s| {
                        s.last_notified = Some(milestone);
                        reminder_alert(s, milestone)
                    })
                    .await?;
                Ok(alert.into_iter().collect())
            }
            BinPhase::Refresh => {
                // Fetch before advancing: a failed fetch leaves the Refresh
                // milestone pending so the backoff retry sees it again.
                let schedule = self.provider.upcoming_collections().await?;
                self.store
                    .update(|s| {
                        s.last_notified = Some(milestone);
                        s.schedule = schedule;
                        discard_stale(s, now);
                    })
                    .await?;
                Ok(vec![])
            }
        }
    }

    async fn reconcile(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, DomainError> {
        let needs_fetch = self
            .store
            .update(|s| {
                discard_stale(s, now);
                next_milestone(s).is_none()
            })
            .await?;

        if needs_fetch {
            self.refresh_schedule(now).await?;
        }
        // Discard policy: catch-up never alerts
        Ok(vec![])
    }
}
