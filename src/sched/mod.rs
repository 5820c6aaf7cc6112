//! The milestone scheduling kernel.
//!
//! Every notification domain exposes the same small capability set through
//! [`DomainDriver`]: report the next instant at which something should
//! happen, act when that instant arrives, and reconcile persisted state
//! against the clock after a restart. One generic runner task
//! ([`runner::run_domain`]) drives each driver; the kernel knows nothing
//! about trains, bins, or money.

pub mod runner;

pub use runner::{reconcile_domain, run_domain};

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::alert::Alert;
use crate::provider::ProviderError;
use crate::store::StoreError;
use crate::types::Domain;

/// How a domain treats milestones that passed while the process was down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUpPolicy {
    /// Missed milestones are made up in full on restart (allowance weeks
    /// are still owed no matter how late we notice).
    Replay,

    /// Missed milestones are skipped without acting (a reminder for a
    /// collection that already happened is noise, not debt).
    Discard,
}

/// A nudge sent to a domain's runner task.
#[derive(Debug)]
pub enum DomainMessage {
    /// State changed out of band (a command ran); recompute the next
    /// milestone instead of sleeping toward a stale one.
    Recheck,
}

/// Errors surfaced by driver operations.
///
/// All of these are treated as transient by the runner: it logs, backs off
/// by the driver's retry delay, and tries again. Drivers must not mutate
/// state on the failing path.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The capability set every scheduled domain implements.
///
/// Drivers are cheap to clone (`Arc` fields) and shared between their
/// runner task and the command router; both see the same stores.
pub trait DomainDriver: Clone + Send + Sync + 'static {
    /// Which domain this driver serves.
    fn domain(&self) -> Domain;

    /// The catch-up behavior this domain declared.
    fn catch_up_policy(&self) -> CatchUpPolicy;

    /// How long the runner should back off after a failed milestone.
    fn retry_delay(&self) -> Duration;

    /// The next instant at which [`Self::on_milestone`] should run, or
    /// `None` to park until a [`DomainMessage::Recheck`] arrives.
    ///
    /// An instant in the past means "run immediately".
    fn next_milestone_at(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Option<DateTime<Utc>>> + Send;

    /// Performs the work due at the current milestone and returns any
    /// alerts to deliver. State must be persisted before alerts are
    /// returned, so a crash after the mutation never re-fires the alert's
    /// milestone but at worst drops the message.
    fn on_milestone(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Alert>, DomainError>> + Send;

    /// Brings persisted state in line with the clock after a restart,
    /// according to [`Self::catch_up_policy`]. Idempotent: running it twice
    /// at the same instant changes nothing the second time.
    fn reconcile(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Alert>, DomainError>> + Send;
}
