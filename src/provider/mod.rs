//! External data provider interfaces.
//!
//! The herald itself never speaks to live-departure or council APIs
//! directly; it consumes narrow trait interfaces so that schedulers and
//! command handlers can be tested against scripted fakes, and so that a
//! deployment without credentials degrades to a warn-and-fail stub instead
//! of refusing to start.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::types::CrsCode;

/// One row of a live departure board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainService {
    /// Scheduled departure time as shown on the board, e.g. `"17:45"`.
    /// This is the stable identity of a service across polls.
    pub scheduled: String,

    /// Estimated departure / running status, e.g. `"On time"`, `"17:52"`,
    /// `"Delayed"`, `"Cancelled"`, `"Departed"`.
    pub estimated: String,

    /// Destination station name.
    pub destination: String,

    /// Platform number, when the board shows one.
    pub platform: Option<String>,
}

/// One upcoming bin collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinCollection {
    /// The collection date.
    pub date: NaiveDate,

    /// What is being collected, e.g. `"Recycling"` or `"General waste"`.
    pub kind: String,
}

/// Errors returned by data providers.
///
/// All provider failures are treated as transient by callers: state is left
/// untouched and the operation is retried on the next scheduled attempt.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The upstream service could not be reached or returned garbage.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Live departure board lookups.
pub trait TrainBoardProvider: Clone + Send + Sync + 'static {
    /// Fetches the current departure board for a station.
    fn departures(
        &self,
        station: &CrsCode,
    ) -> impl Future<Output = Result<Vec<TrainService>, ProviderError>> + Send;
}

/// Upcoming bin collection lookups.
pub trait BinScheduleProvider: Clone + Send + Sync + 'static {
    /// Fetches the upcoming collection schedule.
    fn upcoming_collections(
        &self,
    ) -> impl Future<Output = Result<Vec<BinCollection>, ProviderError>> + Send;
}

/// Stand-in provider for deployments with no upstream configured.
///
/// Every call logs a warning and fails as unavailable, which callers treat
/// as transient. The process stays up and the other domains keep working.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredProvider;

impl TrainBoardProvider for UnconfiguredProvider {
    async fn departures(&self, station: &CrsCode) -> Result<Vec<TrainService>, ProviderError> {
        warn!(%station, "no train board provider configured");
        Err(ProviderError::Unavailable(
            "no train board provider configured".to_string(),
        ))
    }
}

impl BinScheduleProvider for UnconfiguredProvider {
    async fn upcoming_collections(&self) -> Result<Vec<BinCollection>, ProviderError> {
        warn!("no bin schedule provider configured");
        Err(ProviderError::Unavailable(
            "no bin schedule provider configured".to_string(),
        ))
    }
}
