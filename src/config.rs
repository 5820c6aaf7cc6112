//! Process configuration from environment variables.
//!
//! All settings have workable defaults so a bare `home-herald` starts in
//! dry-run mode (logging sink, unconfigured providers) without any
//! environment at all.
//!
//! | Variable                   | Default        | Meaning                                 |
//! |----------------------------|----------------|-----------------------------------------|
//! | `HERALD_STATE_DIR`         | `./state`      | Directory for per-domain records        |
//! | `HERALD_LISTEN_ADDR`       | `0.0.0.0:3000` | HTTP listen address                     |
//! | `HERALD_WATCH_POLL_SECS`   | `120`          | Train watch poll interval               |
//! | `HERALD_RETRY_SECS`        | `3600`         | Backoff after a failed calendar milestone |
//! | `HERALD_DEFAULT_STATION`   | unset          | CRS code seeding the session context    |
//! | `HERALD_WEEKLY_PENCE`      | `100`          | Weekly allowance for a fresh budget record |
//! | `HERALD_RECIPIENT`         | unset          | Recipient for all domains               |
//! | `HERALD_RECIPIENT_BUDGET`  | unset          | Per-domain recipient override           |
//! | `HERALD_RECIPIENT_BINS`    | unset          | Per-domain recipient override           |
//! | `HERALD_RECIPIENT_TRAINS`  | unset          | Per-domain recipient override           |

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::types::{CrsCode, Domain, Pence, RecipientId};

const DEFAULT_STATE_DIR: &str = "./state";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_WATCH_POLL_SECS: u64 = 120;
const DEFAULT_RETRY_SECS: u64 = 3600;
const DEFAULT_WEEKLY_PENCE: i64 = 100;

/// Process configuration.
#[derive(Debug, Clone)]
pub struct HeraldConfig {
    /// Directory holding the per-domain state records.
    pub state_dir: PathBuf,

    /// HTTP listen address for the operational endpoints.
    pub listen_addr: SocketAddr,

    /// How often an active train watch polls the departure board.
    pub watch_poll_interval: Duration,

    /// Backoff after a failed budget or bins milestone.
    pub retry_fallback: Duration,

    /// Station seeding the session context, so `/watch` works before any
    /// `/trains` query.
    pub default_station: Option<CrsCode>,

    /// Weekly allowance used when creating a fresh budget record. Changes
    /// afterwards go through `/weekly`.
    pub weekly_amount: Pence,

    /// Alert recipient per domain. A domain with no recipient gets its
    /// alerts dropped with a warning.
    pub recipients: HashMap<Domain, RecipientId>,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        HeraldConfig {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            listen_addr: DEFAULT_LISTEN_ADDR.parse().unwrap_or_else(|_| {
                // The literal above always parses; this keeps the API
                // panic-free anyway.
                SocketAddr::from(([0, 0, 0, 0], 3000))
            }),
            watch_poll_interval: Duration::from_secs(DEFAULT_WATCH_POLL_SECS),
            retry_fallback: Duration::from_secs(DEFAULT_RETRY_SECS),
            default_station: None,
            weekly_amount: Pence(DEFAULT_WEEKLY_PENCE),
            recipients: HashMap::new(),
        }
    }
}

impl HeraldConfig {
    /// Creates a config from environment variables, defaulting anything
    /// unset or unparseable (with a warning).
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let state_dir = std::env::var("HERALD_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_dir);

        let listen_addr = parsed_var("HERALD_LISTEN_ADDR").unwrap_or(defaults.listen_addr);

        let watch_poll_interval = parsed_var("HERALD_WATCH_POLL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.watch_poll_interval);

        let retry_fallback = parsed_var("HERALD_RETRY_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_fallback);

        let default_station = std::env::var("HERALD_DEFAULT_STATION")
            .ok()
            .and_then(|s| match CrsCode::parse(&s) {
                Ok(code) => Some(code),
                Err(e) => {
                    warn!(error = %e, "ignoring HERALD_DEFAULT_STATION");
                    None
                }
            });

        let weekly_amount = parsed_var("HERALD_WEEKLY_PENCE")
            .map(Pence)
            .unwrap_or(defaults.weekly_amount);

        let shared = std::env::var("HERALD_RECIPIENT").ok().map(RecipientId::new);
        let mut recipients = HashMap::new();
        for domain in Domain::ALL {
            let var = format!("HERALD_RECIPIENT_{}", domain.to_string().to_uppercase());
            let recipient = std::env::var(&var)
                .ok()
                .map(RecipientId::new)
                .or_else(|| shared.clone());
            if let Some(recipient) = recipient {
                recipients.insert(domain, recipient);
            }
        }

        HeraldConfig {
            state_dir,
            listen_addr,
            watch_poll_interval,
            retry_fallback,
            default_station,
            weekly_amount,
            recipients,
        }
    }
}

/// Reads and parses one env var, warning when set but unparseable.
fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "unparseable env var, using default");
            None
        }
    }
}
