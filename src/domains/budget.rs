//! Weekly allowance accrual.
//!
//! The budget domain credits a configurable weekly amount to a balance.
//! Instead of remembering "the next payment is due at T", the persisted
//! state stores the instant accrual last ran; everything else is derived.
//! After downtime the same accrual function that serves the live scheduler
//! also settles the backlog: whole elapsed weeks are credited as one
//! combined transaction and the accrual pointer advances by exactly that
//! many weeks, so partial weeks carry over and no week is ever credited
//! twice or skipped.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::commands::types::BudgetCommand;
use crate::commands::CommandError;
use crate::sched::{CatchUpPolicy, DomainDriver, DomainError};
use crate::store::{PersistedRecord, SharedStore};
use crate::types::{Domain, Pence};

/// How many transactions the persisted history keeps.
const HISTORY_LIMIT: usize = 10;

/// Backoff after a failed accrual write. Money is not time-critical at
/// sub-hour granularity.
const RETRY_DELAY: StdDuration = StdDuration::from_secs(3600);

/// One balance movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub at: DateTime<Utc>,
    pub amount: Pence,
    pub note: String,
}

/// Persisted budget state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetState {
    pub schema_version: u32,

    /// Current balance.
    pub balance: Pence,

    /// Amount credited per week.
    pub weekly_amount: Pence,

    /// When accrual last ran. The next milestone is exactly one week after
    /// this; elapsed time beyond whole weeks is carried, not lost.
    pub last_accrual: DateTime<Utc>,

    /// Most recent transactions, newest first, capped at [`HISTORY_LIMIT`].
    pub history: Vec<Transaction>,
}

impl BudgetState {
    pub fn new(now: DateTime<Utc>, weekly_amount: Pence) -> Self {
        BudgetState {
            schema_version: Self::SCHEMA_VERSION,
            balance: Pence::ZERO,
            weekly_amount,
            last_accrual: now,
            history: Vec::new(),
        }
    }
}

impl PersistedRecord for BudgetState {
    const SCHEMA_VERSION: u32 = 1;

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

/// Whole weeks elapsed since the last accrual. Never negative.
pub fn elapsed_weeks(last_accrual: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_accrual).num_weeks().max(0)
}

/// Records a transaction, trimming history to the cap.
pub fn record_transaction(state: &mut BudgetState, at: DateTime<Utc>, amount: Pence, note: &str) {
    state.balance += amount;
    state.history.insert(
        0,
        Transaction {
            at,
            amount,
            note: note.to_string(),
        },
    );
    state.history.truncate(HISTORY_LIMIT);
}

/// Credits all whole weeks elapsed since the last accrual.
///
/// Zero elapsed weeks is a no-op. Otherwise the combined amount lands as a
/// single transaction and `last_accrual` advances by exactly the credited
/// weeks, preserving any partial week.
pub fn accrue(state: &mut BudgetState, now: DateTime<Utc>) -> Option<Alert> {
    let weeks = elapsed_weeks(state.last_accrual, now);
    if weeks < 1 {
        return None;
    }

    let amount = state.weekly_amount * weeks;
    record_transaction(state, now, amount, &format!("Auto-allowance ({weeks} wks)"));
    state.last_accrual = state.last_accrual + Duration::weeks(weeks);

    Some(Alert::info(
        Domain::Budget,
        format!(
            "💰 Allowance credited: {amount} ({weeks} wk). Balance: {}",
            state.balance
        ),
    ))
}

/// Budget domain driver: scheduling plus command handling over one store.
#[derive(Clone)]
pub struct BudgetDriver {
    store: SharedStore<BudgetState>,
}

impl BudgetDriver {
    pub fn new(store: SharedStore<BudgetState>) -> Self {
        BudgetDriver { store }
    }

    pub fn store(&self) -> &SharedStore<BudgetState> {
        &self.store
    }

    /// Handles a parsed budget command, returning the reply text.
    pub async fn handle_command(&self, command: BudgetCommand) -> Result<String, CommandError> {
        match command {
            BudgetCommand::Balance => {
                let state = self.store.snapshot().await;
                Ok(format!("💰 Balance: {}", state.balance))
            }
            BudgetCommand::Add { amount, note } => {
                let balance = self
                    .store
                    .update(|s| {
                        record_transaction(s, Utc::now(), amount, &note);
                        s.balance
                    })
                    .await?;
                Ok(format!("Added {amount} ({note}). Balance: {balance}"))
            }
            BudgetCommand::Spend { amount, note } => {
                let balance = self
                    .store
                    .update(|s| {
                        record_transaction(s, Utc::now(), -amount, &note);
                        s.balance
                    })
                    .await?;
                Ok(format!("Spent {amount} ({note}). Balance: {balance}"))
            }
            BudgetCommand::SetWeekly { amount } => {
                self.store.update(|s| s.weekly_amount = amount).await?;
                Ok(format!("Weekly allowance set to {amount}"))
            }
            BudgetCommand::History => {
                let state = self.store.snapshot().await;
                if state.history.is_empty() {
                    return Ok("No transactions yet.".to_string());
                }
                let mut lines = vec!["📜 Recent transactions:".to_string()];
                for tx in &state.history {
                    lines.push(format!(
                        "• {} {} — {}",
                        tx.at.format("%d %b"),
                        tx.amount,
                        tx.note
                    ));
                }
                Ok(lines.join("\n"))
            }
            BudgetCommand::Usage => Ok("💰 Budget commands:\n\
                 • /balance - show current balance\n\
                 • /add <amount> [note] - credit the balance\n\
                 • /spend <amount> [note] - debit the balance\n\
                 • /weekly <amount> - set the weekly allowance\n\
                 • /history - recent transactions"
                .to_string()),
        }
    }
}

impl DomainDriver for BudgetDriver {
    fn domain(&self) -> Domain {
        Domain::Budget
    }

    fn catch_up_policy(&self) -> CatchUpPolicy {
        CatchUpPolicy::Replay
    }

    fn retry_delay(&self) -> StdDuration {
        RETRY_DELAY
    }

    async fn next_milestone_at(&self, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(self.store.read(|s| s.last_accrual + Duration::weeks(1)).await)
    }

    async fn on_milestone(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, DomainError> {
        let alert = self.store.update(|s| accrue(s, now)).await?;
        Ok(alert.into_iter().collect())
    }

    async fn reconcile(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, DomainError> {
        // Replay policy: catch-up is the same accrual the live path runs
        self.on_milestone(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record_path;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    const WEEK_SECS: i64 = 7 * 24 * 3600;

    mod accrual {
        use super::*;

        #[test]
        fn under_a_week_is_a_no_op() {
            let mut state = BudgetState::new(at(0), Pence(100));
            let alert = accrue(&mut state, at(WEEK_SECS - 1));

            assert!(alert.is_none());
            assert_eq!(state.balance, Pence::ZERO);
            assert_eq!(state.last_accrual, at(0));
            assert!(state.history.is_empty());
        }

        #[test]
        fn exactly_one_week_credits_once() {
            let mut state = BudgetState::new(at(0), Pence(100));
            let alert = accrue(&mut state, at(WEEK_SECS));

            assert!(alert.is_some());
            assert_eq!(state.balance, Pence(100));
            assert_eq!(state.last_accrual, at(WEEK_SECS));
            assert_eq!(state.history.len(), 1);
        }

        #[test]
        fn three_weeks_at_five_pounds_credits_fifteen() {
            let mut state = BudgetState::new(at(0), Pence(500));
            let alert = accrue(&mut state, at(3 * WEEK_SECS + 600)).unwrap();

            assert_eq!(state.balance, Pence(1500));
            assert_eq!(state.history.len(), 1, "one combined transaction");
            assert_eq!(state.history[0].amount, Pence(1500));
            assert!(state.history[0].note.contains("3 wks"));
            assert!(alert.body.contains("£15.00"));
        }

        #[test]
        fn partial_week_carries_over() {
            let mut state = BudgetState::new(at(0), Pence(100));
            // 1.5 weeks: credit 1, keep the half week
            accrue(&mut state, at(WEEK_SECS + WEEK_SECS / 2));
            assert_eq!(state.balance, Pence(100));
            assert_eq!(state.last_accrual, at(WEEK_SECS));

            // Half a week later the second week completes
            let alert = accrue(&mut state, at(2 * WEEK_SECS));
            assert!(alert.is_some());
            assert_eq!(state.balance, Pence(200));
        }

        #[test]
        fn clock_behind_pointer_is_a_no_op() {
            let mut state = BudgetState::new(at(WEEK_SECS), Pence(100));
            let alert = accrue(&mut state, at(0));

            assert!(alert.is_none());
            assert_eq!(state.balance, Pence::ZERO);
            assert_eq!(state.last_accrual, at(WEEK_SECS));
        }

        #[test]
        fn accrual_is_idempotent_at_fixed_instant() {
            let mut state = BudgetState::new(at(0), Pence(100));
            let now = at(2 * WEEK_SECS);

            accrue(&mut state, now);
            let after_first = state.clone();
            let second = accrue(&mut state, now);

            assert!(second.is_none());
            assert_eq!(state, after_first);
        }

        proptest! {
            #[test]
            fn credited_amount_is_exactly_weeks_times_weekly(
                weekly in 1i64..10_000,
                elapsed_secs in 0i64..(20 * WEEK_SECS),
            ) {
                let mut state = BudgetState::new(at(0), Pence(weekly));
                accrue(&mut state, at(elapsed_secs));

                let weeks = elapsed_secs / WEEK_SECS;
                prop_assert_eq!(state.balance, Pence(weekly) * weeks);
                prop_assert_eq!(state.last_accrual, at(weeks * WEEK_SECS));
            }

            #[test]
            fn split_accruals_equal_one_big_accrual(
                weekly in 1i64..10_000,
                first_secs in 0i64..(10 * WEEK_SECS),
                second_secs in 0i64..(10 * WEEK_SECS),
            ) {
                let total = first_secs + second_secs;

                let mut split = BudgetState::new(at(0), Pence(weekly));
                accrue(&mut split, at(first_secs));
                accrue(&mut split, at(total));

                let mut whole = BudgetState::new(at(0), Pence(weekly));
                accrue(&mut whole, at(total));

                prop_assert_eq!(split.balance, whole.balance);
                prop_assert_eq!(split.last_accrual, whole.last_accrual);
            }
        }
    }

    mod history {
        use super::*;

        #[test]
        fn history_is_capped() {
            let mut state = BudgetState::new(at(0), Pence(100));
            for i in 0..25 {
                record_transaction(&mut state, at(i), Pence(1), &format!("tx {i}"));
            }

            assert_eq!(state.history.len(), HISTORY_LIMIT);
            // Newest first
            assert_eq!(state.history[0].note, "tx 24");
        }
    }

    mod driver {
        use super::*;
        use crate::sched::DomainDriver;

        fn driver(dir: &std::path::Path, weekly: Pence) -> BudgetDriver {
            let store = SharedStore::load_or_default(
                record_path(dir, "budget"),
                BudgetState::new(at(0), weekly),
            );
            BudgetDriver::new(store)
        }

        #[tokio::test]
        async fn next_milestone_is_one_week_after_last_accrual() {
            let dir = tempdir().unwrap();
            let d = driver(dir.path(), Pence(100));

            let next = d.next_milestone_at(at(0)).await;
            assert_eq!(next, Some(at(WEEK_SECS)));
        }

        #[tokio::test]
        async fn milestone_persists_before_alerting() {
            let dir = tempdir().unwrap();
            let d = driver(dir.path(), Pence(500));

            let alerts = d.on_milestone(at(3 * WEEK_SECS)).await.unwrap();
            assert_eq!(alerts.len(), 1);

            // A reopened store sees the credited balance
            let reopened = SharedStore::load_or_default(
                record_path(dir.path(), "budget"),
                BudgetState::new(at(0), Pence(500)),
            );
            assert_eq!(reopened.snapshot().await.balance, Pence(1500));
        }

        #[tokio::test]
        async fn reconcile_twice_credits_once() {
            let dir = tempdir().unwrap();
            let d = driver(dir.path(), Pence(100));

            let first = d.reconcile(at(2 * WEEK_SECS)).await.unwrap();
            let second = d.reconcile(at(2 * WEEK_SECS)).await.unwrap();

            assert_eq!(first.len(), 1);
            assert!(second.is_empty());
            assert_eq!(d.store().snapshot().await.balance, Pence(200));
        }

        #[tokio::test]
        async fn commands_mutate_balance() {
            let dir = tempdir().unwrap();
            let d = driver(dir.path(), Pence(100));

            let reply = d
                .handle_command(BudgetCommand::Add {
                    amount: Pence(250),
                    note: "birthday".to_string(),
                })
                .await
                .unwrap();
            assert!(reply.contains("£2.50"));

            d.handle_command(BudgetCommand::Spend {
                amount: Pence(100),
                note: "sweets".to_string(),
            })
            .await
            .unwrap();

            let state = d.store().snapshot().await;
            assert_eq!(state.balance, Pence(150));
            assert_eq!(state.history.len(), 2);

            let history = d.handle_command(BudgetCommand::History).await.unwrap();
            assert!(history.contains("birthday"));
            assert!(history.contains("sweets"));
        }

        #[tokio::test]
        async fn set_weekly_changes_future_accrual() {
            let dir = tempdir().unwrap();
            let d = driver(dir.path(), Pence(100));

            d.handle_command(BudgetCommand::SetWeekly {
                amount: Pence(300),
            })
            .await
            .unwrap();

            d.on_milestone(at(WEEK_SECS)).await.unwrap();
            assert_eq!(d.store().snapshot().await.balance, Pence(300));
        }
    }
}
