//! Command ingestion endpoint.
//!
//! The chat integration (or curl, during development) posts raw message
//! text here; the reply body is what the bot would say back. Non-command
//! text gets 204 No Content, mirroring a bot that stays quiet in ordinary
//! conversation.

use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use tokio::sync::Mutex;

use crate::commands::{CommandRouter, SessionContext};
use crate::provider::{BinScheduleProvider, TrainBoardProvider};
use crate::types::Domain;

/// State for the command endpoint.
///
/// One shared [`SessionContext`]: the herald serves a single household
/// conversation, so the sticky station context is process-wide.
pub struct CommandState<TP, BP> {
    router: Arc<CommandRouter<TP, BP>>,
    session: Arc<Mutex<SessionContext>>,
}

impl<TP, BP> Clone for CommandState<TP, BP> {
    fn clone(&self) -> Self {
        CommandState {
            router: Arc::clone(&self.router),
            session: Arc::clone(&self.session),
        }
    }
}

impl<TP: TrainBoardProvider, BP: BinScheduleProvider> CommandState<TP, BP> {
    pub fn new(router: CommandRouter<TP, BP>, session: SessionContext) -> Self {
        CommandState {
            router: Arc::new(router),
            session: Arc::new(Mutex::new(session)),
        }
    }
}

/// Builds the `POST /command/{domain}` route.
pub fn command_routes<TP: TrainBoardProvider, BP: BinScheduleProvider>(
    state: CommandState<TP, BP>,
) -> Router {
    Router::new()
        .route("/command/{domain}", post(command_handler))
        .with_state(state)
}

/// Command ingestion handler.
///
/// # Response
///
/// - 200 OK with the reply text for a handled command
/// - 204 No Content when the text is not a command
/// - 400 Bad Request for an unknown domain
async fn command_handler<TP: TrainBoardProvider, BP: BinScheduleProvider>(
    State(state): State<CommandState<TP, BP>>,
    Path(domain): Path<String>,
    body: String,
) -> Result<(StatusCode, String), (StatusCode, String)> {
    let domain = Domain::from_str(&domain)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("unknown domain: {}", e.0)))?;

    let mut session = state.session.lock().await;
    match state.router.handle(domain, &body, &mut session).await {
        Some(reply) => Ok((StatusCode::OK, reply)),
        None => Ok((StatusCode::NO_CONTENT, String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{BinsDriver, BinsState, BudgetDriver, BudgetState, TrainsDriver, TrainsState};
    use crate::provider::UnconfiguredProvider;
    use crate::store::{SharedStore, record_path};
    use crate::types::Pence;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn test_routes(dir: &std::path::Path) -> Router {
        let budget = BudgetDriver::new(SharedStore::load_or_default(
            record_path(dir, "budget"),
            BudgetState::new(Utc::now(), Pence(100)),
        ));
        let bins = BinsDriver::new(
            SharedStore::load_or_default(record_path(dir, "bins"), BinsState::new()),
            UnconfiguredProvider,
            Duration::from_secs(3600),
        );
        let trains = TrainsDriver::new(
            SharedStore::load_or_default(record_path(dir, "trains"), TrainsState::new()),
            UnconfiguredProvider,
            Duration::from_secs(120),
        );
        let router = CommandRouter::new(budget, bins, trains, HashMap::new());
        command_routes(CommandState::new(router, SessionContext::default()))
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn command_gets_a_reply() {
        let dir = tempdir().unwrap();
        let app = test_routes(dir.path());

        let response = app.oneshot(post("/command/budget", "/balance")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("£0.00"));
    }

    #[tokio::test]
    async fn chat_text_gets_no_content() {
        let dir = tempdir().unwrap();
        let app = test_routes(dir.path());

        let response = app
            .oneshot(post("/command/budget", "hello everyone"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unknown_domain_is_400() {
        let dir = tempdir().unwrap();
        let app = test_routes(dir.path());

        let response = app.oneshot(post("/command/weather", "/usage")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn watch_without_station_reports_missing_context() {
        let dir = tempdir().unwrap();
        let app = test_routes(dir.path());

        // No station has entered the session yet, so a bare watch fails.
        let response = app
            .oneshot(post("/command/trains", "/watch 17:45"))
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("no station in context"));
    }
}
