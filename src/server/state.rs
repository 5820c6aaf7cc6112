//! State inspection endpoint for observability.
//!
//! Provides a read-only view of a domain's persisted record for debugging
//! and monitoring. The response is the raw JSON record; no schema check is
//! applied, so this endpoint stays useful even when a record is from an
//! older build.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io;
use std::str::FromStr;
use thiserror::Error;

use super::AppState;
use crate::types::Domain;

/// Errors that can occur when fetching state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The path segment names no known domain. Parsing through [`Domain`]
    /// also rules out path traversal: only the three fixed stems ever
    /// reach the filesystem.
    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    /// No record exists yet for this domain.
    #[error("no state recorded for domain: {0}")]
    NotFound(Domain),

    /// IO error reading state.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The record on disk is not valid JSON.
    #[error("malformed state record: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl IntoResponse for StateError {
    fn into_response(self) -> Response {
        let status = match &self {
            StateError::UnknownDomain(_) => StatusCode::BAD_REQUEST,
            StateError::NotFound(_) => StatusCode::NOT_FOUND,
            StateError::Io(_) | StateError::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// State inspection handler.
///
/// # Path Parameters
///
/// - `domain` - one of `budget`, `bins`, `trains`
///
/// # Response
///
/// - 200 OK with the domain's persisted record as JSON
/// - 400 Bad Request for an unknown domain
/// - 404 Not Found if the domain has no record yet
/// - 500 Internal Server Error for IO or malformed records
pub async fn state_handler(
    State(app_state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<serde_json::Value>, StateError> {
    let domain = Domain::from_str(&domain).map_err(|e| StateError::UnknownDomain(e.0))?;

    let path = app_state
        .state_dir()
        .join(format!("{}.json", domain.record_stem()));

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StateError::NotFound(domain));
        }
        Err(e) => return Err(e.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    Ok(Json(value))
}
