//! The single place where gate outcomes become HTTP status codes.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use gatehouse_core::GateError;
use gatehouse_types::THEME_UNAVAILABLE;

use crate::NO_STORE;

const BAD_REQUEST: &str = "Bad request";
const FORBIDDEN: &str = "Forbidden";
const INTERNAL: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("blocking task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    fn status_and_body(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Gate(GateError::ThemeUnavailable) => {
                (StatusCode::BAD_REQUEST, THEME_UNAVAILABLE.as_str())
            }
            Self::Gate(GateError::NonLocalAttempt { .. } | GateError::InvalidCredentials(_)) => {
                (StatusCode::BAD_REQUEST, BAD_REQUEST)
            }
            Self::Gate(GateError::Forbidden(_)) => (StatusCode::FORBIDDEN, FORBIDDEN),
            Self::Gate(
                GateError::HostResolution(_)
                | GateError::Store(_)
                | GateError::Creation(_)
                | GateError::Theme(_),
            )
            | Self::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(error = %self, source = ?std::error::Error::source(&self), "Welcome request failed");
        } else {
            tracing::debug!(error = %self, %status, "Welcome request refused");
        }
        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, NO_STORE),
            ],
            body,
        )
            .into_response()
    }
}
