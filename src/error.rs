//! Gateway error taxonomy and its HTTP rendering.

use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;
use crate::http::client::TransportError;
use crate::negotiation::NegotiationError;

pub type Result<T> = std::result::Result<T, GatewayError>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Generic error code for failures that do not come from the engine.
pub const GENERIC_ERROR_CODE: i32 = 1;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{message}")]
    ClientInput {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("command {0:?} is not registered")]
    NotFound(String),

    #[error("command {0:?} is heavy and the engine is overloaded")]
    AdmissionRejected(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn client_input(message: impl Into<String>) -> Self {
        Self::ClientInput {
            message: message.into(),
            source: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ClientInput { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AdmissionRejected(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Engine(e) => e.status_code(),
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Engine(e) => e.code,
            _ => GENERIC_ERROR_CODE,
        }
    }

    /// Structured body with the source chain as nested inner errors.
    pub fn to_body(&self) -> ErrorBody {
        let mut body = ErrorBody::new(self.code(), self.to_string());
        body.push_cause(self.source());
        body
    }
}

impl From<NegotiationError> for GatewayError {
    fn from(err: NegotiationError) -> Self {
        Self::ClientInput {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Wire form of an error.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub inner_errors: Vec<ErrorBody>,
}

impl ErrorBody {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            attributes: serde_json::Map::new(),
            inner_errors: Vec::new(),
        }
    }

    fn from_chain(err: &(dyn StdError + 'static)) -> Self {
        let mut body = Self::new(GENERIC_ERROR_CODE, err.to_string());
        body.push_cause(err.source());
        body
    }

    // Wrappers that only repeat their cause's message are skipped.
    fn push_cause(&mut self, mut cause: Option<&(dyn StdError + 'static)>) {
        while let Some(err) = cause {
            if err.to_string() != self.message {
                self.inner_errors.push(Self::from_chain(err));
                return;
            }
            cause = err.source();
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    #[test]
    fn statuses() {
        assert_eq!(GatewayError::client_input("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::AdmissionRejected("read".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::from(EngineError::new(409, "conflict")).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn negotiation_errors_keep_their_causes() {
        let cause = Format::parse("{{{").unwrap_err();
        let err = GatewayError::from(NegotiationError::MalformedFormat {
            header: "x-yt-input-format",
            source: cause,
        });

        let body = err.to_body();
        assert_eq!(body.message, "unable to parse x-yt-input-format header");
        assert_eq!(body.inner_errors.len(), 1);
        assert!(body.inner_errors[0].message.starts_with("malformed format specification"));
        assert!(!body.inner_errors[0].inner_errors.is_empty());
    }

    #[test]
    fn engine_errors_carry_engine_code() {
        let body = GatewayError::from(EngineError::new(500, "boom").with_code(1702)).to_body();
        assert_eq!(body.code, 1702);
        assert_eq!(body.message, "boom");
        assert!(body.inner_errors.is_empty());
    }
}
