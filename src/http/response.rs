//! Response helpers shared by the handlers.
//!
//! # Responsibilities
//! - Render panics caught at the router boundary as structured 500s
//! - Build the redirects and plain-text replies of the utility endpoints

use std::any::Any;

use axum::body::Body;
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{ErrorBody, GENERIC_ERROR_CODE};

/// `CatchPanicLayer` handler: the process keeps serving, the client gets a 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");

    let mut body = ErrorBody::new(GENERIC_ERROR_CODE, "Internal error while processing request");
    body.inner_errors.push(ErrorBody::new(GENERIC_ERROR_CODE, detail));
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Redirect with an explicit status (302 and 303 are both used).
pub fn redirect(status: StatusCode, location: &str) -> Response<Body> {
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!(location, "Invalid redirect location");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Plain-text body readable from any origin.
pub fn public_text(text: &'static str) -> Response<Body> {
    (
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        ],
        text,
    )
        .into_response()
}
