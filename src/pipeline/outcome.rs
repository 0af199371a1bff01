//! Terminal result of one handler chain.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::envelope::{codes, BizError, Envelope};

/// What a handler chain produced.
///
/// Adapted business handlers always produce an envelope; raw handlers hand
/// back whatever response they built.
#[derive(Debug)]
pub enum Outcome {
    Envelope { status: StatusCode, envelope: Envelope },
    Raw(Response),
}

impl Outcome {
    pub fn envelope(status: StatusCode, envelope: Envelope) -> Self {
        Outcome::Envelope { status, envelope }
    }

    /// 400 with the bad-request code.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::envelope(
            StatusCode::BAD_REQUEST,
            BizError::new(codes::BAD_REQUEST, message).render(None),
        )
    }

    /// 500 with the invalid-error code. Never carries data.
    pub fn invalid_error() -> Self {
        Self::envelope(
            StatusCode::INTERNAL_SERVER_ERROR,
            BizError::new(codes::INVALID_ERROR, "business returned an invalid error").render(None),
        )
    }

    /// 500 with the server-fault code. Never carries data.
    pub fn server_fault() -> Self {
        Self::envelope(
            StatusCode::INTERNAL_SERVER_ERROR,
            BizError::new(codes::SERVER_PANIC, "caught a panic in business logic").render(None),
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Envelope { status, .. } => *status,
            Outcome::Raw(response) => response.status(),
        }
    }

    /// Envelope code, if this outcome carries an envelope.
    pub fn code(&self) -> Option<i64> {
        match self {
            Outcome::Envelope { envelope, .. } => Some(envelope.err),
            Outcome::Raw(_) => None,
        }
    }

    /// Whether this outcome counts against the route's failure counter.
    ///
    /// Envelopes fail on a non-zero code; raw responses fail on 4xx/5xx.
    pub fn is_failure(&self) -> bool {
        match self {
            Outcome::Envelope { envelope, .. } => !envelope.is_success(),
            Outcome::Raw(response) => {
                response.status().is_client_error() || response.status().is_server_error()
            }
        }
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Outcome::Raw(response)
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Envelope { status, envelope } => (status, Json(envelope)).into_response(),
            Outcome::Raw(response) => response,
        }
    }
}
