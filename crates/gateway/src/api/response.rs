//! JSON envelope shared by every WhatsApp route.
//!
//! ```json
//! { "success": false, "message": "...", "error": "not_connected" }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use wg_sessions::SessionError;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Machine-readable failure code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 200 with a payload.
pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    let body = Envelope {
        success: true,
        message: message.into(),
        data: Some(data),
        error: None,
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// 200 without a payload.
pub fn success_message(message: impl Into<String>) -> Response {
    let body: Envelope<()> = Envelope {
        success: true,
        message: message.into(),
        data: None,
        error: None,
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn failure(status: StatusCode, message: impl Into<String>, error_code: &str) -> Response {
    let body: Envelope<()> = Envelope {
        success: false,
        message: message.into(),
        data: None,
        error: Some(error_code.to_owned()),
    };
    (status, Json(body)).into_response()
}

/// 400 for a request body missing required fields.
pub fn missing_fields(message: &str) -> Response {
    failure(StatusCode::BAD_REQUEST, message, "missing_fields")
}

pub fn session_failure(err: &SessionError) -> Response {
    failure(status_for(err), err.to_string(), err.code())
}

/// HTTP status for each session failure.
pub fn status_for(err: &SessionError) -> StatusCode {
    match err {
        SessionError::InvalidPhoneNumber { .. } => StatusCode::BAD_REQUEST,
        SessionError::QrUnavailable(_) => StatusCode::NOT_FOUND,
        SessionError::AlreadyConnected(_)
        | SessionError::MustRepair(_)
        | SessionError::Desynchronized(_)
        | SessionError::AttachPending(_)
        | SessionError::NotConnected { .. } => StatusCode::CONFLICT,
        SessionError::RecoveryTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SessionError::Creation { .. }
        | SessionError::RecoveryFailed { .. }
        | SessionError::SendFailure(_)
        | SessionError::LogoutFailure { .. } => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_omits_data() {
        let body: Envelope<()> = Envelope {
            success: false,
            message: "nope".into(),
            data: None,
            error: Some("not_connected".into()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "nope", "error": "not_connected" })
        );
    }

    #[test]
    fn caller_errors_are_4xx() {
        let bad_phone = SessionError::InvalidPhoneNumber {
            digits: 8,
            expected: "country code + area code + number".into(),
        };
        assert_eq!(status_for(&bad_phone), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&SessionError::Desynchronized("company_1".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SessionError::AttachPending("company_1".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SessionError::QrUnavailable("company_1".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn driver_errors_are_5xx() {
        let timeout = SessionError::RecoveryTimeout {
            session: "company_1".into(),
            timeout_ms: 10_000,
        };
        assert_eq!(status_for(&timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(&SessionError::SendFailure("socket closed".into())),
            StatusCode::BAD_GATEWAY
        );
    }
}
