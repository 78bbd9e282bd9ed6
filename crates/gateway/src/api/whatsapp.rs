//! WhatsApp session endpoints under `/api/whatsapp`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Json, Response};
use serde::Deserialize;

use wg_sessions::manager::NOT_FOUND;

use super::response;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/whatsapp/session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    #[serde(default)]
    pub company_id: Option<String>,
    /// Defaults to the configured prefix followed by the company id.
    #[serde(default)]
    pub session_name: Option<String>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Response {
    let Some(company_id) = body.company_id.filter(|c| !c.trim().is_empty()) else {
        return response::missing_fields("companyId is required");
    };
    let session_name = match body.session_name.filter(|s| !s.is_empty()) {
        Some(name) => name,
        None => state.sessions.session_name_for(&company_id),
    };

    let permit = match state.session_locks.acquire(&session_name).await {
        Ok(permit) => permit,
        Err(busy) => {
            tracing::warn!(session = %session_name, "rejecting concurrent session creation");
            return response::failure(StatusCode::CONFLICT, busy.to_string(), "session_busy");
        }
    };

    let result = state
        .sessions
        .create_session(&company_id, Some(&session_name))
        .await;
    drop(permit);
    state.session_locks.prune_idle();

    match result {
        Ok(created) => {
            let message = match created.qr_code() {
                Some(_) => "Session created. Scan the QR code to connect.",
                None => "Session created and already authenticated.",
            };
            response::success(
                message,
                serde_json::json!({
                    "sessionName": created.session_name,
                    "qrCode": created.qr_code(),
                }),
            )
        }
        Err(e) => response::session_failure(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/whatsapp/session/:session_name/qrcode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_qr_code(
    State(state): State<AppState>,
    Path(session_name): Path<String>,
) -> Response {
    match state.sessions.qr_code(&session_name) {
        Ok(Some(qr_code)) => response::success(
            "QR code retrieved.",
            serde_json::json!({ "qrCode": qr_code }),
        ),
        // Connected without a stored code: nothing to scan.
        Ok(None) => response::failure(
            StatusCode::NOT_FOUND,
            format!("session {session_name} is already connected; no QR code to scan"),
            "qr_unavailable",
        ),
        Err(e) => response::session_failure(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/whatsapp/session/:session_name/status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_name): Path<String>,
) -> Response {
    let status = state.sessions.session_status(&session_name);
    response::success(
        "Session status retrieved.",
        serde_json::json!({
            "sessionName": session_name,
            "status": status.map_or(NOT_FOUND, |s| s.as_str()),
            "isConnected": state.sessions.is_session_connected(&session_name),
        }),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /api/whatsapp/session/:session_name
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn disconnect_session(
    State(state): State<AppState>,
    Path(session_name): Path<String>,
) -> Response {
    match state.sessions.disconnect_session(&session_name).await {
        Ok(()) => response::success_message(format!("Session {session_name} disconnected.")),
        Err(e) => response::session_failure(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/whatsapp/sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_sessions(State(state): State<AppState>) -> Response {
    response::success(
        "Sessions retrieved.",
        serde_json::json!({
            "sessions": state.sessions.list_sessions(),
            "sessionsWithStatus": state.sessions.list_sessions_with_status(),
        }),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/whatsapp/send-message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessageBody>,
) -> Response {
    let (Some(session_name), Some(phone_number), Some(message)) = (
        body.session_name.filter(|s| !s.is_empty()),
        body.phone_number.filter(|p| !p.is_empty()),
        body.message.filter(|m| !m.is_empty()),
    ) else {
        return response::missing_fields("sessionName, phoneNumber and message are required");
    };

    match state
        .sessions
        .send_message(&session_name, &phone_number, &message)
        .await
    {
        Ok(delivery) => response::success("Message sent.", delivery),
        Err(e) => {
            tracing::warn!(session = %session_name, code = e.code(), error = %e, "send failed");
            response::session_failure(&e)
        }
    }
}
