pub mod auth;
pub mod health;
pub mod response;
pub mod whatsapp;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// `/health` is public; everything under `/api/whatsapp` sits behind the
/// bearer-token middleware.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health::health));

    let protected = Router::new()
        .route("/api/whatsapp/session", post(whatsapp::create_session))
        .route(
            "/api/whatsapp/session/:session_name",
            delete(whatsapp::disconnect_session),
        )
        .route(
            "/api/whatsapp/session/:session_name/qrcode",
            get(whatsapp::get_qr_code),
        )
        .route(
            "/api/whatsapp/session/:session_name/status",
            get(whatsapp::get_session_status),
        )
        .route("/api/whatsapp/sessions", get(whatsapp::list_sessions))
        .route("/api/whatsapp/send-message", post(whatsapp::send_message))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}
