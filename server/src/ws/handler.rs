use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::gate::{GateError, Identity};
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
/// Auth is via query param ?token=JWT since browsers cannot set headers on upgrade.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// WebSocket close codes sent when the credential gate rejects a connection.
pub const CLOSE_MISSING_CREDENTIAL: u16 = 4000;
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
pub const CLOSE_TOKEN_INVALID: u16 = 4002;
pub const CLOSE_INACTIVE_ACCOUNT: u16 = 4003;
pub const CLOSE_UNKNOWN_SUBJECT: u16 = 4004;
/// Gate could not reach the user directory.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

fn close_reason(err: &GateError) -> (u16, &'static str) {
    match err {
        GateError::MissingCredential => (CLOSE_MISSING_CREDENTIAL, "Token not provided"),
        GateError::ExpiredCredential => (CLOSE_TOKEN_EXPIRED, "Token expired"),
        GateError::InvalidCredential => (CLOSE_TOKEN_INVALID, "Token invalid"),
        GateError::InactiveAccount => (CLOSE_INACTIVE_ACCOUNT, "Account inactive"),
        GateError::UnknownSubject => (CLOSE_UNKNOWN_SUBJECT, "User not found"),
        GateError::Directory(_) => (CLOSE_INTERNAL_ERROR, "Authentication unavailable"),
    }
}

/// GET /ws?token=JWT
/// WebSocket upgrade endpoint. Runs the credential gate before upgrading.
/// On rejection, upgrades then immediately closes with the matching close code.
/// On success, spawns an actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match state.gate.admit(params.token.as_deref()).await {
        Ok(identity) => {
            tracing::info!(
                user_id = %identity.user_id,
                role = identity.role.as_str(),
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| handle_authenticated(socket, state, identity))
        }
        Err(err) => {
            let (close_code, reason) = close_reason(&err);

            tracing::warn!(
                close_code = close_code,
                error = %err,
                "WebSocket auth failed"
            );

            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: close_code,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}

/// Handle an authenticated WebSocket connection by running the actor.
async fn handle_authenticated(socket: WebSocket, state: AppState, identity: Identity) {
    actor::run_connection(socket, state, identity).await;
}
