//! Admin view of real-time presence.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::auth::middleware::AdminUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OnlineCountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct UserPresenceResponse {
    pub user_id: String,
    pub online: bool,
    pub connections: usize,
}

/// GET /api/presence/online-count: Number of distinct users with a live connection.
pub async fn online_count(State(state): State<AppState>, _admin: AdminUser) -> Json<OnlineCountResponse> {
    Json(OnlineCountResponse {
        count: state.connections.online_count(),
    })
}

/// GET /api/presence/{user_id}: Whether one user is online.
pub async fn user_presence(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> Json<UserPresenceResponse> {
    Json(UserPresenceResponse {
        online: state.connections.is_online(&user_id),
        connections: state.connections.connection_count(&user_id),
        user_id,
    })
}
