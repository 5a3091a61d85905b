use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::notifications::routes as notification_routes;
use crate::presence;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting on WebSocket upgrades: 10 per minute per IP with a burst of 10.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let ws_governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(6) // 1 token every 6 seconds = 10 per minute
            .burst_size(10)
            .finish()
            .expect("Failed to build governor config"),
    );
    let ws_limiter = ws_governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            ws_limiter.retain_recent();
        }
    });

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .layer(GovernorLayer {
            config: ws_governor_config,
        });

    // Authenticated user routes (AuthUser extractor runs the credential gate).
    // Note: static segments like /unread-count are matched before /{id}.
    let notification_user_routes = Router::new()
        .route("/api/notifications", get(notification_routes::list_notifications))
        .route(
            "/api/notifications/unread-count",
            get(notification_routes::unread_count),
        )
        .route(
            "/api/notifications/public",
            get(notification_routes::list_public_notifications),
        )
        .route(
            "/api/notifications/mark-all-read",
            put(notification_routes::mark_all_read),
        )
        .route(
            "/api/notifications/{id}/read",
            put(notification_routes::mark_read),
        );

    // Admin routes (AdminUser extractor rejects non-admins with 403)
    let admin_routes = Router::new()
        .route(
            "/api/notifications/send",
            post(notification_routes::send_notification),
        )
        .route(
            "/api/notifications/admin/recent",
            get(notification_routes::recent_admin_notifications),
        )
        .route("/api/presence/online-count", get(presence::online_count))
        .route("/api/presence/{user_id}", get(presence::user_presence));

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(notification_user_routes)
        .merge(admin_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
