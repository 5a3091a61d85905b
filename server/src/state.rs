use std::sync::Arc;

use crate::auth::gate::CredentialGate;
use crate::config::{NotificationsConfig, RealtimeConfig};
use crate::db::users::{SqliteUserDirectory, UserDirectory};
use crate::db::DbPool;
use crate::notifications::dispatcher::Dispatcher;
use crate::notifications::store::{NotificationStore, SqliteNotificationStore};
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Active WebSocket connections per user
    pub connections: ConnectionRegistry,
    /// Token verification for REST requests and WebSocket upgrades
    pub gate: Arc<CredentialGate>,
    pub notifications: Arc<dyn NotificationStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub limits: NotificationsConfig,
    pub realtime: RealtimeConfig,
}

impl AppState {
    /// Wire the SQLite-backed store and directory to a fresh connection registry.
    pub fn new(
        db: DbPool,
        jwt_secret: Vec<u8>,
        limits: NotificationsConfig,
        realtime: RealtimeConfig,
    ) -> Self {
        let users: Arc<dyn UserDirectory> = Arc::new(SqliteUserDirectory::new(db.clone()));
        let notifications: Arc<dyn NotificationStore> =
            Arc::new(SqliteNotificationStore::new(db));
        let connections = ConnectionRegistry::new();

        let gate = Arc::new(CredentialGate::new(jwt_secret, users.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            notifications.clone(),
            users,
            connections.clone(),
        ));

        Self {
            connections,
            gate,
            notifications,
            dispatcher,
            limits,
            realtime,
        }
    }
}
