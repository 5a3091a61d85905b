//! Durable notification records.
//!
//! Ownership is enforced in SQL: every per-user query and update is scoped
//! by `user_id`, so a caller can only read or mark their own records.
//! Public notifications (`user_id IS NULL`) are not returned by the
//! per-user queries; clients fetch them through [`NotificationStore::find_public`].

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::models::{Notification, NotificationKind};
use crate::db::{now_timestamp, with_conn, DbPool};
use crate::error::StoreError;
use crate::notifications::NotificationTemplate;

/// A notification about to be written. `user = None` makes it public.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub template: NotificationTemplate,
    pub user: Option<String>,
    pub batch_id: Option<String>,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a notification, assigning its id and creation time.
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError>;

    /// The user's own notifications, newest first.
    async fn find_by_user(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>, StoreError>;

    /// Public notifications, newest first.
    async fn find_public(&self, limit: u32) -> Result<Vec<Notification>, StoreError>;

    async fn count_unread(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Mark one notification read. None unless it exists and belongs to `user_id`.
    async fn mark_read(&self, id: &str, user_id: &str) -> Result<Option<Notification>, StoreError>;

    /// Mark every unread notification owned by `user_id`; returns how many changed.
    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Newest record of each distinct (title, message, type), newest first.
    async fn recent_distinct_broadcasts(&self, limit: u32) -> Result<Vec<Notification>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteNotificationStore {
    db: DbPool,
}

impl SqliteNotificationStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, kind, title, message, image, link, is_read, user_id, batch_id, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(1)?;
    Ok(Notification {
        id: row.get(0)?,
        kind: NotificationKind::from_str(&kind).unwrap_or_default(),
        title: row.get(2)?,
        message: row.get(3)?,
        image: row.get(4)?,
        link: row.get(5)?,
        is_read: row.get(6)?,
        user: row.get(7)?,
        batch_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[async_trait]
impl NotificationStore for SqliteNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let notification = Notification {
            id: Uuid::now_v7().to_string(),
            kind: new.template.kind,
            title: new.template.title,
            message: new.template.message,
            image: new.template.image,
            link: new.template.link,
            is_read: false,
            user: new.user,
            batch_id: new.batch_id,
            created_at: now_timestamp(),
        };

        with_conn(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO notifications
                    (id, kind, title, message, image, link, is_read, user_id, batch_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9)",
                params![
                    notification.id,
                    notification.kind.as_str(),
                    notification.title,
                    notification.message,
                    notification.image,
                    notification.link,
                    notification.user,
                    notification.batch_id,
                    notification.created_at,
                ],
            )?;
            Ok(notification)
        })
        .await
    }

    async fn find_by_user(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>, StoreError> {
        let user_id = user_id.to_string();
        with_conn(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![user_id, limit], notification_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn find_public(&self, limit: u32) -> Result<Vec<Notification>, StoreError> {
        with_conn(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id IS NULL
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit], notification_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn count_unread(&self, user_id: &str) -> Result<u64, StoreError> {
        let user_id = user_id.to_string();
        with_conn(&self.db, move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count as u64)
        })
        .await
    }

    async fn mark_read(&self, id: &str, user_id: &str) -> Result<Option<Notification>, StoreError> {
        let id = id.to_string();
        let user_id = user_id.to_string();
        with_conn(&self.db, move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE notifications SET is_read = 1
                     WHERE id = ?1 AND user_id = ?2
                     RETURNING {NOTIFICATION_COLUMNS}"
                ),
                params![id, user_id],
                notification_from_row,
            )
            .optional()
        })
        .await
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError> {
        let user_id = user_id.to_string();
        with_conn(&self.db, move |conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                params![user_id],
            )?;
            Ok(changed as u64)
        })
        .await
    }

    async fn recent_distinct_broadcasts(&self, limit: u32) -> Result<Vec<Notification>, StoreError> {
        with_conn(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM (
                    SELECT *, ROW_NUMBER() OVER (
                        PARTITION BY title, message, kind
                        ORDER BY created_at DESC, id DESC
                    ) AS rn
                    FROM notifications
                 )
                 WHERE rn = 1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit], notification_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Role, UserStatus};
    use crate::db::users::{create_user, NewUser};

    fn setup() -> (SqliteNotificationStore, String, String) {
        let db = crate::db::init_in_memory().unwrap();
        let mut ids = Vec::new();
        for (name, email) in [("Ada", "ada@example.com"), ("Bo", "bo@example.com")] {
            let user = create_user(
                &db,
                NewUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    role: Role::User,
                    status: UserStatus::Active,
                },
            )
            .unwrap();
            ids.push(user.id);
        }
        let bo = ids.pop().unwrap();
        let ada = ids.pop().unwrap();
        (SqliteNotificationStore::new(db), ada, bo)
    }

    fn owned(user: &str, title: &str) -> NewNotification {
        NewNotification {
            template: NotificationTemplate::new(NotificationKind::Order, title, "Your order shipped"),
            user: Some(user.to_string()),
            batch_id: None,
        }
    }

    fn public(title: &str, message: &str) -> NewNotification {
        NewNotification {
            template: NotificationTemplate::new(NotificationKind::Product, title, message),
            user: None,
            batch_id: None,
        }
    }

    #[tokio::test]
    async fn test_user_without_notifications() {
        let (store, ada, _) = setup();
        assert_eq!(store.count_unread(&ada).await.unwrap(), 0);
        assert!(store.find_by_user(&ada, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_created_notification_is_listed_first_and_unread() {
        let (store, ada, _) = setup();
        store.create(owned(&ada, "First")).await.unwrap();
        let latest = store.create(owned(&ada, "Second")).await.unwrap();

        let listed = store.find_by_user(&ada, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, latest.id);
        assert!(!listed[0].is_read);
        assert_eq!(listed[1].title, "First");
    }

    #[tokio::test]
    async fn test_find_by_user_respects_limit() {
        let (store, ada, _) = setup();
        for i in 0..5 {
            store.create(owned(&ada, &format!("N{}", i))).await.unwrap();
        }
        let listed = store.find_by_user(&ada, 3).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].title, "N4");
    }

    #[tokio::test]
    async fn test_public_notifications_are_not_listed_per_user() {
        let (store, ada, _) = setup();
        let broadcast = store.create(public("Sale", "Everything 10% off")).await.unwrap();
        assert!(broadcast.is_public());

        assert!(store.find_by_user(&ada, 10).await.unwrap().is_empty());
        assert_eq!(store.count_unread(&ada).await.unwrap(), 0);

        let listed = store.find_public(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, broadcast.id);
    }

    #[tokio::test]
    async fn test_mark_read_only_for_owner() {
        let (store, ada, bo) = setup();
        let n = store.create(owned(&ada, "Private")).await.unwrap();

        assert!(store.mark_read(&n.id, &bo).await.unwrap().is_none());
        assert!(!store.find_by_user(&ada, 10).await.unwrap()[0].is_read);

        let updated = store.mark_read(&n.id, &ada).await.unwrap().unwrap();
        assert!(updated.is_read);
        assert_eq!(updated.created_at, n.created_at);
        assert_eq!(store.count_unread(&ada).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id() {
        let (store, ada, _) = setup();
        assert!(store.mark_read("no-such-id", &ada).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_all_read_is_idempotent_and_scoped() {
        let (store, ada, bo) = setup();
        store.create(owned(&ada, "A1")).await.unwrap();
        store.create(owned(&ada, "A2")).await.unwrap();
        store.create(owned(&bo, "B1")).await.unwrap();

        assert_eq!(store.mark_all_read(&ada).await.unwrap(), 2);
        assert_eq!(store.mark_all_read(&ada).await.unwrap(), 0);
        assert_eq!(store.count_unread(&bo).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recent_distinct_broadcasts_groups_by_content() {
        let (store, ada, bo) = setup();
        store.create(owned(&ada, "Shipped")).await.unwrap();
        let newest_shipped = store.create(owned(&bo, "Shipped")).await.unwrap();
        let sale = store.create(public("Sale", "Everything 10% off")).await.unwrap();

        let recent = store.recent_distinct_broadcasts(20).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, sale.id);
        assert_eq!(recent[1].id, newest_shipped.id);

        let capped = store.recent_distinct_broadcasts(1).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, sale.id);
    }

    #[tokio::test]
    async fn test_create_for_unknown_user_fails() {
        let (store, _, _) = setup();
        let result = store.create(owned("no-such-user", "Orphan")).await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }
}
