//! User lookups consumed by the credential gate and the audience resolver.
//!
//! The storefront owns user accounts; this module only reads them (plus the
//! best-effort `last_active` touch and account creation for bootstrap).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::{Role, User, UserStatus};
use crate::db::{format_timestamp, now_timestamp, with_conn, DbPool};
use crate::error::StoreError;

/// Predicate over user records. Every supplied field must match.
/// `status = active` is always implied by the directory queries.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserQuery {
    pub role: Option<Role>,
    /// Case-insensitive substring of the display name
    pub name_contains: Option<String>,
    /// Domain part of the email address, without the `@`
    pub email_domain: Option<String>,
    /// Users seen on a real-time connection at or after this time.
    /// Times are RFC 3339 with any offset and are compared in UTC.
    pub active_since: Option<DateTime<Utc>>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl UserQuery {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Build the WHERE clause (always restricted to active users) and its
    /// positional parameters.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = vec!["status = 'active'".to_string()];
        let mut values: Vec<Value> = Vec::new();

        if let Some(role) = self.role {
            values.push(Value::Text(role.as_str().to_string()));
            clauses.push(format!("role = ?{}", values.len()));
        }
        if let Some(name) = &self.name_contains {
            values.push(Value::Text(format!("%{}%", escape_like(&name.to_lowercase()))));
            clauses.push(format!("lower(name) LIKE ?{} ESCAPE '\\'", values.len()));
        }
        if let Some(domain) = &self.email_domain {
            let domain = domain.trim_start_matches('@').to_lowercase();
            values.push(Value::Text(format!("%@{}", escape_like(&domain))));
            clauses.push(format!("lower(email) LIKE ?{} ESCAPE '\\'", values.len()));
        }
        if let Some(since) = self.active_since {
            values.push(Value::Text(format_timestamp(since)));
            clauses.push(format!("last_active >= ?{}", values.len()));
        }
        if let Some(after) = self.created_after {
            values.push(Value::Text(format_timestamp(after)));
            clauses.push(format!("created_at > ?{}", values.len()));
        }
        if let Some(before) = self.created_before {
            values.push(Value::Text(format_timestamp(before)));
            clauses.push(format!("created_at < ?{}", values.len()));
        }

        (clauses.join(" AND "), values)
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Read access to user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Active users matching the query, oldest account first.
    async fn find_active(&self, query: &UserQuery) -> Result<Vec<User>, StoreError>;

    /// The subset of `ids` that exist and are active. Duplicates collapse.
    async fn find_active_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StoreError>;

    async fn touch_last_active(&self, id: &str) -> Result<(), StoreError>;
}

/// [`UserDirectory`] backed by the `users` table.
#[derive(Clone)]
pub struct SqliteUserDirectory {
    db: DbPool,
}

impl SqliteUserDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str = "id, name, email, role, status, last_active, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    let status: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: Role::from_str(&role).unwrap_or(Role::User),
        // Unknown status values are treated as inactive
        status: UserStatus::from_str(&status).unwrap_or(UserStatus::Inactive),
        last_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let id = id.to_string();
        with_conn(&self.db, move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
        })
        .await
    }

    async fn find_active(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
        let (where_clause, values) = query.to_sql();
        with_conn(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE {where_clause} ORDER BY created_at, id"
            ))?;
            let users = stmt
                .query_map(params_from_iter(values), user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }

    async fn find_active_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StoreError> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        with_conn(&self.db, move |conn| {
            let placeholders = (1..=ids.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE status = 'active' AND id IN ({placeholders})
                 ORDER BY created_at, id"
            ))?;
            let users = stmt
                .query_map(params_from_iter(ids.iter()), user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }

    async fn touch_last_active(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        with_conn(&self.db, move |conn| {
            conn.execute(
                "UPDATE users SET last_active = ?1 WHERE id = ?2",
                params![now_timestamp(), id],
            )?;
            Ok(())
        })
        .await
    }
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
}

/// Insert a user row. Used by `--create-admin` and by tests.
pub fn create_user(db: &DbPool, new: NewUser) -> Result<User, StoreError> {
    let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
    insert_user(&conn, new)
}

fn insert_user(conn: &Connection, new: NewUser) -> Result<User, StoreError> {
    let user = User {
        id: Uuid::now_v7().to_string(),
        name: new.name,
        email: new.email,
        role: new.role,
        status: new.status,
        last_active: None,
        created_at: now_timestamp(),
    };

    conn.execute(
        "INSERT INTO users (id, name, email, role, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.name,
            user.email,
            user.role.as_str(),
            user.status.as_str(),
            user.created_at
        ],
    )?;

    Ok(user)
}

/// Change a user's activity status. Returns false if the user does not exist.
pub fn set_user_status(db: &DbPool, user_id: &str, status: UserStatus) -> Result<bool, StoreError> {
    let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
    let changed = conn.execute(
        "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_timestamp(), user_id],
    )?;
    Ok(changed > 0)
}
