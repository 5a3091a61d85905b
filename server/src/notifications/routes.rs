//! REST handlers for notifications.
//!
//! User routes read and update the caller's own notifications; admin routes
//! send notifications and list recent campaigns.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::{AdminUser, AuthUser};
use crate::db::models::{Notification, NotificationKind, Role};
use crate::db::users::UserQuery;
use crate::error::ApiError;
use crate::notifications::dispatcher::DeliveryResult;
use crate::notifications::{NotificationTemplate, TargetSpec};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub message: &'static str,
    pub notification: Notification,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub message: &'static str,
    pub modified_count: u64,
}

/// GET /api/notifications?limit=N: Caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = state.limits.list_limit(query.limit);
    let notifications = state
        .notifications
        .find_by_user(&identity.user_id, limit)
        .await?;
    Ok(Json(notifications))
}

/// GET /api/notifications/public?limit=N: Recent public notifications.
pub async fn list_public_notifications(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = state.limits.list_limit(query.limit);
    Ok(Json(state.notifications.find_public(limit).await?))
}

/// GET /api/notifications/unread-count: `{ "count": n }` for the caller.
pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.notifications.count_unread(&identity.user_id).await?;
    Ok(Json(CountResponse { count }))
}

/// PUT /api/notifications/{id}/read: Mark one of the caller's notifications read.
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let notification = state
        .notifications
        .mark_read(&notification_id, &identity.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

    Ok(Json(MarkReadResponse {
        message: "Notification marked as read",
        notification,
    }))
}

/// PUT /api/notifications/mark-all-read: Mark all of the caller's notifications read.
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let modified_count = state.notifications.mark_all_read(&identity.user_id).await?;
    Ok(Json(MarkAllReadResponse {
        message: "All notifications marked as read",
        modified_count,
    }))
}

/// Targeting mode of a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    All,
    Role,
    Specific,
    Conditions,
    Single,
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub image: Option<String>,
    pub link: Option<String>,
    pub target: TargetMode,
    pub role: Option<Role>,
    pub users: Option<Vec<String>>,
    /// Decoded in [`SendNotificationRequest::target_spec`] so a bad predicate is a 400
    pub conditions: Option<serde_json::Value>,
    /// Recipient for `single`; omitted means a public notification
    pub user: Option<String>,
}

impl SendNotificationRequest {
    fn template(&self) -> NotificationTemplate {
        NotificationTemplate {
            kind: self.kind,
            title: self.title.clone(),
            message: self.message.clone(),
            image: self.image.clone(),
            link: self.link.clone(),
        }
    }

    fn target_spec(&self) -> Result<TargetSpec, ApiError> {
        let invalid = || ApiError::BadRequest("Invalid target parameters".to_string());
        match self.target {
            TargetMode::All => Ok(TargetSpec::All),
            TargetMode::Role => self.role.map(TargetSpec::Role).ok_or_else(invalid),
            TargetMode::Specific => match &self.users {
                Some(users) if !users.is_empty() => Ok(TargetSpec::Specific(users.clone())),
                _ => Err(invalid()),
            },
            TargetMode::Conditions => {
                let query = self
                    .conditions
                    .clone()
                    .map(serde_json::from_value::<UserQuery>)
                    .and_then(Result::ok)
                    .filter(|query| !query.is_empty())
                    .ok_or_else(invalid)?;
                Ok(TargetSpec::Conditions(query))
            }
            TargetMode::Single => Ok(TargetSpec::Single(self.user.clone())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    pub message: &'static str,
    /// Same as `createdCount`; kept for storefront clients that read `count`
    pub count: usize,
    #[serde(flatten)]
    pub result: DeliveryResult,
}

/// POST /api/notifications/send: Admin only. Dispatch a notification to a target.
pub async fn send_notification(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<SendNotificationResponse>), ApiError> {
    let template = body.template();
    template.validate().map_err(ApiError::BadRequest)?;
    let target = body.target_spec()?;

    tracing::info!(
        admin_id = %admin.user_id,
        mode = target.mode(),
        "Admin sending notification"
    );

    let result = state.dispatcher.dispatch(template, &target).await?;
    let message = if result.created_count == 0 {
        "No matching users, nothing sent"
    } else {
        "Notification sent successfully"
    };

    Ok((
        StatusCode::CREATED,
        Json(SendNotificationResponse {
            message,
            count: result.created_count,
            result,
        }),
    ))
}

/// GET /api/notifications/admin/recent?limit=N: Admin only. Recent distinct campaigns.
pub async fn recent_admin_notifications(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = state.limits.recent_limit(query.limit);
    Ok(Json(state.notifications.recent_distinct_broadcasts(limit).await?))
}
