//! Delivery dispatcher: persist one record per recipient, then push it to
//! the recipient's live connections.
//!
//! Targets are processed concurrently and independently. A failed write is
//! logged and counted but never stops the rest of the batch; a failed push
//! never undoes a write.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::NotificationKind;
use crate::db::users::UserDirectory;
use crate::error::StoreError;
use crate::notifications::audience::{Audience, AudienceResolver};
use crate::notifications::store::{NewNotification, NotificationStore};
use crate::notifications::{NotificationTemplate, TargetSpec};
use crate::ws::broadcast::{broadcast_to_all, send_to_user};
use crate::ws::protocol::{Channel, ServerEvent};
use crate::ws::ConnectionRegistry;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidTemplate(String),

    #[error("failed to resolve audience: {0}")]
    Directory(#[from] StoreError),
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    /// Records written
    pub created_count: usize,
    /// Recipients that had at least one live connection reached
    pub pushed_count: usize,
    /// Recipients whose record could not be written
    pub failed_count: usize,
    pub batch_id: String,
}

enum TargetOutcome {
    Created { pushed: bool },
    Failed,
}

pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    resolver: AudienceResolver,
    registry: ConnectionRegistry,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        users: Arc<dyn UserDirectory>,
        registry: ConnectionRegistry,
    ) -> Self {
        Self {
            store,
            resolver: AudienceResolver::new(users),
            registry,
        }
    }

    pub async fn dispatch(
        &self,
        template: NotificationTemplate,
        target: &TargetSpec,
    ) -> Result<DeliveryResult, DispatchError> {
        template.validate().map_err(DispatchError::InvalidTemplate)?;

        let audience = self.resolver.resolve(target).await?;
        let batch_id = Uuid::now_v7().to_string();

        let result = match audience {
            Audience::Public => self.deliver_public(template, batch_id).await,
            Audience::Users(user_ids) => self.deliver_to_users(&template, user_ids, batch_id).await,
        };

        if result.failed_count > 0 {
            tracing::warn!(
                mode = target.mode(),
                batch_id = %result.batch_id,
                created = result.created_count,
                failed = result.failed_count,
                "Notification dispatch partially failed"
            );
        } else {
            tracing::info!(
                mode = target.mode(),
                batch_id = %result.batch_id,
                created = result.created_count,
                pushed = result.pushed_count,
                "Notification dispatched"
            );
        }

        Ok(result)
    }

    /// Send a notification to one user; inactive or unknown users get nothing.
    /// Entry point for the storefront's order flow (status changes, shipping).
    pub async fn notify_user(
        &self,
        template: NotificationTemplate,
        user_id: &str,
    ) -> Result<DeliveryResult, DispatchError> {
        self.dispatch(template, &TargetSpec::user(user_id)).await
    }

    /// Public "New Product Added" notification for a newly listed product.
    /// Entry point for the storefront's product catalogue when a product is created.
    pub async fn announce_product(
        &self,
        product_name: &str,
        product_id: &str,
        image: Option<String>,
    ) -> Result<DeliveryResult, DispatchError> {
        let mut template = NotificationTemplate::new(
            NotificationKind::Product,
            "New Product Added",
            format!("{} has been added to our store!", product_name),
        )
        .with_link(format!("/product-detail.html?id={}", product_id));
        if let Some(image) = image {
            template = template.with_image(image);
        }

        self.dispatch(template, &TargetSpec::public()).await
    }

    async fn deliver_public(&self, template: NotificationTemplate, batch_id: String) -> DeliveryResult {
        let new = NewNotification {
            template,
            user: None,
            batch_id: Some(batch_id.clone()),
        };

        match self.store.create(new).await {
            Ok(notification) => {
                let reached = broadcast_to_all(
                    &self.registry,
                    &ServerEvent::notification(Channel::Public, &notification),
                );
                tracing::debug!(
                    notification_id = %notification.id,
                    connections = reached,
                    "Public notification pushed"
                );
                DeliveryResult {
                    created_count: 1,
                    pushed_count: usize::from(reached > 0),
                    failed_count: 0,
                    batch_id,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to store public notification");
                DeliveryResult {
                    failed_count: 1,
                    batch_id,
                    ..DeliveryResult::default()
                }
            }
        }
    }

    async fn deliver_to_users(
        &self,
        template: &NotificationTemplate,
        user_ids: Vec<String>,
        batch_id: String,
    ) -> DeliveryResult {
        let outcomes = join_all(
            user_ids
                .into_iter()
                .map(|user_id| self.deliver_to_user(template, user_id, &batch_id)),
        )
        .await;

        let mut result = DeliveryResult {
            batch_id,
            ..DeliveryResult::default()
        };
        for outcome in outcomes {
            match outcome {
                TargetOutcome::Created { pushed } => {
                    result.created_count += 1;
                    if pushed {
                        result.pushed_count += 1;
                    }
                }
                TargetOutcome::Failed => result.failed_count += 1,
            }
        }
        result
    }

    async fn deliver_to_user(
        &self,
        template: &NotificationTemplate,
        user_id: String,
        batch_id: &str,
    ) -> TargetOutcome {
        let new = NewNotification {
            template: template.clone(),
            user: Some(user_id.clone()),
            batch_id: Some(batch_id.to_string()),
        };

        let notification = match self.store.create(new).await {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to store notification");
                return TargetOutcome::Failed;
            }
        };

        // Offline users pick the record up on their next poll
        if !self.registry.is_online(&user_id) {
            return TargetOutcome::Created { pushed: false };
        }

        let reached = send_to_user(
            &self.registry,
            &user_id,
            &ServerEvent::notification(Channel::User, &notification),
        );
        if reached == 0 {
            tracing::debug!(user_id = %user_id, "Push skipped, no open connection accepted it");
        }
        TargetOutcome::Created { pushed: reached > 0 }
    }
}
