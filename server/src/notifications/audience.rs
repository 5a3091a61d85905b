use std::sync::Arc;

use crate::db::users::{UserDirectory, UserQuery};
use crate::error::StoreError;
use crate::notifications::TargetSpec;

/// Concrete recipients of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// One record with no owner, pushed on the public channel
    Public,
    /// One record per user id. May be empty when nothing matched.
    Users(Vec<String>),
}

/// Resolves a [`TargetSpec`] into active user ids.
#[derive(Clone)]
pub struct AudienceResolver {
    users: Arc<dyn UserDirectory>,
}

impl AudienceResolver {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// An empty result is not an error: callers report it as nothing sent.
    pub async fn resolve(&self, target: &TargetSpec) -> Result<Audience, StoreError> {
        let users = match target {
            TargetSpec::Single(None) => return Ok(Audience::Public),
            TargetSpec::Single(Some(id)) => {
                self.users.find_active_by_ids(std::slice::from_ref(id)).await?
            }
            TargetSpec::All => self.users.find_active(&UserQuery::default()).await?,
            TargetSpec::Role(role) => self.users.find_active(&UserQuery::role(*role)).await?,
            TargetSpec::Specific(ids) => self.users.find_active_by_ids(ids).await?,
            TargetSpec::Conditions(query) => self.users.find_active(query).await?,
        };

        let ids: Vec<String> = users.into_iter().map(|u| u.id).collect();
        if ids.is_empty() {
            tracing::info!(mode = target.mode(), "No matching users for notification target");
        }
        Ok(Audience::Users(ids))
    }
}
