//! Notification delivery: audience resolution, durable storage, and
//! fan-out to connected clients.

pub mod audience;
pub mod dispatcher;
pub mod routes;
pub mod store;

use serde::Deserialize;

use crate::db::models::{NotificationKind, Role};
use crate::db::users::UserQuery;

/// Content of a notification before it is addressed to anyone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotificationTemplate {
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub image: Option<String>,
    pub link: Option<String>,
}

impl NotificationTemplate {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            image: None,
            link: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Title and message must contain something other than whitespace.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() || self.message.trim().is_empty() {
            return Err("Type, title and message are required".to_string());
        }
        Ok(())
    }
}

/// Who a notification is addressed to. Every mode excludes inactive users.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSpec {
    All,
    Role(Role),
    Specific(Vec<String>),
    Conditions(UserQuery),
    /// One user, or a public notification when None
    Single(Option<String>),
}

impl TargetSpec {
    pub fn public() -> Self {
        Self::Single(None)
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self::Single(Some(user_id.into()))
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Role(_) => "role",
            Self::Specific(_) => "specific",
            Self::Conditions(_) => "conditions",
            Self::Single(Some(_)) => "single",
            Self::Single(None) => "public",
        }
    }
}
