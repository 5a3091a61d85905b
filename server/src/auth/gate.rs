//! Credential gate: turns a presented bearer token into an [`Identity`].
//!
//! Used once per WebSocket connection (with the last-active touch) and on
//! every authenticated REST request (without it).

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

use crate::auth::jwt;
use crate::db::models::Role;
use crate::db::users::UserDirectory;
use crate::error::StoreError;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("credential not provided")]
    MissingCredential,

    #[error("credential is malformed or has a bad signature")]
    InvalidCredential,

    #[error("credential has expired")]
    ExpiredCredential,

    #[error("credential subject does not exist")]
    UnknownSubject,

    #[error("account is inactive")]
    InactiveAccount,

    #[error("user directory unavailable: {0}")]
    Directory(#[from] StoreError),
}

/// The authenticated caller, fixed for the lifetime of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub struct CredentialGate {
    secret: Vec<u8>,
    users: Arc<dyn UserDirectory>,
}

impl CredentialGate {
    pub fn new(secret: Vec<u8>, users: Arc<dyn UserDirectory>) -> Self {
        Self { secret, users }
    }

    /// Verify the token and resolve its subject to an active user.
    /// The role comes from the user record, not the token.
    pub async fn verify(&self, token: Option<&str>) -> Result<Identity, GateError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(GateError::MissingCredential)?;

        let claims = jwt::validate_access_token(&self.secret, token).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => GateError::ExpiredCredential,
            _ => GateError::InvalidCredential,
        })?;

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or(GateError::UnknownSubject)?;

        if !user.is_active() {
            return Err(GateError::InactiveAccount);
        }

        Ok(Identity {
            user_id: user.id,
            name: user.name,
            role: user.role,
        })
    }

    /// Verify at connection time and record the user as recently active.
    /// A failed touch is logged and otherwise ignored.
    pub async fn admit(&self, token: Option<&str>) -> Result<Identity, GateError> {
        let identity = self.verify(token).await?;

        if let Err(e) = self.users.touch_last_active(&identity.user_id).await {
            tracing::warn!(
                user_id = %identity.user_id,
                error = %e,
                "Failed to update last active timestamp"
            );
        }

        Ok(identity)
    }
}
