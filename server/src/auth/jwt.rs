use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;
use crate::db::models::Role;

const SECRET_LEN: usize = 32;

/// Read the HS256 signing secret from `data_dir/jwt_secret`, creating it on
/// first boot. A file of the wrong length is replaced.
pub fn load_or_generate_jwt_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let key_path = Path::new(data_dir).join("jwt_secret");

    match std::fs::read(&key_path) {
        Ok(key) if key.len() == SECRET_LEN => {
            tracing::info!(path = %key_path.display(), "JWT signing key loaded");
            return Ok(key);
        }
        Ok(key) => {
            tracing::warn!(
                path = %key_path.display(),
                len = key.len(),
                "JWT signing key has wrong size, regenerating"
            );
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let key: [u8; SECRET_LEN] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!(path = %key_path.display(), "JWT signing key generated");
    Ok(key.to_vec())
}

/// Issue an HS256 access token for a user.
/// Claims: sub=user_id, role, iat, exp
pub fn issue_access_token(
    secret: &[u8],
    user_id: &str,
    role: Role,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: now,
        exp: now + ttl.num_seconds(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Validate an access token and return its claims.
pub fn validate_access_token(
    secret: &[u8],
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}
