use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::User;
use crate::services::auth::{
    self, normalize_username, SessionSigner, MIN_PASSWORD_LEN, MIN_USERNAME_LEN,
};
use crate::services::Database;

pub struct AccountHandler {
    db: Arc<Database>,
    signer: SessionSigner,
    allow_password_reset: bool,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn check_password_length(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("Password must be at least 6 characters"));
    }
    Ok(())
}

impl AccountHandler {
    pub fn new(db: Arc<Database>, signer: SessionSigner, allow_password_reset: bool) -> Self {
        Self {
            db,
            signer,
            allow_password_reset,
        }
    }

    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    pub async fn register(&self, username: Option<&str>, password: Option<&str>) -> Result<User, ApiError> {
        let (username, password) = match (non_empty(username), non_empty(password)) {
            (Some(u), Some(p)) => (u, p),
            _ => return Err(ApiError::BadRequest("Username and password are required")),
        };

        let username = normalize_username(username);
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(ApiError::BadRequest("Username must be at least 3 characters"));
        }
        check_password_length(password)?;

        if self.db.get_user_by_username(&username).await?.is_some() {
            return Err(ApiError::Conflict("Username already exists"));
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            password_hash: auth::hash_password(password).await?,
            created_at: Utc::now(),
            password_updated_at: None,
        };

        // Lost a race with a concurrent registration
        if !self.db.create_user(&user).await? {
            return Err(ApiError::Conflict("Username already exists"));
        }

        log::info!("✅ New user registered: {}", user.username);
        Ok(user)
    }

    pub async fn login(&self, username: Option<&str>, password: Option<&str>) -> Result<User, ApiError> {
        let (username, password) = match (non_empty(username), non_empty(password)) {
            (Some(u), Some(p)) => (u, p),
            _ => return Err(ApiError::BadRequest("Username and password are required")),
        };

        let username = normalize_username(username);
        let user = match self.db.get_user_by_username(&username).await? {
            Some(user) => user,
            None => {
                log::warn!("🔒 Login failed, unknown user: {}", username);
                return Err(ApiError::Unauthorized("Invalid username or password"));
            }
        };

        if !auth::verify_password(password, &user.password_hash).await? {
            log::warn!("🔒 Login failed, wrong password for: {}", username);
            return Err(ApiError::Unauthorized("Invalid username or password"));
        }

        log::info!("🔓 User logged in: {}", user.username);
        Ok(user)
    }

    /// Resolves a session token to its user. Bad signatures and deleted users
    /// both yield `None`.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Option<User>, ApiError> {
        let user_id = match token.and_then(|t| self.signer.verify(t)) {
            Some(id) => id,
            None => return Ok(None),
        };

        Ok(self.db.get_user(user_id).await?)
    }

    pub async fn change_password(&self, user: &User, new_password: Option<&str>) -> Result<(), ApiError> {
        let new_password = non_empty(new_password).ok_or(ApiError::BadRequest("New password is required"))?;
        check_password_length(new_password)?;

        let hash = auth::hash_password(new_password).await?;
        self.db.update_password(user.id, &hash).await?;

        log::info!("🔑 Password changed for: {}", user.username);
        Ok(())
    }

    /// Returns whether a password was actually changed. Callers must not
    /// reveal the answer to the client.
    pub async fn reset_password(&self, username: Option<&str>, new_password: Option<&str>) -> Result<bool, ApiError> {
        if !self.allow_password_reset {
            return Err(ApiError::Forbidden("Password reset is disabled"));
        }

        let (username, new_password) = match (non_empty(username), non_empty(new_password)) {
            (Some(u), Some(p)) => (u, p),
            _ => return Err(ApiError::BadRequest("Username and new password are required")),
        };
        check_password_length(new_password)?;

        let username = normalize_username(username);
        let user = match self.db.get_user_by_username(&username).await? {
            Some(user) => user,
            None => return Ok(false),
        };

        let hash = auth::hash_password(new_password).await?;
        self.db.update_password(user.id, &hash).await?;

        log::info!("🔑 Password reset for: {}", user.username);
        Ok(true)
    }
}
