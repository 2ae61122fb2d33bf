use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::guards;
use crate::users::dto::{CreateUserRequest, UpdateUserRequest, UserDto};
use crate::users::repo::{EmailTaken, UserStore};
use crate::users::repo_types::NewUser;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    Ok(email)
}

/// A unique-email violation at write time means another request won the
/// check-then-write race.
fn write_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<EmailTaken>() {
        Some(EmailTaken(email)) => {
            warn!(email = %email, "email registered concurrently");
            AppError::Conflict(format!("Email already in use: {email}"))
        }
        None => AppError::Storage(err),
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Fails `Conflict` if another user (not `exclude_id`) holds `email`.
    async fn ensure_email_free(&self, email: &str, exclude_id: Option<i64>) -> AppResult<()> {
        if let Some(existing) = self.users.find_by_email(email).await? {
            if Some(existing.id) != exclude_id {
                warn!(email = %email, "email already registered");
                return Err(AppError::Conflict(format!("Email already in use: {email}")));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, req))]
    pub async fn create_user(&self, req: CreateUserRequest) -> AppResult<UserDto> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name must not be blank".into()));
        }
        let email = normalize_email(&req.email)?;
        self.ensure_email_free(&email, None).await?;

        let user = self
            .users
            .insert(NewUser { name, email })
            .await
            .map_err(write_error)?;
        info!(user_id = user.id, "user registered");
        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: i64) -> AppResult<UserDto> {
        let user = guards::require_user_exists(self.users.find_by_id(user_id).await?, user_id)?;
        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> AppResult<Vec<UserDto>> {
        let users = self.users.list().await?;
        Ok(users.into_iter().map(UserDto::from).collect())
    }

    #[instrument(skip(self, req))]
    pub async fn update_user(&self, user_id: i64, req: UpdateUserRequest) -> AppResult<UserDto> {
        let mut user =
            guards::require_user_exists(self.users.find_by_id(user_id).await?, user_id)?;
        if let Some(name) = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            user.name = name;
        }
        if let Some(raw) = req.email {
            let email = normalize_email(&raw)?;
            self.ensure_email_free(&email, Some(user.id)).await?;
            user.email = email;
        }
        self.users.update(&user).await.map_err(write_error)?;
        info!(user_id, "user updated");
        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: i64) -> AppResult<()> {
        if !self.users.delete(user_id).await? {
            return Err(AppError::NotFound(format!("User not found: {user_id}")));
        }
        info!(user_id, "user deleted");
        Ok(())
    }
}
