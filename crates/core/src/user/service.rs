use chrono::Utc;
use uuid::Uuid;

use super::model::{Credentials, NewUser, User};
use crate::auth::password::{hash_secret, verify_secret};
use crate::error::{CoreError, CoreResult};
use crate::shelf::Shelf;
use crate::store::StoreError;
use crate::validate::required_text;

const MIN_PASSWORD_LEN: usize = 8;

impl Shelf {
    pub async fn register_user(&self, input: NewUser) -> CoreResult<User> {
        let username = required_text("username", &input.username)?;
        if !(3..=32).contains(&username.chars().count())
            || !username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(CoreError::validation(
                "username must be 3-32 characters of letters, digits, '.', '_' or '-'",
            ));
        }
        let email = required_text("email", &input.email)?;
        if !email.contains('@') {
            return Err(CoreError::validation("email is not valid"));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.store().find_user_by_username(&username).await?.is_some() {
            return Err(CoreError::Conflict(format!("username {username} is taken")));
        }

        let user = User {
            id: Uuid::now_v7(),
            username,
            email,
            password_hash: hash_secret(&input.password)?,
            created_at: Utc::now(),
        };
        match self.store().insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation { .. }) => {
                return Err(CoreError::Conflict(format!(
                    "username {} is taken",
                    user.username
                )))
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn authenticate_user(&self, credentials: Credentials) -> CoreResult<User> {
        let user = self
            .store()
            .find_user_by_username(credentials.username.trim())
            .await?
            .filter(|user| verify_secret(&credentials.password, &user.password_hash))
            .ok_or_else(|| CoreError::Unauthorized("invalid username or password".into()))?;
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> CoreResult<User> {
        self.store()
            .find_user(id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", id))
    }
}
