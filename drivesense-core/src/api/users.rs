//! Client for the users service and its auth endpoints

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{FieldPatch, NewUser, User};

use super::client::{take_field, ServiceClient};

/// Client for `/users` and `/auth`
#[derive(Debug, Clone)]
pub struct UsersClient {
    client: ServiceClient,
}

impl UsersClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// `POST /users` - returns the new account's user id.
    pub async fn create(&self, user: &NewUser) -> Result<String> {
        let url = self.client.url(&["users"]);
        self.client.post(&url, user).await?;
        tracing::info!(user_id = %user.user_id, "Created account");
        Ok(user.user_id.clone())
    }

    /// `GET /users/{id}`
    pub async fn get(&self, user_id: &str) -> Result<User> {
        let url = self.client.url(&["users", user_id]);
        self.client.get(&url, "user").await
    }

    /// `PUT /users/{id}` with a single-field patch.
    pub async fn update_field(&self, user_id: &str, patch: &FieldPatch) -> Result<()> {
        let url = self.client.url(&["users", user_id]);
        self.client.put(&url, patch).await?;
        Ok(())
    }

    /// Send `patches` in order, stopping at the first rejected one.
    pub async fn update_fields(&self, user_id: &str, patches: &[FieldPatch]) -> Result<()> {
        for patch in patches {
            self.update_field(user_id, patch).await?;
        }
        tracing::info!(user_id = %user_id, fields = patches.len(), "Updated account");
        Ok(())
    }

    /// `POST /auth/login` - returns the signed-in user id.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let url = self.client.url(&["auth", "login"]);
        let envelope = self
            .client
            .post(&url, &LoginRequest { email, password })
            .await?;
        let user_id = login_user_id(envelope)?;
        tracing::info!(user_id = %user_id, "Signed in");
        Ok(user_id)
    }

    /// `POST /auth/request-reset` - emails a reset token.
    pub async fn request_reset(&self, email: &str) -> Result<()> {
        let url = self.client.url(&["auth", "request-reset"]);
        self.client.post(&url, &ResetRequest { email }).await?;
        Ok(())
    }

    /// `POST /auth/reset-password`
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let url = self.client.url(&["auth", "reset-password"]);
        let body = ResetPasswordRequest {
            token,
            new_password,
        };
        self.client.post(&url, &body).await?;
        Ok(())
    }
}

/// Request body for POST /auth/login
#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Request body for POST /auth/request-reset
#[derive(Serialize)]
struct ResetRequest<'a> {
    email: &'a str,
}

/// Request body for POST /auth/reset-password
#[derive(Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    #[serde(rename = "newPassword")]
    new_password: &'a str,
}

#[derive(Deserialize)]
struct LoginUser {
    #[serde(rename = "userId")]
    user_id: String,
}

/// The login response has carried the id both at the top level and inside a
/// `user` object.
fn login_user_id(envelope: serde_json::Value) -> Result<String> {
    if let Some(id) = envelope.get("userId").and_then(|v| v.as_str()) {
        return Ok(id.to_string());
    }
    let user: LoginUser = take_field(envelope, "user")
        .map_err(|_| Error::Http("login response did not include a user id".to_string()))?;
    Ok(user.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_user_id_top_level() {
        let id = login_user_id(json!({"message": "ok", "userId": "u1"})).unwrap();
        assert_eq!(id, "u1");
    }

    #[test]
    fn test_login_user_id_nested() {
        let id = login_user_id(json!({"user": {"userId": "u2", "name": "Pat"}})).unwrap();
        assert_eq!(id, "u2");
    }

    #[test]
    fn test_login_user_id_missing() {
        assert!(login_user_id(json!({"message": "ok"})).is_err());
    }

    #[test]
    fn test_reset_password_body() {
        let body = ResetPasswordRequest {
            token: "t",
            new_password: "hunter22",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"token": "t", "newPassword": "hunter22"})
        );
    }
}
