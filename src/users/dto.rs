use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::User;
use crate::error::ApiError;

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserDb {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub avatar: Option<String>,
}

impl From<User> for UserDb {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            created_at: u.created_at,
            avatar: u.avatar,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePassword {
    pub old_password: String,
    pub new_password: String,
}

pub const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=10;

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !PASSWORD_LEN.contains(&len) {
        return Err(ApiError::Validation(format!(
            "password must be between {} and {} characters",
            PASSWORD_LEN.start(),
            PASSWORD_LEN.end()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("1234567890").is_ok());
        assert!(validate_password("12345678901").is_err());
    }

    #[test]
    fn user_db_hides_secrets() {
        let user = User {
            id: Uuid::new_v4(),
            username: "annabel".into(),
            email: "ann@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            avatar: None,
            confirmed: true,
            refresh_token: Some("refresh".into()),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&UserDb::from(user)).unwrap();
        assert!(json.contains("ann@example.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("refresh"));
    }
}
