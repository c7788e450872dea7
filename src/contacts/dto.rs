use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Date;

use super::repo::{Contact, ContactFields};
use crate::{auth::is_valid_email, error::ApiError};

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[1-9][\d]{11}$").unwrap();
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub birthday: Option<Date>,
}

impl ContactRequest {
    /// Checks field constraints and returns the normalized fields.
    pub fn validate(self) -> Result<ContactFields, ApiError> {
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        let first_len = first_name.chars().count();
        if !(2..=20).contains(&first_len) {
            return Err(ApiError::Validation(
                "first_name must be between 2 and 20 characters".into(),
            ));
        }
        if last_name.chars().count() > 20 {
            return Err(ApiError::Validation(
                "last_name must be at most 20 characters".into(),
            ));
        }

        let email = match self.email.map(|e| e.trim().to_lowercase()) {
            Some(e) if e.is_empty() => None,
            Some(e) if !is_valid_email(&e) => {
                return Err(ApiError::Validation("email is not a valid address".into()))
            }
            other => other,
        };

        let phone_number = match self.phone_number.map(|p| p.trim().to_string()) {
            Some(p) if p.is_empty() => None,
            Some(p) if !PHONE_RE.is_match(&p) => {
                return Err(ApiError::Validation(
                    "phone_number must be 12 digits, optionally prefixed with +".into(),
                ))
            }
            other => other,
        };

        Ok(ContactFields {
            first_name,
            last_name,
            email,
            phone_number,
            birthday: self.birthday,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub birthday: Option<Date>,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone_number: c.phone_number,
            birthday: c.birthday,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}
fn default_list_limit() -> u32 { 100 }

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct BirthdayParams {
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}
fn default_limit() -> u32 { 10 }

pub const MAX_LIMIT: u32 = 1000;

pub fn check_limit(limit: u32) -> Result<u32, ApiError> {
    if limit > MAX_LIMIT {
        return Err(ApiError::Validation(format!("limit must be at most {MAX_LIMIT}")));
    }
    Ok(limit)
}
