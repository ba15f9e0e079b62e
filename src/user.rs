use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::form::{self, FormErrors};

#[derive(Debug, Clone)]
#[derive(sqlx::FromRow)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct User {
    pub username: String,
    pub pwhash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Registration {
    #[validate(length(min = 1, max = 20, message = "Username must be 1-20 characters"))]
    pub username: String,
    pub password: String,
    #[validate(
        length(min = 1, max = 50, message = "Email must be 1-50 characters"),
        email(message = "Email address is invalid")
    )]
    pub email: String,
    #[validate(length(max = 30, message = "First name must be 1-30 characters"))]
    pub first_name: String,
    #[validate(length(max = 30, message = "Last name must be 1-30 characters"))]
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Login {
    #[validate(length(min = 1, max = 20, message = "Username must be 1-20 characters"))]
    pub username: String,
    pub password: String,
}

/// Which unique column a registration collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl UniqueField {
    pub fn message(self) -> &'static str {
        match self {
            Self::Username => "Username is already taken",
            Self::Email => "Email address is already registered",
        }
    }
}

impl Registration {
    pub fn check(&self) -> Result<(), FormErrors> {
        form::check(self, |errors| {
            if let Err(e) = username_charset(&self.username) {
                errors.add("username", e);
            }
            form::required(errors, "password", &self.password, "Password is required");
            form::required(
                errors,
                "first_name",
                &self.first_name,
                "First name must be 1-30 characters",
            );
            form::required(
                errors,
                "last_name",
                &self.last_name,
                "Last name must be 1-30 characters",
            );
        })
    }
}

impl Login {
    pub fn check(&self) -> Result<(), FormErrors> {
        form::check(self, |errors| {
            form::required(errors, "password", &self.password, "Password is required");
        })
    }
}

// usernames end up in paths, keep them to characters that need no escaping
fn username_charset(username: &str) -> Result<(), ValidationError> {
    let ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if ok && username != "." && username != ".." {
        return Ok(());
    }

    let mut e = ValidationError::new("charset");
    e.message = Some("Username may only contain letters, digits, '_', '-' and '.'".into());
    Err(e)
}
