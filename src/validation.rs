//! Request body validation.
//!
//! Payloads implement [`Validate`] and are extracted through [`ValidatedJson`],
//! which collects every field problem before rejecting the request.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::AppError;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_EMAIL_LENGTH: usize = 254;
const PASSWORD_SPECIALS: &str = "@$!%*?&";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// Accumulates field errors for one payload.
#[derive(Debug, Default)]
pub struct Errors(Vec<FieldError>);

impl Errors {
    pub fn add(&mut self, path: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(path, message));
    }

    pub fn name(&mut self, path: &str, value: &str) {
        let len = value.trim().chars().count();
        if len == 0 {
            self.add(path, "Name is required");
        } else if len < MIN_NAME_LENGTH {
            self.add(path, format!("Name must be at least {MIN_NAME_LENGTH} characters"));
        } else if len > MAX_NAME_LENGTH {
            self.add(path, format!("Name must be at most {MAX_NAME_LENGTH} characters"));
        }
    }

    pub fn email(&mut self, path: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(path, "Email is required");
        } else if !is_valid_email(value.trim()) {
            self.add(path, "Please provide a valid email");
        }
    }

    pub fn required(&mut self, path: &str, value: &str, message: &str) {
        if value.is_empty() {
            self.add(path, message);
        }
    }

    /// Length plus character-class rules for a new password.
    pub fn new_password(&mut self, path: &str, value: &str) {
        let len = value.chars().count();
        if len == 0 {
            self.add(path, "Password is required");
            return;
        }
        if len < MIN_PASSWORD_LENGTH {
            self.add(
                path,
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            );
        } else if len > MAX_PASSWORD_LENGTH {
            self.add(
                path,
                format!("Password must be at most {MAX_PASSWORD_LENGTH} characters"),
            );
        }
        if !is_strong_password(value) {
            self.add(
                path,
                "Password must include uppercase, lowercase, number, and special character",
            );
        }
    }

    pub fn confirmation(&mut self, path: &str, password: &str, confirm: &str) {
        if confirm.is_empty() {
            self.add(path, "Please confirm your password");
        } else if password != confirm {
            self.add(path, "Passwords do not match");
        }
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    email.len() <= MAX_EMAIL_LENGTH && EMAIL_RE.is_match(email)
}

pub fn is_strong_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Lower-cased, trimmed form under which emails are stored and looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// JSON body extractor that runs [`Validate`] after deserializing.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                tracing::debug!(error = %rejection, "rejected request body");
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    AppError::PayloadTooLarge("Request body is too large".into())
                } else {
                    AppError::BadRequest(rejection.body_text())
                }
            })?;
        value.validate().map_err(|errors| {
            tracing::debug!(count = errors.len(), "request body failed validation");
            AppError::Validation(errors)
        })?;
        Ok(ValidatedJson(value))
    }
}
