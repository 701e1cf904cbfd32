use serde::{Deserialize, Serialize};

use crate::{
    users::PublicUser,
    validation::{Errors, FieldError, Validate},
};

/// Request body for signup. Missing fields deserialize as empty so the
/// validator can report all of them at once.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        errors.name("name", &self.name);
        errors.email("email", &self.email);
        errors.new_password("password", &self.password);
        errors.confirmation("passwordConfirm", &self.password, &self.password_confirm);
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        errors.email("email", &self.email);
        errors.required("password", &self.password, "Password is required");
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

impl Validate for ForgotPasswordRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        errors.email("email", &self.email);
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Errors::default();
        errors.new_password("password", &self.password);
        errors.confirmation("passwordConfirm", &self.password, &self.password_confirm);
        errors.finish()
    }
}

/// `data` payload of every response that returns a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub user: PublicUser,
}
