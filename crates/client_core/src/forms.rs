//! Client-side checks run before an auth request is issued.

use shared::protocol::{LoginRequest, SignUpRequest};

use crate::error::{ClientError, Result};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<SignUpRequest> {
        let first_name = required(&self.first_name, "First name is required")?;
        let last_name = required(&self.last_name, "Last name is required")?;
        let email = required(&self.email, "Email is required")?;
        if self.password.is_empty() {
            return Err(ClientError::validation("Password is required"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::validation(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(SignUpRequest {
            first_name,
            last_name,
            email,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest> {
        let email = required(&self.email, "Email is required")?;
        if self.password.is_empty() {
            return Err(ClientError::validation("Password is required"));
        }
        Ok(LoginRequest {
            email,
            password: self.password.clone(),
        })
    }
}

fn required(value: &str, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::validation(message));
    }
    Ok(trimmed.to_string())
}
