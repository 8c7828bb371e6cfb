use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::db::models::Role;
use crate::error::AppError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}[\p{L}\s.'-]*[\p{L}.]$").expect("valid name regex"));

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

/// A signup request that passed every field check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSignup {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub role: Role,
    pub password: String,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("Field '{}' is required", field)))
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

/// Strips formatting and returns the ten digits, if that is what remains.
pub fn normalize_mobile(mobile: &str) -> Option<String> {
    let digits: String = mobile.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == 10).then_some(digits)
}

pub fn is_valid_name(name: &str) -> bool {
    name.chars().count() >= 2 && name.chars().count() <= 100 && NAME_RE.is_match(name)
}

pub fn validate_signup(req: &SignupRequest) -> Result<ValidSignup, AppError> {
    let name = required(&req.name, "name")?;
    let email = required(&req.email, "email")?;
    let mobile = required(&req.mobile, "mobile")?;
    let role = required(&req.role, "role")?;
    // Passwords are not trimmed; whitespace is part of the secret.
    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::validation("Field 'password' is required"))?;

    let role: Role = role
        .parse()
        .map_err(|_| AppError::validation("Invalid role specified"))?;

    if !is_valid_email(email) {
        return Err(AppError::validation("Invalid email format"));
    }
    let mobile = normalize_mobile(mobile).ok_or_else(|| AppError::validation("Invalid mobile number"))?;
    if !is_valid_name(name) {
        return Err(AppError::validation("Invalid name"));
    }

    Ok(ValidSignup {
        name: name.to_string(),
        email: email.to_lowercase(),
        mobile,
        role,
        password: password.to_string(),
    })
}
