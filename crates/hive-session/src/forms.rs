//! Client-side form validation.
//!
//! Checks run before anything reaches the backend. Each failing field
//! gets one message; the first failing rule for a field wins.

use crate::models::{PasswordChange, RegistrationRequest};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

pub const MIN_NAME_CHARS: usize = 3;
pub const MIN_SECRET_CHARS: usize = 6;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("email pattern is valid")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Per-field validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. A field keeps its first message.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.add("email", "Invalid email address");
    }
}

fn check_new_secret(errors: &mut ValidationErrors, field: &'static str, secret: &str, confirm: &str) {
    if secret.chars().count() < MIN_SECRET_CHARS {
        errors.add(
            field,
            format!("Password must be at least {} characters", MIN_SECRET_CHARS),
        );
    }
    if confirm != secret {
        errors.add("confirm_secret", "Passwords do not match");
    }
}

/// Login screen fields.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub secret: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, &self.email);
        if self.secret.is_empty() {
            errors.add("secret", "Password is required");
        }
        errors.into_result()
    }
}

/// Sign-up screen fields.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub secret: String,
    pub confirm_secret: String,
    pub accepted_terms: bool,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "Name is required");
        } else if name.chars().count() < MIN_NAME_CHARS {
            errors.add(
                "name",
                format!("Name must be at least {} characters", MIN_NAME_CHARS),
            );
        }
        check_email(&mut errors, &self.email);
        check_new_secret(&mut errors, "secret", &self.secret, &self.confirm_secret);
        if !self.accepted_terms {
            errors.add("accepted_terms", "You must accept the terms of use");
        }

        errors.into_result()
    }

    /// Validate and build the request body.
    pub fn into_request(self) -> Result<RegistrationRequest, ValidationErrors> {
        self.validate()?;
        Ok(RegistrationRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            secret: self.secret,
        })
    }
}

/// Settings screen password change fields.
#[derive(Debug, Clone, Default)]
pub struct PasswordChangeForm {
    pub current_secret: String,
    pub new_secret: String,
    pub confirm_secret: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.current_secret.is_empty() {
            errors.add("current_secret", "Current password is required");
        }
        check_new_secret(&mut errors, "new_secret", &self.new_secret, &self.confirm_secret);
        errors.into_result()
    }

    pub fn into_request(self) -> Result<PasswordChange, ValidationErrors> {
        self.validate()?;
        Ok(PasswordChange {
            current_secret: self.current_secret,
            new_secret: self.new_secret,
        })
    }
}
