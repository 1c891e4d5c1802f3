//! Sign-up and sign-in field validation.

use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A single problem with submitted credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("Name is required")]
    NameRequired,

    #[error("Valid email is required")]
    InvalidEmail,

    #[error("Password must be at least 6 characters")]
    WeakPassword,

    #[error("Password is required")]
    PasswordRequired,
}

/// Every issue found in one submission, in form order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationIssue>);

impl ValidationErrors {
    /// The collected issues.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }

    /// Whether `issue` was reported.
    #[must_use]
    pub fn contains(&self, issue: ValidationIssue) -> bool {
        self.0.contains(&issue)
    }

    fn into_result(issues: Vec<ValidationIssue>) -> Result<(), Self> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self(issues))
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (index, issue) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }

            Display::fmt(issue, f)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Loose email shape check: `local@domain.tld`, no whitespace, exactly one `@`.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(index, c)| c == '.' && index > 0 && index + 1 < domain.len())
}

/// Whether `password` is long enough.
#[must_use]
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Validate a sign-up form.
///
/// # Errors
///
/// Returns every issue found when any field is invalid.
pub fn validate_sign_up(
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<(), ValidationErrors> {
    let mut issues = Vec::new();

    if display_name.trim().is_empty() {
        issues.push(ValidationIssue::NameRequired);
    }

    if !is_valid_email(email) {
        issues.push(ValidationIssue::InvalidEmail);
    }

    if !is_valid_password(password) {
        issues.push(ValidationIssue::WeakPassword);
    }

    ValidationErrors::into_result(issues)
}

/// Validate a sign-in form.
///
/// # Errors
///
/// Returns every issue found when any field is invalid.
pub fn validate_sign_in(email: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut issues = Vec::new();

    if !is_valid_email(email) {
        issues.push(ValidationIssue::InvalidEmail);
    }

    if password.is_empty() {
        issues.push(ValidationIssue::PasswordRequired);
    }

    ValidationErrors::into_result(issues)
}
