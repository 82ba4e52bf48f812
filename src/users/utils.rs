use lazy_static::lazy_static;
use regex::Regex;

use crate::types::ValidationError;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"(?i)\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).expect("email pattern compiles")
    };
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from(
            "email",
            format!("invalid email: {}", email),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        Err(ValidationError::from("username", "can't be blank"))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str, min_length: usize) -> Result<(), ValidationError> {
    if password.chars().count() < min_length {
        Err(ValidationError::from(
            "password",
            format!("must be at least {} characters", min_length),
        ))
    } else {
        Ok(())
    }
}

/// Runs every check, collecting all failures rather than stopping at the first.
pub fn collect<I>(checks: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = Result<(), ValidationError>>,
{
    let mut errors = ValidationError::default();
    for check in checks {
        if let Err(e) = check {
            errors.merge(e);
        }
    }
    errors.into_result()
}
