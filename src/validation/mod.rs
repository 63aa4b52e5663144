//! Form validation, checked before any request leaves the client.

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use crate::models::{InterlocutorType, ProfileUpdate, SignUpForm};

/// Minimum length for free-text fields (name, about me, password, city).
pub const MIN_TEXT_LEN: usize = 2;
/// Brazilian state codes are two letters (UF).
pub const STATE_CODE_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("{field} must be exactly {len} characters")]
    WrongLength { field: &'static str, len: usize },
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("'{0}' is not a valid e-mail address")]
    InvalidEmail(String),
    #[error("'{0}' is not a valid date (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("date of birth cannot be in the future")]
    FutureDate,
    #[error("unknown interlocutor type '{0}' (expected refugee, immigrant or collaborator)")]
    UnknownInterlocutorType(String),
}

fn min_len(field: &'static str, value: &str, min: usize) -> Result<(), ValidationError> {
    if value.trim().chars().count() < min {
        return Err(ValidationError::TooShort { field, min });
    }
    Ok(())
}

fn state_code(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() != STATE_CODE_LEN {
        return Err(ValidationError::WrongLength {
            field: "state",
            len: STATE_CODE_LEN,
        });
    }
    Ok(())
}

fn birth_date(date: NaiveDate) -> Result<(), ValidationError> {
    if date > Utc::now().date_naive() {
        return Err(ValidationError::FutureDate);
    }
    Ok(())
}

/// Loose structural e-mail check: one `@`, non-empty local part, dotted domain, no spaces.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidEmail(email.to_string());
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` date as typed on the command line.
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

/// Parse the interlocutor type as typed on the command line.
pub fn parse_interlocutor_type(value: &str) -> Result<InterlocutorType, ValidationError> {
    value
        .parse()
        .map_err(|_| ValidationError::UnknownInterlocutorType(value.trim().to_string()))
}

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::Missing { field: "password" });
    }
    Ok(())
}

pub fn validate_sign_up(form: &SignUpForm) -> Result<(), ValidationError> {
    min_len("name", &form.name, MIN_TEXT_LEN)?;
    min_len("about me", &form.about_me, MIN_TEXT_LEN)?;
    validate_email(&form.email)?;
    min_len("password", &form.password, MIN_TEXT_LEN)?;
    birth_date(form.date_of_birth)?;
    state_code(&form.current_state)?;
    min_len("city", &form.current_city, MIN_TEXT_LEN)
}

pub fn validate_profile_update(update: &ProfileUpdate) -> Result<(), ValidationError> {
    min_len("name", &update.name, MIN_TEXT_LEN)?;
    min_len("about me", &update.about_me, MIN_TEXT_LEN)?;
    birth_date(update.date_of_birth)?;
    state_code(&update.current_state)?;
    min_len("city", &update.current_city, MIN_TEXT_LEN)
}
