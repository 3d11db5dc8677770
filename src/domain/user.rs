//! User record, theme preference and account-form validation.

use serde::{Deserialize, Serialize};

use crate::domain::error::StratifyError;
use crate::domain::timezone::DEFAULT_TIMEZONE;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const VERIFICATION_CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub dark_theme: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub dashboard_real_trading: bool,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark(dark: bool) -> Self {
        if dark { Theme::Dark } else { Theme::Light }
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = StratifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(StratifyError::validation(
                "theme",
                format!("expected light or dark, got {other}"),
            )),
        }
    }
}

/// Fields sent when requesting a signup or account-update code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountForm {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Check a new password and its confirmation before any request is made.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), StratifyError> {
    if password != confirmation {
        return Err(StratifyError::validation("password", "Passwords do not match"));
    }
    validate_password_strength(password)
}

pub fn validate_password_strength(password: &str) -> Result<(), StratifyError> {
    let missing = if password.chars().count() < MIN_PASSWORD_LEN {
        Some("at least 8 characters")
    } else if !password.chars().any(|c| c.is_uppercase()) {
        Some("an uppercase letter")
    } else if !password.chars().any(|c| c.is_lowercase()) {
        Some("a lowercase letter")
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Some("a digit")
    } else if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        Some("a special character")
    } else {
        None
    };
    match missing {
        Some(what) => Err(StratifyError::validation(
            "password",
            format!("Password must contain {what}"),
        )),
        None => Ok(()),
    }
}

pub fn validate_verification_code(code: &str) -> Result<(), StratifyError> {
    let code = code.trim();
    if code.len() == VERIFICATION_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(StratifyError::validation(
            "code",
            "Verification code must be 6 digits",
        ))
    }
}

pub fn validate_email(email: &str) -> Result<(), StratifyError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(StratifyError::validation("email", "Enter a valid email address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_deserializes_with_defaults() {
        let user: User = serde_json::from_str(r#"{"id": 3, "username": "ana"}"#).unwrap();
        assert_eq!(user.timezone, "UTC");
        assert!(!user.dark_theme);
        assert!(user.email.is_empty());
    }

    #[test]
    fn theme_toggles_and_parses() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("blue".parse::<Theme>().is_err());
        assert_eq!(Theme::from_dark(true).to_string(), "dark");
    }

    #[test]
    fn mismatched_confirmation_is_rejected_first() {
        let err = validate_new_password("Str0ng!pass", "Str0ng!pasS").unwrap_err();
        assert_eq!(err.user_message(), "Passwords do not match");
    }

    #[test]
    fn password_strength_rules() {
        assert!(validate_password_strength("Sh0rt!").is_err());
        assert!(validate_password_strength("alllower1!").is_err());
        assert!(validate_password_strength("ALLUPPER1!").is_err());
        assert!(validate_password_strength("NoDigits!!").is_err());
        assert!(validate_password_strength("NoSpecial12").is_err());
        assert!(validate_password_strength("Str0ng!pass").is_ok());
    }

    #[test]
    fn verification_code_is_six_digits() {
        assert!(validate_verification_code("123456").is_ok());
        assert!(validate_verification_code(" 654321 ").is_ok());
        assert!(validate_verification_code("12345").is_err());
        assert!(validate_verification_code("12a456").is_err());
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("ana@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
    }
}
