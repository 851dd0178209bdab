use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("username pattern"));

pub type Check = Result<(), &'static str>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every failed field of a form. Displays as the first message, which is
/// what gets shown when only one line fits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", first_message(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

fn first_message(fields: &[FieldError]) -> &str {
    fields
        .first()
        .map(|field| field.message.as_str())
        .unwrap_or("Invalid input")
}

impl ValidationError {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError {
                field,
                message: message.into(),
            }],
        }
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }
}

/// Collects field checks so a form reports all of its problems at once.
#[derive(Debug, Default)]
pub struct Checks {
    fields: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: &'static str, check: Check) -> Self {
        if let Err(message) = check {
            self.fields.push(FieldError {
                field,
                message: message.to_string(),
            });
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                fields: self.fields,
            })
        }
    }
}

pub fn validate_email(email: &str) -> Check {
    if email.is_empty() {
        return Err("Email is required");
    }
    if !EMAIL.is_match(email) {
        return Err("Invalid email format");
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Check {
    if password.is_empty() {
        return Err("Password is required");
    }
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long");
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Check {
    if username.is_empty() {
        return Err("Username is required");
    }
    let length = username.chars().count();
    if !(3..=20).contains(&length) {
        return Err("Username must be between 3 and 20 characters");
    }
    if !USERNAME.is_match(username) {
        return Err("Username can only contain letters, numbers, and underscores");
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Check {
    if title.is_empty() {
        return Err("Title is required");
    }
    let length = title.chars().count();
    if !(5..=100).contains(&length) {
        return Err("Title must be between 5 and 100 characters");
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Check {
    if description.is_empty() {
        return Err("Description is required");
    }
    if description.chars().count() < 10 {
        return Err("Description must be at least 10 characters");
    }
    Ok(())
}

pub fn validate_comment(content: &str) -> Check {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("Comment cannot be empty");
    }
    if trimmed.chars().count() < 3 {
        return Err("Comment must be at least 3 characters long");
    }
    if trimmed.chars().count() > 1000 {
        return Err("Comment must be less than 1000 characters");
    }
    Ok(())
}

pub fn validate_required(value: &str, message: &'static str) -> Check {
    if value.trim().is_empty() {
        Err(message)
    } else {
        Ok(())
    }
}

pub fn validate_login(identifier: &str, password: &str) -> Result<(), ValidationError> {
    Checks::new()
        .field(
            "identifier",
            validate_required(identifier, "Email or username is required"),
        )
        .field(
            "password",
            validate_required(password, "Password is required"),
        )
        .finish()
}

pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    let confirmation = if password == confirm_password {
        Ok(())
    } else {
        Err("Passwords do not match")
    };

    Checks::new()
        .field("username", validate_username(username))
        .field("email", validate_email(email))
        .field("password", validate_password(password))
        .field("confirm_password", confirmation)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert_eq!(validate_email(""), Err("Email is required"));
        assert_eq!(validate_email("rani@"), Err("Invalid email format"));
        assert_eq!(validate_email("rani @mail.com"), Err("Invalid email format"));
        assert_eq!(validate_email("rani@mail.com"), Ok(()));
    }

    #[test]
    fn test_username() {
        assert_eq!(validate_username(""), Err("Username is required"));
        assert_eq!(
            validate_username("ab"),
            Err("Username must be between 3 and 20 characters")
        );
        assert_eq!(
            validate_username("a".repeat(21).as_str()),
            Err("Username must be between 3 and 20 characters")
        );
        assert_eq!(
            validate_username("rani-k"),
            Err("Username can only contain letters, numbers, and underscores")
        );
        assert_eq!(validate_username("rani_k99"), Ok(()));
    }

    #[test]
    fn test_password_and_article_fields() {
        assert_eq!(
            validate_password("short"),
            Err("Password must be at least 8 characters long")
        );
        assert_eq!(validate_password("longenough"), Ok(()));

        assert_eq!(validate_title("Bali"), Err("Title must be between 5 and 100 characters"));
        assert_eq!(validate_title("Bali in March"), Ok(()));
        assert_eq!(
            validate_description("too short"),
            Err("Description must be at least 10 characters")
        );
        assert_eq!(validate_description("Long enough text"), Ok(()));
    }

    #[test]
    fn test_comment_trims_before_measuring() {
        assert_eq!(validate_comment("   "), Err("Comment cannot be empty"));
        assert_eq!(
            validate_comment("  hi  "),
            Err("Comment must be at least 3 characters long")
        );
        assert_eq!(
            validate_comment(&"x".repeat(1001)),
            Err("Comment must be less than 1000 characters")
        );
        assert_eq!(validate_comment("Nice!"), Ok(()));
    }

    #[test]
    fn test_registration_reports_every_field() {
        let err = validate_registration("ab", "nope", "short", "other").unwrap_err();

        assert_eq!(err.fields.len(), 4);
        assert_eq!(err.to_string(), "Username must be between 3 and 20 characters");
        assert_eq!(err.message_for("confirm_password"), Some("Passwords do not match"));
        assert_eq!(err.message_for("email"), Some("Invalid email format"));

        assert!(validate_registration("rani", "rani@mail.com", "password1", "password1").is_ok());
    }

    #[test]
    fn test_login() {
        let err = validate_login("", "").unwrap_err();
        assert_eq!(err.fields.len(), 2);
        assert!(validate_login("rani", "secret").is_ok());
    }
}
