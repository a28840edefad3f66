use crate::error::{DashboardError, Result};

/// Longest accepted display name, in characters
pub const MAX_NAME_CHARS: usize = 120;
/// Longest accepted email address, in characters
pub const MAX_EMAIL_CHARS: usize = 160;
/// Longest accepted company name, in characters
pub const MAX_COMPANY_CHARS: usize = 200;
/// Longest accepted message body, in characters
pub const MAX_MESSAGE_CHARS: usize = 5000;

fn invalid(reason: impl Into<String>) -> DashboardError {
    DashboardError::Validation(reason.into())
}

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a sender or client name
    pub fn validate_contact_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(invalid("Name cannot be empty"));
        }

        if name.chars().count() > MAX_NAME_CHARS {
            return Err(invalid(format!("Name too long (max {MAX_NAME_CHARS} characters)")));
        }

        // Check for potentially dangerous characters
        if name.contains('\0') || name.contains('\r') || name.contains('\n') {
            return Err(invalid("Name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate email format
    pub fn validate_email(email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(invalid("Email cannot be empty"));
        }

        if email.chars().count() > MAX_EMAIL_CHARS {
            return Err(invalid(format!("Email too long (max {MAX_EMAIL_CHARS} characters)")));
        }

        // Basic email validation
        if !email.contains('@') {
            return Err(invalid("Email must contain @ symbol"));
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return Err(invalid("Email must have exactly one @ symbol"));
        }

        let local_part = parts[0];
        let domain_part = parts[1];

        if local_part.is_empty() || local_part.len() > 64 {
            return Err(invalid("Email local part invalid"));
        }

        if domain_part.is_empty() || !domain_part.contains('.') || domain_part.contains(' ') {
            return Err(invalid("Email domain invalid"));
        }

        Ok(())
    }

    /// Validate a message body
    pub fn validate_message(message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(invalid("Message cannot be empty"));
        }

        if message.contains('\0') {
            return Err(invalid("Message contains invalid characters"));
        }

        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Sanitize, then cut to at most `max_chars` characters
    #[must_use]
    pub fn sanitize_and_truncate(text: &str, max_chars: usize) -> String {
        let clean = Self::sanitize_text(text);
        if clean.chars().count() <= max_chars {
            return clean;
        }
        clean.chars().take(max_chars).collect::<String>().trim_end().to_string()
    }
}
