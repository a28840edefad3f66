//! Contact form intake
//!
//! Turns a raw contact form submission into the document stored in the
//! messages collection: every field is sanitized and cut to its limit, the
//! email is lower-cased and an empty company is dropped.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{DashboardError, Result};
use crate::models::{fields, MessageStatus, Urgency};
use crate::validation::{
    InputValidator, MAX_COMPANY_CHARS, MAX_EMAIL_CHARS, MAX_MESSAGE_CHARS, MAX_NAME_CHARS,
};

/// A contact form as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContactSubmission {
    /// Sender's name
    pub name: String,
    /// Reply address
    pub email: String,
    /// Sender's company, if given
    #[serde(default)]
    pub company: Option<String>,
    /// One of `Low`, `Normal`, `High`, `Critical`; `Normal` when blank
    #[serde(default)]
    pub urgency: Option<String>,
    /// Message body
    pub message: String,
}

/// A validated, normalized contact message ready to store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    /// Sanitized name
    pub name: String,
    /// Lowercased email
    pub email: String,
    /// Company; `None` when blank
    pub company: Option<String>,
    /// Parsed urgency
    pub urgency: Urgency,
    /// Sanitized body
    pub message: String,
}

impl ContactSubmission {
    /// Sanitize, truncate and validate the submission
    pub fn normalize(&self) -> Result<ContactMessage> {
        let name = InputValidator::sanitize_and_truncate(&self.name, MAX_NAME_CHARS);
        let email =
            InputValidator::sanitize_and_truncate(&self.email, MAX_EMAIL_CHARS).to_lowercase();
        let company = self
            .company
            .as_deref()
            .map(|company| InputValidator::sanitize_and_truncate(company, MAX_COMPANY_CHARS))
            .filter(|company| !company.is_empty());
        let message = InputValidator::sanitize_and_truncate(&self.message, MAX_MESSAGE_CHARS);

        let urgency = match self.urgency.as_deref().map(str::trim) {
            None | Some("") => Urgency::default(),
            Some(raw) => raw
                .parse()
                .map_err(|e| DashboardError::Validation(format!("Urgency: {e}")))?,
        };

        InputValidator::validate_contact_name(&name)?;
        InputValidator::validate_email(&email)?;
        InputValidator::validate_message(&message)?;

        Ok(ContactMessage {
            name,
            email,
            company,
            urgency,
            message,
        })
    }
}

impl ContactMessage {
    /// Fields of the stored document. `createdAt` is left to the store and
    /// `read` stays unset, so a new message counts as unread.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(fields::NAME.to_string(), Value::from(self.name.clone()));
        values.insert(fields::EMAIL.to_string(), Value::from(self.email.clone()));
        values.insert(
            fields::COMPANY.to_string(),
            self.company.clone().map_or(Value::Null, Value::from),
        );
        values.insert(fields::URGENCY.to_string(), Value::from(self.urgency.as_str()));
        values.insert(fields::MESSAGE.to_string(), Value::from(self.message.clone()));
        values.insert(
            fields::STATUS.to_string(),
            Value::from(MessageStatus::New.as_str()),
        );
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> ContactSubmission {
        ContactSubmission {
            name: "  Ada Lovelace ".to_string(),
            email: " ADA@Example.COM ".to_string(),
            company: Some("   ".to_string()),
            urgency: None,
            message: " Please call me back. ".to_string(),
        }
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        let message = submission().normalize().expect("valid");
        assert_eq!(message.name, "Ada Lovelace");
        assert_eq!(message.email, "ada@example.com");
        assert_eq!(message.company, None);
        assert_eq!(message.urgency, Urgency::Normal);
        assert_eq!(message.message, "Please call me back.");
    }

    #[test]
    fn test_stored_fields_leave_read_unset() {
        let values = submission().normalize().expect("valid").to_fields();
        assert_eq!(values.get("status"), Some(&Value::from("new")));
        assert_eq!(values.get("company"), Some(&Value::Null));
        assert!(!values.contains_key("read"));
        assert!(!values.contains_key("createdAt"));
    }
}
