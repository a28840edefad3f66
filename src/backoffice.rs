//! Back-office actions
//!
//! The write side of the admin portal: contact intake, message triage and
//! client maintenance. Every write goes through a [`RecordWriter`], so the
//! dashboard feeds observe the change as a new snapshot.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::intake::ContactSubmission;
use crate::metrics::MetricsCollector;
use crate::models::{fields, ClientStatus};
use crate::store::RecordWriter;
use crate::validation::{InputValidator, MAX_COMPANY_CHARS, MAX_EMAIL_CHARS, MAX_NAME_CHARS};

/// Client form contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientDraft {
    /// Client name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Company, if any
    #[serde(default)]
    pub company: Option<String>,
    /// Case-insensitive status; `active` when blank
    #[serde(default)]
    pub status: Option<String>,
}

impl ClientDraft {
    fn to_fields(&self) -> Result<Map<String, Value>> {
        let name = InputValidator::sanitize_and_truncate(&self.name, MAX_NAME_CHARS);
        let email =
            InputValidator::sanitize_and_truncate(&self.email, MAX_EMAIL_CHARS).to_lowercase();
        InputValidator::validate_contact_name(&name)?;
        InputValidator::validate_email(&email)?;

        let company = self
            .company
            .as_deref()
            .map(|company| InputValidator::sanitize_and_truncate(company, MAX_COMPANY_CHARS))
            .filter(|company| !company.is_empty());
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => ClientStatus::default(),
            Some(raw) => raw
                .parse::<ClientStatus>()
                .map_err(|e| DashboardError::Validation(format!("Client status: {e}")))?,
        };

        let mut values = Map::new();
        values.insert(fields::NAME.to_string(), Value::from(name));
        values.insert(fields::EMAIL.to_string(), Value::from(email));
        values.insert(fields::COMPANY.to_string(), company.map_or(Value::Null, Value::from));
        values.insert(fields::STATUS.to_string(), Value::from(status.as_str()));
        Ok(values)
    }
}

/// Write operations of the admin portal
pub struct AdminActions<W: RecordWriter> {
    writer: W,
    messages_collection: String,
    clients_collection: String,
    metrics: MetricsCollector,
}

impl<W: RecordWriter> AdminActions<W> {
    /// Create actions against `writer` using the configured collections
    pub fn new(writer: W, config: &DashboardConfig) -> Self {
        Self {
            writer,
            messages_collection: config.messages_collection.clone(),
            clients_collection: config.clients_collection.clone(),
            metrics: MetricsCollector::default(),
        }
    }

    /// The underlying writer
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Write and validation counters
    pub const fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Store a contact form submission as a new message
    pub fn submit_contact(&mut self, submission: &ContactSubmission) -> Result<String> {
        let message = submission.normalize().inspect_err(|e| {
            warn!(error = %e, "Contact submission rejected");
            self.metrics.record_validation_failure("contact");
        })?;

        let id = self.writer.insert(&self.messages_collection, message.to_fields())?;
        self.metrics.record_write(&self.messages_collection, "insert");
        info!(id = %id, urgency = message.urgency.as_str(), "Contact message received");
        Ok(id)
    }

    /// Set the explicit read flag of a message
    pub fn set_read(&mut self, message_id: &str, read: bool) -> Result<()> {
        let mut patch = Map::new();
        patch.insert(fields::READ.to_string(), Value::Bool(read));
        self.writer.update(&self.messages_collection, message_id, patch)?;
        self.metrics.record_write(&self.messages_collection, "update");
        info!(id = message_id, read, "Message read flag changed");
        Ok(())
    }

    /// Mark a message read
    pub fn mark_read(&mut self, message_id: &str) -> Result<()> {
        self.set_read(message_id, true)
    }

    /// Mark a message unread
    pub fn mark_unread(&mut self, message_id: &str) -> Result<()> {
        self.set_read(message_id, false)
    }

    /// Remove a message
    pub fn delete_message(&mut self, message_id: &str) -> Result<()> {
        self.writer.delete(&self.messages_collection, message_id)?;
        self.metrics.record_write(&self.messages_collection, "delete");
        info!(id = message_id, "Message deleted");
        Ok(())
    }

    /// Create a client, or update it when `client_id` is given. The
    /// creation timestamp is only written on create.
    pub fn save_client(&mut self, draft: &ClientDraft, client_id: Option<&str>) -> Result<String> {
        let values = draft.to_fields().inspect_err(|e| {
            warn!(error = %e, "Client form rejected");
            self.metrics.record_validation_failure("client");
        })?;

        match client_id {
            Some(id) => {
                self.writer.update(&self.clients_collection, id, values)?;
                self.metrics.record_write(&self.clients_collection, "update");
                info!(id, "Client updated");
                Ok(id.to_string())
            }
            None => {
                let id = self.writer.insert(&self.clients_collection, values)?;
                self.metrics.record_write(&self.clients_collection, "insert");
                info!(id = %id, "Client created");
                Ok(id)
            }
        }
    }

    /// Remove a client
    pub fn delete_client(&mut self, client_id: &str) -> Result<()> {
        self.writer.delete(&self.clients_collection, client_id)?;
        self.metrics.record_write(&self.clients_collection, "delete");
        info!(id = client_id, "Client deleted");
        Ok(())
    }

    /// Create or refresh the client behind a message, matched by
    /// lower-cased email. Returns the client id.
    pub fn upsert_client_from_message(&mut self, message_id: &str) -> Result<String> {
        let message = self
            .writer
            .documents(&self.messages_collection)?
            .into_iter()
            .find(|document| document.id == message_id)
            .ok_or_else(|| DashboardError::DocumentNotFound {
                collection: self.messages_collection.clone(),
                id: message_id.to_string(),
            })?;

        let email = message
            .text(fields::EMAIL)
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .ok_or_else(|| DashboardError::Validation("Message has no email address".to_string()))?;
        let name = message.text(fields::NAME).filter(|name| !name.trim().is_empty());
        let company = message.text(fields::COMPANY).filter(|company| !company.trim().is_empty());

        let existing = self
            .writer
            .documents(&self.clients_collection)?
            .into_iter()
            .find(|client| {
                client
                    .text(fields::EMAIL)
                    .is_some_and(|known| known.trim().eq_ignore_ascii_case(&email))
            });

        let mut values = Map::new();
        if let Some(name) = name.clone() {
            values.insert(fields::NAME.to_string(), Value::from(name));
        }
        if let Some(company) = company {
            values.insert(fields::COMPANY.to_string(), Value::from(company));
        }

        if let Some(client) = existing {
            if !values.is_empty() {
                self.writer.update(&self.clients_collection, &client.id, values)?;
                self.metrics.record_write(&self.clients_collection, "update");
            }
            info!(id = %client.id, message = message_id, "Client refreshed from message");
            return Ok(client.id);
        }

        values
            .entry(fields::NAME.to_string())
            .or_insert_with(|| Value::from(email.clone()));
        values.insert(fields::EMAIL.to_string(), Value::from(email));
        values
            .entry(fields::COMPANY.to_string())
            .or_insert(Value::Null);
        values.insert(
            fields::STATUS.to_string(),
            Value::from(ClientStatus::New.as_str()),
        );

        let id = self.writer.insert(&self.clients_collection, values)?;
        self.metrics.record_write(&self.clients_collection, "insert");
        info!(id = %id, message = message_id, "Client created from message");
        Ok(id)
    }
}
