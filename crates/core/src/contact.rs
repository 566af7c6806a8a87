//! Contact domain type.
//!
//! A Contact is a workspace-scoped person record. Its `custom_data` map is
//! keyed by `CustomFieldDef.key`; the store does not enforce the key set, so
//! the orchestration layer only writes recognized keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub String);

impl ContactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ContactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A workspace-scoped person record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,

    pub workspace_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Open key→value map, keyed by `CustomFieldDef.key`.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom_data: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            id: ContactId::new(),
            workspace_id: workspace_id.into(),
            name: None,
            email: None,
            external_id: None,
            custom_data: serde_json::Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_contact_has_empty_custom_data() {
        let contact = Contact::new("ws_1");
        assert!(contact.custom_data.is_empty());
        assert!(contact.name.is_none());
    }

    #[test]
    fn builder_sets_denormalized_fields() {
        let contact = Contact::new("ws_1")
            .with_name(Some("Ana".into()))
            .with_email(Some("ana@example.com".into()))
            .with_external_id(Some("wa:5215550000".into()));
        assert_eq!(contact.name.as_deref(), Some("Ana"));
        assert_eq!(contact.email.as_deref(), Some("ana@example.com"));
        assert_eq!(contact.external_id.as_deref(), Some("wa:5215550000"));
    }

    #[test]
    fn contact_serialization_roundtrip() {
        let mut contact = Contact::new("ws_1");
        contact
            .custom_data
            .insert("status".into(), serde_json::json!("Interesado"));
        let json = serde_json::to_string(&contact).unwrap();
        let back: Contact = serde_json::from_str(&json).unwrap();
        assert_eq!(back.custom_data["status"], "Interesado");
    }
}
