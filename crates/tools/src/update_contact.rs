//! The `update_contact` tool.
//!
//! Takes an object of key→value updates and merges it into the
//! conversation's linked contact. Every key must match one of the agent's
//! custom field definitions and every value must fit the field's type —
//! unrecognized keys and invalid values come back as structured in-band
//! failures the model can react to, never as turn-aborting errors.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use konsul_core::agent::{CustomFieldDef, FieldKind};
use konsul_core::contact::ContactId;
use konsul_core::error::ToolError;
use konsul_core::store::ContactStore;
use konsul_core::tool::{Tool, ToolResult};

pub const TOOL_NAME: &str = "update_contact";

/// Per-turn contact update tool, bound to the conversation's linked contact.
pub struct UpdateContactTool {
    contacts: Arc<dyn ContactStore>,
    workspace_id: String,
    contact_id: Option<ContactId>,
    fields: Vec<CustomFieldDef>,
}

impl UpdateContactTool {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        workspace_id: String,
        contact_id: Option<ContactId>,
        fields: Vec<CustomFieldDef>,
    ) -> Self {
        Self {
            contacts,
            workspace_id,
            contact_id,
            fields,
        }
    }

    /// Validate one update against its field definition.
    ///
    /// Returns the value to store (canonicalized for Select fields) or a
    /// model-facing rejection message.
    fn validate_value(
        field: &CustomFieldDef,
        value: &serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        match field.kind {
            FieldKind::Text => match value {
                serde_json::Value::String(s) => Ok(serde_json::Value::String(s.clone())),
                serde_json::Value::Number(n) => Ok(serde_json::Value::String(n.to_string())),
                serde_json::Value::Bool(b) => Ok(serde_json::Value::String(b.to_string())),
                _ => Err(format!("Valor inválido para '{}': se esperaba texto", field.key)),
            },
            FieldKind::Number => match value {
                serde_json::Value::Number(_) => Ok(value.clone()),
                serde_json::Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| {
                        format!("Valor inválido para '{}': se esperaba un número", field.key)
                    }),
                _ => Err(format!(
                    "Valor inválido para '{}': se esperaba un número",
                    field.key
                )),
            },
            FieldKind::Boolean => match value {
                serde_json::Value::Bool(_) => Ok(value.clone()),
                serde_json::Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "sí" | "si" => Ok(serde_json::Value::Bool(true)),
                    "false" | "no" => Ok(serde_json::Value::Bool(false)),
                    _ => Err(format!(
                        "Valor inválido para '{}': se esperaba verdadero o falso",
                        field.key
                    )),
                },
                _ => Err(format!(
                    "Valor inválido para '{}': se esperaba verdadero o falso",
                    field.key
                )),
            },
            FieldKind::Date => match value {
                serde_json::Value::String(s) => {
                    let s = s.trim();
                    let valid = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
                        || chrono::DateTime::parse_from_rfc3339(s).is_ok();
                    if valid {
                        Ok(serde_json::Value::String(s.to_string()))
                    } else {
                        Err(format!(
                            "Valor inválido para '{}': se esperaba una fecha (YYYY-MM-DD)",
                            field.key
                        ))
                    }
                }
                _ => Err(format!(
                    "Valor inválido para '{}': se esperaba una fecha (YYYY-MM-DD)",
                    field.key
                )),
            },
            FieldKind::Select => {
                let given = match value {
                    serde_json::Value::String(s) => s.trim(),
                    _ => {
                        return Err(format!(
                            "Valor inválido para '{}': se esperaba una de las opciones {:?}",
                            field.key, field.options
                        ));
                    }
                };
                // Case-insensitive match, canonical spelling stored.
                field
                    .options
                    .iter()
                    .find(|option| option.eq_ignore_ascii_case(given))
                    .map(|option| serde_json::Value::String(option.clone()))
                    .ok_or_else(|| {
                        format!(
                            "Valor inválido para '{}': se esperaba una de las opciones {:?}",
                            field.key, field.options
                        )
                    })
            }
        }
    }
}

#[async_trait]
impl Tool for UpdateContactTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Guarda o actualiza datos del contacto de esta conversación. \
         Usa las claves definidas para el agente."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "updates": {
                    "type": "object",
                    "description": "Pares clave → valor con los datos a guardar"
                }
            },
            "required": ["updates"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let updates = arguments
            .get("updates")
            .and_then(|u| u.as_object())
            .ok_or_else(|| {
                ToolError::InvalidArguments("'updates' debe ser un objeto".into())
            })?;

        // The conversation must already carry a linked contact. Absence is a
        // structured failure the model sees, not a thrown error.
        let Some(contact_id) = &self.contact_id else {
            return Ok(ToolResult::failure(
                "La conversación no tiene un contacto vinculado",
            ));
        };

        let mut validated = serde_json::Map::new();
        for (key, value) in updates {
            let Some(field) = self.fields.iter().find(|f| &f.key == key) else {
                return Ok(ToolResult::failure(format!("Campo no reconocido: {key}")));
            };
            match Self::validate_value(field, value) {
                Ok(value) => {
                    validated.insert(key.clone(), value);
                }
                Err(message) => return Ok(ToolResult::failure(message)),
            }
        }

        if validated.is_empty() {
            return Ok(ToolResult::failure("No se recibió ningún dato para guardar"));
        }

        let updated_keys: Vec<String> = validated.keys().cloned().collect();

        self.contacts
            .update_custom_data(contact_id, &self.workspace_id, validated)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: e.to_string(),
            })?;

        debug!(contact = %contact_id, keys = ?updated_keys, "Contact fields updated");

        Ok(ToolResult::success(serde_json::json!({
            "success": true,
            "updated": updated_keys,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konsul_core::contact::Contact;
    use konsul_storage::InMemoryStore;

    fn fields() -> Vec<CustomFieldDef> {
        vec![
            CustomFieldDef {
                key: "status".into(),
                label: "Estado".into(),
                kind: FieldKind::Select,
                description: "Nivel de interés".into(),
                options: vec!["Interesado".into(), "No interesado".into()],
            },
            CustomFieldDef {
                key: "budget".into(),
                label: "Presupuesto".into(),
                kind: FieldKind::Number,
                description: String::new(),
                options: vec![],
            },
            CustomFieldDef {
                key: "visit_date".into(),
                label: "Fecha de visita".into(),
                kind: FieldKind::Date,
                description: String::new(),
                options: vec![],
            },
        ]
    }

    async fn tool_with_contact() -> (Arc<InMemoryStore>, ContactId, UpdateContactTool) {
        let store = Arc::new(InMemoryStore::new());
        let contact_id = store.create_contact(Contact::new("ws_1")).await.unwrap();
        let tool = UpdateContactTool::new(
            store.clone(),
            "ws_1".into(),
            Some(contact_id.clone()),
            fields(),
        );
        (store, contact_id, tool)
    }

    #[tokio::test]
    async fn missing_contact_yields_structured_failure() {
        let store = Arc::new(InMemoryStore::new());
        let tool = UpdateContactTool::new(store, "ws_1".into(), None, fields());

        let result = tool
            .execute(serde_json::json!({"updates": {"status": "Interesado"}}))
            .await
            .unwrap();

        assert!(!result.success);
        let payload: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(payload["success"], false);
        assert!(payload["error"]
            .as_str()
            .unwrap()
            .contains("contacto vinculado"));
    }

    #[tokio::test]
    async fn writes_recognized_select_value() {
        let (store, contact_id, tool) = tool_with_contact().await;

        let result = tool
            .execute(serde_json::json!({"updates": {"status": "Interesado"}}))
            .await
            .unwrap();

        assert!(result.success);
        let contact = store.get_contact(&contact_id).await.unwrap().unwrap();
        assert_eq!(contact.custom_data["status"], "Interesado");
    }

    #[tokio::test]
    async fn select_match_is_case_insensitive_and_canonicalized() {
        let (store, contact_id, tool) = tool_with_contact().await;

        let result = tool
            .execute(serde_json::json!({"updates": {"status": "interesado"}}))
            .await
            .unwrap();

        assert!(result.success);
        let contact = store.get_contact(&contact_id).await.unwrap().unwrap();
        // canonical option spelling is stored
        assert_eq!(contact.custom_data["status"], "Interesado");
    }

    #[tokio::test]
    async fn unknown_key_is_rejected_in_band() {
        let (store, contact_id, tool) = tool_with_contact().await;

        let result = tool
            .execute(serde_json::json!({"updates": {"nickname": "Anita"}}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("nickname"));
        // nothing was written
        let contact = store.get_contact(&contact_id).await.unwrap().unwrap();
        assert!(contact.custom_data.is_empty());
    }

    #[tokio::test]
    async fn invalid_select_option_is_rejected() {
        let (_store, _contact_id, tool) = tool_with_contact().await;

        let result = tool
            .execute(serde_json::json!({"updates": {"status": "Tal vez"}}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("status"));
    }

    #[tokio::test]
    async fn number_accepts_numeric_string() {
        let (store, contact_id, tool) = tool_with_contact().await;

        let result = tool
            .execute(serde_json::json!({"updates": {"budget": "1500"}}))
            .await
            .unwrap();

        assert!(result.success);
        let contact = store.get_contact(&contact_id).await.unwrap().unwrap();
        assert_eq!(contact.custom_data["budget"], 1500.0);
    }

    #[tokio::test]
    async fn date_requires_parseable_value() {
        let (_store, _contact_id, tool) = tool_with_contact().await;

        let ok = tool
            .execute(serde_json::json!({"updates": {"visit_date": "2026-08-10"}}))
            .await
            .unwrap();
        assert!(ok.success);

        let bad = tool
            .execute(serde_json::json!({"updates": {"visit_date": "mañana"}}))
            .await
            .unwrap();
        assert!(!bad.success);
    }

    #[tokio::test]
    async fn malformed_arguments_error_out() {
        let (_store, _contact_id, tool) = tool_with_contact().await;

        let err = tool
            .execute(serde_json::json!({"updates": "no es un objeto"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn empty_updates_rejected() {
        let (_store, _contact_id, tool) = tool_with_contact().await;

        let result = tool
            .execute(serde_json::json!({"updates": {}}))
            .await
            .unwrap();
        assert!(!result.success);
    }
}
