//! Calendar scheduling tools: `revisar_disponibilidad` and `agendar_cita`.
//!
//! Both wrap the opaque `CalendarClient` collaborator with the agent's
//! stored integration config. Downstream failures come back as structured
//! in-band tool responses so the model can apologize or retry wording.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use konsul_core::calendar::{CalendarClient, CalendarConfig, EventDraft};
use konsul_core::error::ToolError;
use konsul_core::tool::{Tool, ToolResult};

pub const CHECK_AVAILABILITY_NAME: &str = "revisar_disponibilidad";
pub const SCHEDULE_EVENT_NAME: &str = "agendar_cita";

/// Check busy/free slots for a date.
pub struct CheckAvailabilityTool {
    client: Arc<dyn CalendarClient>,
    config: CalendarConfig,
}

impl CheckAvailabilityTool {
    pub fn new(client: Arc<dyn CalendarClient>, config: CalendarConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &str {
        CHECK_AVAILABILITY_NAME
    }

    fn description(&self) -> &str {
        "Consulta la disponibilidad del calendario para una fecha. \
         Úsala antes de proponer un horario de cita."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "date": {
                    "type": "string",
                    "description": "Fecha a consultar, formato YYYY-MM-DD"
                }
            },
            "required": ["date"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let Some(date_str) = arguments.get("date").and_then(|d| d.as_str()) else {
            return Ok(ToolResult::failure("Falta la fecha, usa el formato YYYY-MM-DD"));
        };

        let Ok(date) = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d") else {
            return Ok(ToolResult::failure(format!(
                "Fecha inválida '{date_str}', usa el formato YYYY-MM-DD"
            )));
        };

        match self.client.list_available_slots(&self.config, date).await {
            Ok(slots) => {
                let slots: Vec<serde_json::Value> = slots
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "start": s.start.to_rfc3339(),
                            "end": s.end.to_rfc3339(),
                            "busy": s.busy,
                        })
                    })
                    .collect();
                Ok(ToolResult::success(serde_json::json!({
                    "success": true,
                    "date": date_str,
                    "slots": slots,
                })))
            }
            Err(e) => {
                warn!(date = %date, error = %e, "Availability lookup failed");
                Ok(ToolResult::failure(format!(
                    "No se pudo consultar el calendario: {e}"
                )))
            }
        }
    }
}

/// Create a calendar event.
pub struct ScheduleEventTool {
    client: Arc<dyn CalendarClient>,
    config: CalendarConfig,
}

impl ScheduleEventTool {
    pub fn new(client: Arc<dyn CalendarClient>, config: CalendarConfig) -> Self {
        Self { client, config }
    }

    fn parse_datetime(value: Option<&serde_json::Value>, field: &str) -> Result<DateTime<Utc>, String> {
        let Some(s) = value.and_then(|v| v.as_str()) else {
            return Err(format!("Falta '{field}' (fecha y hora en formato ISO 8601)"));
        };
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| format!("'{field}' inválido, usa formato ISO 8601 (por ejemplo 2026-08-10T15:00:00Z)"))
    }
}

#[async_trait]
impl Tool for ScheduleEventTool {
    fn name(&self) -> &str {
        SCHEDULE_EVENT_NAME
    }

    fn description(&self) -> &str {
        "Agenda una cita en el calendario. Confirma antes la fecha y hora con el usuario."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Título de la cita"
                },
                "description": {
                    "type": "string",
                    "description": "Detalle opcional de la cita"
                },
                "start": {
                    "type": "string",
                    "description": "Inicio, formato ISO 8601"
                },
                "end": {
                    "type": "string",
                    "description": "Fin, formato ISO 8601"
                },
                "attendee_email": {
                    "type": "string",
                    "description": "Correo del invitado (opcional)"
                }
            },
            "required": ["summary", "start", "end"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let Some(summary) = arguments
            .get("summary")
            .and_then(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
        else {
            return Ok(ToolResult::failure("Falta el título de la cita"));
        };

        let start = match Self::parse_datetime(arguments.get("start"), "start") {
            Ok(dt) => dt,
            Err(message) => return Ok(ToolResult::failure(message)),
        };
        let end = match Self::parse_datetime(arguments.get("end"), "end") {
            Ok(dt) => dt,
            Err(message) => return Ok(ToolResult::failure(message)),
        };

        if end <= start {
            return Ok(ToolResult::failure(
                "El fin de la cita debe ser posterior al inicio",
            ));
        }

        let draft = EventDraft {
            summary: summary.trim().to_string(),
            description: arguments
                .get("description")
                .and_then(|d| d.as_str())
                .map(String::from),
            start,
            end,
            attendee_email: arguments
                .get("attendee_email")
                .and_then(|e| e.as_str())
                .map(String::from),
        };

        match self.client.create_event(&self.config, draft).await {
            Ok(event) => Ok(ToolResult::success(serde_json::json!({
                "success": true,
                "event": {
                    "id": event.id,
                    "htmlLink": event.html_link,
                    "start": event.start.to_rfc3339(),
                    "end": event.end.to_rfc3339(),
                },
            }))),
            Err(e) => {
                warn!(error = %e, "Event creation failed");
                Ok(ToolResult::failure(format!("No se pudo agendar la cita: {e}")))
            }
        }
    }
}
