//! Model-callable tool implementations for the Konsul reply engine.
//!
//! Tools are bound per reply turn: `update_contact` targets the
//! conversation's linked contact and validates against the agent's custom
//! field definitions; the calendar tools carry the agent's stored
//! integration config.

pub mod calendar;
pub mod update_contact;

use std::sync::Arc;

use konsul_core::agent::AgentProfile;
use konsul_core::calendar::CalendarClient;
use konsul_core::contact::ContactId;
use konsul_core::store::ContactStore;
use konsul_core::tool::ToolRegistry;

pub use calendar::{CheckAvailabilityTool, ScheduleEventTool};
pub use update_contact::UpdateContactTool;

/// Build the tool registry for one reply turn.
///
/// `update_contact` is always registered. The calendar tools join only when
/// a calendar client is passed in (sandbox mode) and the agent's integration
/// is enabled.
pub fn registry_for_turn(
    agent: &AgentProfile,
    contact_id: Option<ContactId>,
    contacts: Arc<dyn ContactStore>,
    calendar: Option<Arc<dyn CalendarClient>>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Box::new(UpdateContactTool::new(
        contacts,
        agent.workspace_id.clone(),
        contact_id,
        agent.custom_fields.clone(),
    )));

    if let (Some(client), Some(config)) = (calendar, agent.calendar.as_ref()) {
        if config.enabled {
            registry.register(Box::new(CheckAvailabilityTool::new(
                client.clone(),
                config.clone(),
            )));
            registry.register(Box::new(ScheduleEventTool::new(client, config.clone())));
        }
    }

    registry
}
