//! Agent configuration entities.
//!
//! An `AgentProfile` is the full configuration of one conversational agent:
//! which model it talks to, how it speaks, what job it performs, and which
//! contact fields it tries to collect. The profile is read once per reply
//! cycle and treated as immutable for the duration of the turn.

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarConfig;

/// Which provider API family a model belongs to.
///
/// Selection is explicit — never inferred from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// OpenAI-style chat-completions API.
    OpenAi,
    /// Google Gemini generateContent API.
    Gemini,
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// A fully qualified model reference: provider family + model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub family: ProviderFamily,
    pub name: String,
}

impl ModelRef {
    pub fn openai(name: impl Into<String>) -> Self {
        Self {
            family: ProviderFamily::OpenAi,
            name: name.into(),
        }
    }

    pub fn gemini(name: impl Into<String>) -> Self {
        Self {
            family: ProviderFamily::Gemini,
            name: name.into(),
        }
    }
}

/// The register the agent uses when talking to visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Formal,
    Normal,
    Casual,
}

impl Default for CommunicationStyle {
    fn default() -> Self {
        Self::Normal
    }
}

/// What role the agent plays for the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Support,
    Sales,
    Personal,
}

/// The agent's job framing: role plus optional business context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProfile {
    pub kind: JobKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl JobProfile {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            company: None,
            website: None,
            description: None,
        }
    }
}

/// Boolean behavior switches on the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorFlags {
    /// When false, the prompt carries an explicit "no emojis" directive.
    /// When true, no directive is emitted at all.
    #[serde(default = "default_true")]
    pub allow_emojis: bool,

    #[serde(default)]
    pub sign_messages: bool,

    #[serde(default)]
    pub restrict_topics: bool,

    #[serde(default)]
    pub split_long_messages: bool,

    #[serde(default)]
    pub allow_reminders: bool,

    /// Whether knowledge retrieval runs before the prompt is built.
    #[serde(default = "default_true")]
    pub smart_retrieval: bool,

    #[serde(default)]
    pub transfer_to_human: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BehaviorFlags {
    fn default() -> Self {
        Self {
            allow_emojis: true,
            sign_messages: false,
            restrict_topics: false,
            split_long_messages: false,
            allow_reminders: false,
            smart_retrieval: true,
            transfer_to_human: false,
        }
    }
}

/// The value type of a custom contact field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Date,
    Select,
}

/// A named, typed slot the agent tries to fill on a Contact.
///
/// `key` is the stable machine identifier referenced by the model's
/// tool-call contract — changing it breaks in-flight extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub key: String,

    pub label: String,

    pub kind: FieldKind,

    /// Guidance text shown to the model.
    #[serde(default)]
    pub description: String,

    /// Valid values, ordered. Only meaningful for `Select` fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Full configuration of one conversational agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,

    pub workspace_id: String,

    /// Display name; also used for the signature directive.
    pub name: String,

    pub model: ModelRef,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Free-text personality/behavior prompt, inserted verbatim.
    #[serde(default)]
    pub personality: String,

    #[serde(default)]
    pub style: CommunicationStyle,

    pub job: JobProfile,

    #[serde(default)]
    pub flags: BehaviorFlags,

    /// IANA timezone string (e.g. "America/Mexico_City").
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomFieldDef>,

    /// Google Calendar integration, when connected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<CalendarConfig>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timezone() -> String {
    "UTC".into()
}

impl AgentProfile {
    /// Look up a custom field definition by its stable key.
    pub fn field(&self, key: &str) -> Option<&CustomFieldDef> {
        self.custom_fields.iter().find(|f| f.key == key)
    }

    /// Whether this agent has a connected and enabled calendar integration.
    pub fn calendar_enabled(&self) -> bool {
        self.calendar.as_ref().is_some_and(|c| c.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AgentProfile {
        AgentProfile {
            id: "agent_1".into(),
            workspace_id: "ws_1".into(),
            name: "Sofía".into(),
            model: ModelRef::openai("gpt-4o-mini"),
            temperature: 0.7,
            personality: "Amable y directa.".into(),
            style: CommunicationStyle::Normal,
            job: JobProfile::new(JobKind::Support),
            flags: BehaviorFlags::default(),
            timezone: "UTC".into(),
            custom_fields: vec![CustomFieldDef {
                key: "status".into(),
                label: "Estado".into(),
                kind: FieldKind::Select,
                description: "Nivel de interés".into(),
                options: vec!["Interesado".into(), "No interesado".into()],
            }],
            calendar: None,
        }
    }

    #[test]
    fn field_lookup_by_key() {
        let agent = profile();
        assert!(agent.field("status").is_some());
        assert!(agent.field("missing").is_none());
    }

    #[test]
    fn default_flags_allow_emojis_and_retrieval() {
        let flags = BehaviorFlags::default();
        assert!(flags.allow_emojis);
        assert!(flags.smart_retrieval);
        assert!(!flags.restrict_topics);
    }

    #[test]
    fn model_ref_constructors() {
        let m = ModelRef::gemini("gemini-1.5-flash");
        assert_eq!(m.family, ProviderFamily::Gemini);
        assert_eq!(m.name, "gemini-1.5-flash");
    }

    #[test]
    fn profile_serialization_roundtrip() {
        let agent = profile();
        let json = serde_json::to_string(&agent).unwrap();
        let back: AgentProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "agent_1");
        assert_eq!(back.custom_fields.len(), 1);
        assert_eq!(back.custom_fields[0].options.len(), 2);
    }

    #[test]
    fn calendar_enabled_requires_flag() {
        let mut agent = profile();
        assert!(!agent.calendar_enabled());

        agent.calendar = Some(CalendarConfig {
            enabled: false,
            calendar_id: "primary".into(),
            credentials: serde_json::json!({}),
            timezone: None,
        });
        assert!(!agent.calendar_enabled());

        agent.calendar.as_mut().unwrap().enabled = true;
        assert!(agent.calendar_enabled());
    }
}
