// ── wabot Atoms: Data Types ────────────────────────────────────────────────
// Command records, list sections/items and inbound messages.
//
// Field names are snake_case. Admin payloads written by older tooling used
// camelCase (`usePrefix`, `responseType`, …); those are accepted as serde
// aliases here so nothing past this boundary ever sees two spellings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Response type ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Text,
    List,
    /// Legacy interactive buttons. WhatsApp dropped them, so they are
    /// rendered exactly like a list.
    Buttons,
}

impl ResponseType {
    /// True for response types answered with a numbered option menu.
    pub fn is_interactive(self) -> bool {
        matches!(self, ResponseType::List | ResponseType::Buttons)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::Text => "text",
            ResponseType::List => "list",
            ResponseType::Buttons => "buttons",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ResponseType::Text),
            "list" => Ok(ResponseType::List),
            "buttons" => Ok(ResponseType::Buttons),
            other => Err(format!("unknown response type '{}'", other)),
        }
    }
}

// Stored and admin payloads are hand-edited; accept any casing on the way in.
impl<'de> Deserialize<'de> for ResponseType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(serde::de::Error::custom)
    }
}

// ── Commands ───────────────────────────────────────────────────────────────

/// One selectable row of a list command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListItem {
    /// Caller-supplied id, unique within its section. May be empty; the list
    /// resolver then synthesizes one.
    #[serde(alias = "rowId")]
    pub row_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Text sent when the user picks this row.
    pub response: String,
}

impl ListItem {
    pub fn new(title: impl Into<String>, response: impl Into<String>) -> Self {
        ListItem { title: title.into(), response: response.into(), ..Default::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_row_id(mut self, row_id: impl Into<String>) -> Self {
        self.row_id = row_id.into();
        self
    }
}

/// Ordered group of items inside a list command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSection {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<ListItem>,
}

/// Section header as returned by [`crate::engine::commands::CommandLookup::load_sections`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub id: u64,
    pub title: String,
}

impl From<&ListSection> for SectionInfo {
    fn from(section: &ListSection) -> Self {
        SectionInfo { id: section.id, title: section.title.clone() }
    }
}

/// A stored trigger/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    /// Normalized trigger: trimmed, lowercase, prefixed iff `use_prefix`.
    pub command: String,
    /// Reply text. For list commands this is the intro fallback.
    #[serde(default)]
    pub response: String,
    #[serde(alias = "usePrefix")]
    pub use_prefix: bool,
    #[serde(default, alias = "responseType")]
    pub response_type: ResponseType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "introText")]
    pub intro_text: Option<String>,
    #[serde(default)]
    pub sections: Vec<ListSection>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command {
    /// All items across all sections, in order.
    pub fn items(&self) -> impl Iterator<Item = &ListItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    /// Text shown above a list menu: `intro_text`, else `response`.
    pub fn intro(&self) -> &str {
        match self.intro_text.as_deref() {
            Some(intro) if !intro.trim().is_empty() => intro,
            _ => &self.response,
        }
    }
}

// ── Admin input ────────────────────────────────────────────────────────────

/// Section payload for create/update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSection {
    pub title: String,
    pub items: Vec<ListItem>,
}

/// Payload for creating a command. Unset options take the defaults
/// (`use_prefix = true`, `response_type = text`, `created_by = "admin"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCommand {
    pub command: String,
    pub response: String,
    #[serde(alias = "usePrefix")]
    pub use_prefix: Option<bool>,
    #[serde(alias = "responseType")]
    pub response_type: Option<ResponseType>,
    pub title: Option<String>,
    #[serde(alias = "introText")]
    pub intro_text: Option<String>,
    #[serde(alias = "createdBy")]
    pub created_by: Option<String>,
    pub sections: Vec<NewSection>,
    /// Flat item list; stored as a single "Default Section" when `sections`
    /// is empty.
    pub items: Vec<ListItem>,
}

impl NewCommand {
    pub fn text(command: impl Into<String>, response: impl Into<String>) -> Self {
        NewCommand { command: command.into(), response: response.into(), ..Default::default() }
    }

    pub fn list(command: impl Into<String>, title: impl Into<String>, intro: impl Into<String>) -> Self {
        NewCommand {
            command: command.into(),
            response_type: Some(ResponseType::List),
            title: Some(title.into()),
            intro_text: Some(intro.into()),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, use_prefix: bool) -> Self {
        self.use_prefix = Some(use_prefix);
        self
    }

    pub fn with_section(mut self, title: impl Into<String>, items: Vec<ListItem>) -> Self {
        self.sections.push(NewSection { title: title.into(), items });
        self
    }
}

/// Partial update of a command. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandPatch {
    pub command: Option<String>,
    pub response: Option<String>,
    #[serde(alias = "usePrefix")]
    pub use_prefix: Option<bool>,
    #[serde(alias = "responseType")]
    pub response_type: Option<ResponseType>,
    pub title: Option<String>,
    #[serde(alias = "introText")]
    pub intro_text: Option<String>,
    /// Replaces all sections of an interactive command.
    pub sections: Option<Vec<NewSection>>,
    /// Replaces all sections with a single default section.
    pub items: Option<Vec<ListItem>>,
}

// ── Inbound messages ───────────────────────────────────────────────────────

/// One received chat message, as handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Chat identifier replies go to (WhatsApp JID). Keys pending selections.
    pub sender_key: String,
    /// Sender id with the JID domain stripped.
    pub sender_id: String,
    pub push_name: String,
    pub body: String,
    pub is_group: bool,
}

impl InboundMessage {
    /// Direct message from `sender_key`, mostly for tests and local tooling.
    pub fn direct(sender_key: impl Into<String>, body: impl Into<String>) -> Self {
        let sender_key = sender_key.into();
        let sender_id = sender_key.split('@').next().unwrap_or(&sender_key).to_string();
        InboundMessage {
            push_name: sender_id.clone(),
            sender_id,
            sender_key,
            body: body.into(),
            is_group: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_type_parses_case_insensitive() {
        assert_eq!("LIST".parse::<ResponseType>().unwrap(), ResponseType::List);
        assert_eq!(" buttons ".parse::<ResponseType>().unwrap(), ResponseType::Buttons);
        assert!("carousel".parse::<ResponseType>().is_err());
    }

    #[test]
    fn response_type_deserializes_any_casing() {
        let cmd: NewCommand = serde_json::from_str(r#"{"command":"menu","responseType":" List "}"#).unwrap();
        assert_eq!(cmd.response_type, Some(ResponseType::List));
        assert!(serde_json::from_str::<ResponseType>(r#""carousel""#).is_err());
        assert_eq!(serde_json::to_string(&ResponseType::Buttons).unwrap(), r#""buttons""#);
    }

    #[test]
    fn buttons_are_interactive() {
        assert!(ResponseType::Buttons.is_interactive());
        assert!(ResponseType::List.is_interactive());
        assert!(!ResponseType::Text.is_interactive());
    }

    #[test]
    fn new_command_accepts_camel_case_aliases() {
        let json = r#"{"command":"menu","response":"x","usePrefix":false,"responseType":"list","introText":"Elige:"}"#;
        let cmd: NewCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.use_prefix, Some(false));
        assert_eq!(cmd.response_type, Some(ResponseType::List));
        assert_eq!(cmd.intro_text.as_deref(), Some("Elige:"));
    }

    #[test]
    fn intro_falls_back_to_response() {
        let cmd = Command {
            id: 1,
            command: "!menu".into(),
            response: "Opciones:".into(),
            use_prefix: true,
            response_type: ResponseType::List,
            title: Some("Menu".into()),
            intro_text: Some("   ".into()),
            sections: vec![],
            created_by: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(cmd.intro(), "Opciones:");
    }

    #[test]
    fn direct_message_strips_jid_domain() {
        let msg = InboundMessage::direct("5215512345678@s.whatsapp.net", "hola");
        assert_eq!(msg.sender_id, "5215512345678");
        assert!(!msg.is_group);
    }
}
