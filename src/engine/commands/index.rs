// In-memory command index.
//
// Holds every command in registration order behind a parking_lot RwLock.
// Lookups are linear scans; the table is admin-curated and small.
// Persistence is a JSON snapshot written atomically (tmp file + rename).

use super::normalize::normalize_command;
use super::CommandLookup;
use crate::atoms::constants::{DEFAULT_CREATED_BY, DEFAULT_PREFIX};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{
    Command, CommandPatch, ListItem, ListSection, NewCommand, NewSection, ResponseType, SectionInfo,
};
use async_trait::async_trait;
use log::{info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::Path;

/// Title given to the section created from a flat item list.
const DEFAULT_SECTION_TITLE: &str = "Default Section";

#[derive(Debug, Default)]
struct IndexState {
    commands: Vec<Command>,
    next_command_id: u64,
    next_section_id: u64,
}

impl IndexState {
    fn from_commands(commands: Vec<Command>) -> Self {
        let next_command_id = commands.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let next_section_id = commands
            .iter()
            .flat_map(|c| c.sections.iter().map(|s| s.id))
            .max()
            .unwrap_or(0)
            + 1;
        IndexState { commands, next_command_id, next_section_id }
    }

    fn is_taken(&self, command: &str, exclude: Option<u64>) -> bool {
        self.commands.iter().any(|c| c.command == command && Some(c.id) != exclude)
    }

    fn materialize(&mut self, sections: Vec<NewSection>) -> Vec<ListSection> {
        sections
            .into_iter()
            .map(|s| {
                let id = self.next_section_id;
                self.next_section_id += 1;
                ListSection { id, title: s.title, items: s.items }
            })
            .collect()
    }
}

/// On-disk snapshot format.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    commands: Vec<Command>,
}

/// Command table keyed by normalized command text.
pub struct CommandIndex {
    prefix: char,
    state: RwLock<IndexState>,
}

impl Default for CommandIndex {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl CommandIndex {
    pub fn new(prefix: char) -> Self {
        CommandIndex {
            prefix,
            state: RwLock::new(IndexState { next_command_id: 1, next_section_id: 1, ..Default::default() }),
        }
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Load a snapshot written by [`save_json`](Self::save_json).
    /// A missing file yields an empty index.
    pub fn load_json(path: &Path, prefix: char) -> EngineResult<Self> {
        if !path.exists() {
            info!("[commands] No command file at {:?}, starting empty", path);
            return Ok(Self::new(prefix));
        }
        let raw = std::fs::read_to_string(path)?;
        let mut snapshot: Snapshot = serde_json::from_str(&raw)?;

        // Hand-edited files may carry "Hola" or "!menu " verbatim.
        for cmd in &mut snapshot.commands {
            cmd.command = normalize_command(&cmd.command, cmd.use_prefix, prefix);
        }
        let mut seen = HashSet::new();
        for cmd in &snapshot.commands {
            if !seen.insert(cmd.command.as_str()) {
                warn!("[commands] Duplicate command '{}' in {:?}; first one wins", cmd.command, path);
            }
        }

        info!("[commands] Loaded {} commands from {:?}", snapshot.commands.len(), path);
        Ok(CommandIndex { prefix, state: RwLock::new(IndexState::from_commands(snapshot.commands)) })
    }

    pub fn save_json(&self, path: &Path) -> EngineResult<()> {
        let json = {
            let state = self.state.read();
            serde_json::to_string_pretty(&Snapshot { commands: state.commands.clone() })?
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn get(&self, id: u64) -> Option<Command> {
        self.state.read().commands.iter().find(|c| c.id == id).cloned()
    }

    /// All commands (optionally of one type), ordered by command text.
    pub fn list(&self, response_type: Option<ResponseType>) -> Vec<Command> {
        let mut out: Vec<Command> = self
            .state
            .read()
            .commands
            .iter()
            .filter(|c| response_type.is_none_or(|t| c.response_type == t))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.command.cmp(&b.command));
        out
    }

    /// Whether the already-normalized `command` is taken by another id.
    pub fn exists(&self, command: &str, exclude: Option<u64>) -> bool {
        self.state.read().is_taken(command, exclude)
    }

    pub fn len(&self) -> usize {
        self.state.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, pred: impl Fn(&Command) -> bool) -> Option<Command> {
        self.state.read().commands.iter().find(|c| pred(c)).cloned()
    }

    // ── Admin ──────────────────────────────────────────────────────────

    pub fn create(&self, new: NewCommand) -> EngineResult<Command> {
        if new.command.trim().is_empty() {
            return Err(EngineError::Validation("command text is required".into()));
        }
        let use_prefix = new.use_prefix.unwrap_or(true);
        let response_type = new.response_type.unwrap_or_default();
        let command = self.normalized(&new.command, use_prefix)?;

        let (title, intro_text) = if response_type.is_interactive() {
            (non_empty(new.title), non_empty(new.intro_text))
        } else {
            (None, None)
        };
        validate_content(response_type, &new.response, title.as_deref())?;
        let sections = if response_type.is_interactive() {
            collect_sections(new.sections, new.items)?
        } else {
            Vec::new()
        };

        let mut state = self.state.write();
        if state.is_taken(&command, None) {
            return Err(EngineError::Duplicate(command));
        }
        let id = state.next_command_id;
        state.next_command_id += 1;
        let sections = state.materialize(sections);

        let created = Command {
            id,
            command,
            response: new.response,
            use_prefix,
            response_type,
            title,
            intro_text,
            sections,
            created_by: Some(new.created_by.unwrap_or_else(|| DEFAULT_CREATED_BY.to_string())),
            created_at: chrono::Utc::now(),
            updated_at: None,
        };
        state.commands.push(created.clone());
        info!("[commands] Created {} command '{}' (id {})", created.response_type, created.command, id);
        Ok(created)
    }

    pub fn update(&self, id: u64, patch: CommandPatch) -> EngineResult<Command> {
        let mut state = self.state.write();
        let pos = state.commands.iter().position(|c| c.id == id).ok_or(EngineError::NotFound(id))?;
        let mut updated = state.commands[pos].clone();

        if patch.command.is_some() || patch.use_prefix.is_some() {
            let use_prefix = patch.use_prefix.unwrap_or(updated.use_prefix);
            let base = patch.command.as_deref().unwrap_or(&updated.command);
            let command = self.normalized(base, use_prefix)?;
            if state.is_taken(&command, Some(id)) {
                return Err(EngineError::Duplicate(command));
            }
            updated.command = command;
            updated.use_prefix = use_prefix;
        }
        if let Some(response) = patch.response {
            updated.response = response;
        }
        if let Some(response_type) = patch.response_type {
            updated.response_type = response_type;
        }
        if updated.response_type.is_interactive() {
            if patch.title.is_some() {
                updated.title = non_empty(patch.title);
            }
            if patch.intro_text.is_some() {
                updated.intro_text = non_empty(patch.intro_text);
            }
        } else {
            updated.title = None;
            updated.intro_text = None;
            updated.sections.clear();
        }
        validate_content(updated.response_type, &updated.response, updated.title.as_deref())?;

        if updated.response_type.is_interactive() && (patch.sections.is_some() || patch.items.is_some()) {
            let sections = collect_sections(patch.sections.unwrap_or_default(), patch.items.unwrap_or_default())?;
            updated.sections = state.materialize(sections);
        }

        updated.updated_at = Some(chrono::Utc::now());
        state.commands[pos] = updated.clone();
        info!("[commands] Updated command '{}' (id {})", updated.command, id);
        Ok(updated)
    }

    /// Remove a command together with all of its sections and items.
    pub fn delete(&self, id: u64) -> EngineResult<Command> {
        let mut state = self.state.write();
        let pos = state.commands.iter().position(|c| c.id == id).ok_or(EngineError::NotFound(id))?;
        let removed = state.commands.remove(pos);
        info!(
            "[commands] Deleted command '{}' (id {}, {} sections)",
            removed.command,
            id,
            removed.sections.len()
        );
        Ok(removed)
    }

    fn normalized(&self, raw: &str, use_prefix: bool) -> EngineResult<String> {
        let command = normalize_command(raw, use_prefix, self.prefix);
        let bare = command.strip_prefix(self.prefix).unwrap_or(&command);
        if bare.is_empty() {
            return Err(EngineError::Validation(format!("'{}' has no command text", raw.trim())));
        }
        Ok(command)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_content(response_type: ResponseType, response: &str, title: Option<&str>) -> EngineResult<()> {
    if response_type.is_interactive() {
        if title.is_none() {
            return Err(EngineError::Validation("title is required for list commands".into()));
        }
    } else if response.trim().is_empty() {
        return Err(EngineError::Validation("response is required".into()));
    }
    Ok(())
}

/// Merge explicit sections with a flat item list and reject row ids that
/// repeat within one section.
fn collect_sections(mut sections: Vec<NewSection>, items: Vec<ListItem>) -> EngineResult<Vec<NewSection>> {
    if sections.is_empty() && !items.is_empty() {
        sections.push(NewSection { title: DEFAULT_SECTION_TITLE.into(), items });
    }
    for section in &sections {
        let mut seen = HashSet::new();
        for item in section.items.iter().filter(|i| !i.row_id.is_empty()) {
            if !seen.insert(item.row_id.as_str()) {
                return Err(EngineError::Validation(format!(
                    "row id '{}' repeats in section '{}'",
                    item.row_id, section.title
                )));
            }
        }
    }
    Ok(sections)
}

#[async_trait]
impl CommandLookup for CommandIndex {
    async fn find_prefixed(&self, text: &str) -> EngineResult<Option<Command>> {
        Ok(self.find(|c| c.use_prefix && c.command == text))
    }

    async fn find_unprefixed_exact(&self, text: &str) -> EngineResult<Option<Command>> {
        Ok(self.find(|c| !c.use_prefix && c.command == text))
    }

    /// Longest contained command wins; equal lengths go to the earliest
    /// registered command.
    async fn find_unprefixed_substring(&self, text: &str) -> EngineResult<Option<Command>> {
        let state = self.state.read();
        Ok(state
            .commands
            .iter()
            .filter(|c| !c.use_prefix && !c.command.is_empty() && text.contains(c.command.as_str()))
            .min_by_key(|c| (Reverse(c.command.chars().count()), c.id))
            .cloned())
    }

    async fn load_sections(&self, command_id: u64) -> EngineResult<Vec<SectionInfo>> {
        let state = self.state.read();
        let cmd = state
            .commands
            .iter()
            .find(|c| c.id == command_id)
            .ok_or_else(|| EngineError::Lookup(format!("command {} vanished", command_id)))?;
        Ok(cmd.sections.iter().map(SectionInfo::from).collect())
    }

    async fn load_items(&self, section_id: u64) -> EngineResult<Vec<ListItem>> {
        let state = self.state.read();
        Ok(state
            .commands
            .iter()
            .flat_map(|c| c.sections.iter())
            .find(|s| s.id == section_id)
            .map(|s| s.items.clone())
            .unwrap_or_default())
    }

    async fn prefixed_commands(&self) -> EngineResult<Vec<String>> {
        Ok(self
            .state
            .read()
            .commands
            .iter()
            .filter(|c| c.use_prefix)
            .map(|c| c.command.clone())
            .collect())
    }
}
