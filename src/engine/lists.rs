// wabot Engine — List Resolver
//
// Turns a list/buttons command into a plain-text numbered menu plus the
// PendingSelection that lets a later numeric reply find its option.
// Interactive WhatsApp lists/buttons are gone, so the menu is text only:
//
//   <intro>
//
//   *Bebidas*
//   1. Café: recién hecho
//   2. Té
//
//   *Postres*
//   3. Flan
//
//   📝 Responde con el número de la opción que deseas seleccionar.
//
// Numbering runs across sections without restarting. Untitled items are
// named after their place inside their own section.

use crate::atoms::constants::{LIST_NO_ITEMS, LIST_NO_SECTIONS, LIST_REPLY_INSTRUCTION};
use crate::atoms::error::EngineResult;
use crate::atoms::types::{Command, ListItem, SectionInfo};
use crate::engine::commands::CommandLookup;
use crate::engine::selections::{PendingSelection, SelectionOption};
use log::debug;
use std::collections::HashSet;
use std::fmt::Write;

/// A section header together with its items, as loaded from the repository.
#[derive(Debug, Clone)]
pub struct LoadedSection {
    pub info: SectionInfo,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone)]
pub enum ListResolution {
    /// Menu text and the options to register for the sender.
    Prompt { text: String, selection: PendingSelection },
    /// The command has no sections at all.
    NoSections { text: String },
    /// Sections exist but every one of them is empty.
    NoItems { text: String },
}

impl ListResolution {
    /// The message to send back, whatever the outcome.
    pub fn text(&self) -> &str {
        match self {
            ListResolution::Prompt { text, .. }
            | ListResolution::NoSections { text }
            | ListResolution::NoItems { text } => text,
        }
    }
}

/// Load sections in order and, for each, its items in order.
pub async fn load_sections(lookup: &dyn CommandLookup, command_id: u64) -> EngineResult<Vec<LoadedSection>> {
    let mut loaded = Vec::new();
    for info in lookup.load_sections(command_id).await? {
        let items = lookup.load_items(info.id).await?;
        loaded.push(LoadedSection { info, items });
    }
    Ok(loaded)
}

/// Load and render the menu for `command`.
pub async fn resolve_list(lookup: &dyn CommandLookup, command: &Command) -> EngineResult<ListResolution> {
    let sections = load_sections(lookup, command.id).await?;
    debug!(
        "[lists] Command {} has {} sections, {} items",
        command.id,
        sections.len(),
        sections.iter().map(|s| s.items.len()).sum::<usize>()
    );
    Ok(build_list_prompt(command.id, command.intro(), &sections))
}

/// Render the menu text and the matching selection. Never fails: missing
/// titles and row ids are synthesized, empty lists get an explanation.
pub fn build_list_prompt(command_id: u64, intro: &str, sections: &[LoadedSection]) -> ListResolution {
    if sections.is_empty() {
        return ListResolution::NoSections { text: format!("{}\n\n{}", intro, LIST_NO_SECTIONS) };
    }

    let mut text = format!("{}\n\n", intro);
    let mut options = Vec::new();

    for (shown, section) in sections.iter().filter(|s| !s.items.is_empty()).enumerate() {
        let heading = if section.info.title.trim().is_empty() {
            format!("Sección {}", shown + 1)
        } else {
            section.info.title.clone()
        };
        let _ = writeln!(text, "*{}*", heading);

        let mut taken: HashSet<String> =
            section.items.iter().filter(|i| !i.row_id.is_empty()).map(|i| i.row_id.clone()).collect();

        for (index, item) in section.items.iter().enumerate() {
            let number = options.len() as u32 + 1;
            let title = if item.title.trim().is_empty() {
                format!("Opción {}", index + 1)
            } else {
                item.title.clone()
            };
            let description = item.description.clone().filter(|d| !d.trim().is_empty());
            let item_id = if item.row_id.is_empty() {
                synthesize_item_id(section.info.id, index, &mut taken)
            } else {
                item.row_id.clone()
            };

            match &description {
                Some(desc) => {
                    let _ = writeln!(text, "{}. {}: {}", number, title, desc);
                }
                None => {
                    let _ = writeln!(text, "{}. {}", number, title);
                }
            }

            options.push(SelectionOption {
                number,
                title,
                description,
                section_id: section.info.id,
                item_id,
                response: item.response.clone(),
            });
        }
        text.push('\n');
    }

    if options.is_empty() {
        return ListResolution::NoItems { text: format!("{}\n\n{}", intro, LIST_NO_ITEMS) };
    }

    text.push_str(LIST_REPLY_INSTRUCTION);
    ListResolution::Prompt { text, selection: PendingSelection::new(command_id, options) }
}

/// `item_<section>_<index>`, suffixed until it clashes with no explicit
/// row id of the same section.
fn synthesize_item_id(section_id: u64, index: usize, taken: &mut HashSet<String>) -> String {
    let base = format!("item_{}_{}", section_id, index);
    let mut id = base.clone();
    let mut k = 1;
    while taken.contains(&id) {
        id = format!("{}_{}", base, k);
        k += 1;
    }
    taken.insert(id.clone());
    id
}
