// wabot Engine — Command Repository
//
// Module layout:
//   normalize — normalize_command, is_prefixed
//   index     — CommandIndex: in-memory store, lookup strategies, admin CRUD,
//               JSON snapshot persistence
//
// The dispatcher only sees the `CommandLookup` trait so a database-backed
// repository can be swapped in without touching the matching logic.

mod index;
mod normalize;

use crate::atoms::error::EngineResult;
use crate::atoms::types::{Command, ListItem, SectionInfo};
use async_trait::async_trait;

pub use index::CommandIndex;
pub use normalize::{is_prefixed, normalize_command};

/// Read side of the command repository, as consumed by the dispatcher.
///
/// All `text` arguments are already lowercased by the caller. Implementations
/// may fail (storage unavailable); the dispatcher treats failures as "no
/// match" and bounds every call with a timeout.
#[async_trait]
pub trait CommandLookup: Send + Sync {
    /// `use_prefix = true` command whose normalized text equals `text`.
    async fn find_prefixed(&self, text: &str) -> EngineResult<Option<Command>>;

    /// `use_prefix = false` command equal to the whole of `text`.
    async fn find_unprefixed_exact(&self, text: &str) -> EngineResult<Option<Command>>;

    /// `use_prefix = false` command contained anywhere in `text`.
    async fn find_unprefixed_substring(&self, text: &str) -> EngineResult<Option<Command>>;

    /// Sections of a command, in display order.
    async fn load_sections(&self, command_id: u64) -> EngineResult<Vec<SectionInfo>>;

    /// Items of a section, in display order.
    async fn load_items(&self, section_id: u64) -> EngineResult<Vec<ListItem>>;

    /// Normalized text of every prefixed command, used for suggestions.
    async fn prefixed_commands(&self) -> EngineResult<Vec<String>> {
        Ok(Vec::new())
    }
}
