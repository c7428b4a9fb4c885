// wabot — WhatsApp command bot core.

pub mod atoms;
pub mod engine;

pub use atoms::error::{EngineError, EngineResult};
pub use atoms::types::{Command, InboundMessage, ListItem, NewCommand, ResponseType};
pub use engine::bot::{BotHandler, HandleOutcome};
pub use engine::channels::ReplySender;
pub use engine::commands::{CommandIndex, CommandLookup};
pub use engine::config::BotConfig;
pub use engine::dispatcher::{DispatchConfig, DispatchOutcome, Dispatcher};
pub use engine::selections::{PendingSelection, PendingSelectionStore, SelectionLookup, SelectionOption};
