// wabot Engine — Message Dispatcher
//
// Per inbound message, strictly in this order:
//   1. bare number  → resolve against the sender's pending selection
//   2. prefixed     → exact match on a use_prefix command
//   3. unprefixed   → exact match on the whole text
//   4. unprefixed   → command contained in the text
//   5. nothing      → DispatchOutcome::NoCommand (caller decides)
//
// A numeric reply with no live selection falls through to 2–4, so a command
// literally named "1" still works. Nothing in here returns an error: lookup
// failures and timeouts count as "no match", send failures are logged.

use crate::atoms::constants::{
    COMMAND_SEND_FAILED, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_PREFIX, LIST_LOAD_FAILED,
};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Command, InboundMessage};
use crate::engine::channels::ReplySender;
use crate::engine::commands::{is_prefixed, CommandLookup};
use crate::engine::lists::{resolve_list, ListResolution};
use crate::engine::selections::{PendingSelectionStore, SelectionLookup, SelectionOption};
use log::{debug, error, info, warn};
use regex::Regex;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static NUMERIC_REPLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("static regex"));

/// Number carried by a bare numeric reply. Values too large for `u32`
/// cannot be option numbers and are treated as plain text.
pub fn parse_numeric_reply(text: &str) -> Option<u32> {
    if NUMERIC_REPLY.is_match(text) {
        text.parse().ok()
    } else {
        None
    }
}

/// Reply for a resolved option: its configured response, else an
/// acknowledgment naming the pick.
pub fn selection_reply(option: &SelectionOption) -> String {
    if !option.response.trim().is_empty() {
        return option.response.clone();
    }
    match &option.description {
        Some(desc) => format!("Has seleccionado: {} - {}", option.title, desc),
        None => format!("Has seleccionado: {}", option.title),
    }
}

pub fn invalid_option_reply(number: u32) -> String {
    format!("⚠️ El número {} no es una opción válida.", number)
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub prefix: char,
    /// Bound for each repository call (and for loading a whole list).
    pub lookup_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig { prefix: DEFAULT_PREFIX, lookup_timeout: DEFAULT_LOOKUP_TIMEOUT }
    }
}

/// What the dispatcher did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Blank body.
    Ignored,
    /// Numeric reply resolved to an option of a pending list.
    OptionSelected { item_id: String, number: u32 },
    /// Numeric reply outside the pending list; the list stays pending.
    InvalidOption { number: u32 },
    /// Text command answered.
    TextReply { command_id: u64 },
    /// List menu sent and registered.
    ListPrompt { command_id: u64, options: usize },
    /// List command without usable options; explanation sent.
    EmptyList { command_id: u64 },
    /// Loading the list failed; apology sent.
    ListFailed { command_id: u64 },
    NoCommand,
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        !matches!(self, DispatchOutcome::Ignored | DispatchOutcome::NoCommand)
    }
}

pub struct Dispatcher {
    lookup: Arc<dyn CommandLookup>,
    sender: Arc<dyn ReplySender>,
    selections: Arc<PendingSelectionStore>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        lookup: Arc<dyn CommandLookup>,
        sender: Arc<dyn ReplySender>,
        selections: Arc<PendingSelectionStore>,
        config: DispatchConfig,
    ) -> Self {
        Dispatcher { lookup, sender, selections, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn selections(&self) -> &Arc<PendingSelectionStore> {
        &self.selections
    }

    pub fn lookup(&self) -> &Arc<dyn CommandLookup> {
        &self.lookup
    }

    pub async fn dispatch(&self, msg: &InboundMessage) -> DispatchOutcome {
        let text = msg.body.trim();
        if text.is_empty() {
            return DispatchOutcome::Ignored;
        }
        let sender = msg.sender_key.as_str();

        if let Some(number) = parse_numeric_reply(text) {
            match self.selections.resolve(sender, number) {
                SelectionLookup::Selected(option) => {
                    info!("[dispatch] {} picked option {}: {}", sender, number, option.title);
                    self.send(sender, &selection_reply(&option)).await;
                    return DispatchOutcome::OptionSelected { item_id: option.item_id, number };
                }
                SelectionLookup::OutOfRange { number, offered } => {
                    debug!("[dispatch] {} sent {} but only {} options are pending", sender, number, offered);
                    self.send(sender, &invalid_option_reply(number)).await;
                    return DispatchOutcome::InvalidOption { number };
                }
                SelectionLookup::Expired | SelectionLookup::Missing => {
                    debug!("[dispatch] No live options for {}, treating '{}' as text", sender, text);
                }
            }
        }

        let lowered = text.to_lowercase();
        let Some(command) = self.find_command(&lowered).await else {
            return DispatchOutcome::NoCommand;
        };

        if command.response_type.is_interactive() {
            self.send_list(sender, &command).await
        } else {
            debug!("[dispatch] '{}' matched text command '{}'", lowered, command.command);
            self.send(sender, &command.response).await;
            DispatchOutcome::TextReply { command_id: command.id }
        }
    }

    /// Strategies in priority order; the first hit wins.
    async fn find_command(&self, text: &str) -> Option<Command> {
        if is_prefixed(text, self.config.prefix) {
            if let Some(cmd) = self.bounded("find_prefixed", self.lookup.find_prefixed(text)).await {
                return Some(cmd);
            }
        }
        if let Some(cmd) = self.bounded("find_unprefixed_exact", self.lookup.find_unprefixed_exact(text)).await {
            return Some(cmd);
        }
        self.bounded("find_unprefixed_substring", self.lookup.find_unprefixed_substring(text)).await
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Option<T>
    where
        F: Future<Output = EngineResult<Option<T>>>,
    {
        match tokio::time::timeout(self.config.lookup_timeout, fut).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!("[dispatch] {} failed, treating as no match: {}", operation, e);
                None
            }
            Err(_) => {
                let e = EngineError::timeout(operation, self.config.lookup_timeout);
                warn!("[dispatch] {}, treating as no match", e);
                None
            }
        }
    }

    async fn send_list(&self, sender: &str, command: &Command) -> DispatchOutcome {
        let loaded = tokio::time::timeout(self.config.lookup_timeout, resolve_list(self.lookup.as_ref(), command))
            .await
            .unwrap_or_else(|_| Err(EngineError::timeout("resolve_list", self.config.lookup_timeout)));

        let resolution = match loaded {
            Ok(r) => r,
            Err(e) => {
                error!("[dispatch] Could not load list command '{}': {}", command.command, e);
                self.send(sender, LIST_LOAD_FAILED).await;
                return DispatchOutcome::ListFailed { command_id: command.id };
            }
        };

        match resolution {
            ListResolution::Prompt { text, selection } => {
                let options = selection.options.len();
                self.selections.register(sender, selection);
                info!("[dispatch] Sent list '{}' ({} options) to {}", command.command, options, sender);
                if let Err(e) = self.sender.reply(sender, &text).await {
                    error!("[dispatch] Sending list to {} failed: {}", sender, e);
                    self.send(sender, COMMAND_SEND_FAILED).await;
                }
                DispatchOutcome::ListPrompt { command_id: command.id, options }
            }
            other => {
                warn!("[dispatch] List command '{}' has no options configured", command.command);
                self.send(sender, other.text()).await;
                DispatchOutcome::EmptyList { command_id: command.id }
            }
        }
    }

    /// Best-effort send; failures are logged and swallowed.
    async fn send(&self, sender: &str, text: &str) -> bool {
        match self.sender.reply(sender, text).await {
            Ok(()) => true,
            Err(e) => {
                error!("[dispatch] Reply to {} failed: {}", sender, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{ListItem, NewCommand, SectionInfo};
    use crate::engine::commands::CommandIndex;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl Recorder {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl ReplySender for Recorder {
        async fn reply(&self, sender_key: &str, text: &str) -> EngineResult<()> {
            self.sent.lock().push((sender_key.to_string(), text.to_string()));
            if self.fail {
                return Err(EngineError::channel("test", "send refused"));
            }
            Ok(())
        }
    }

    /// Lookup whose every call either errors or hangs.
    struct BrokenLookup {
        hang: bool,
    }

    impl BrokenLookup {
        async fn fail<T>(&self) -> EngineResult<T> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Err(EngineError::Lookup("store offline".into()))
        }
    }

    #[async_trait]
    impl CommandLookup for BrokenLookup {
        async fn find_prefixed(&self, _: &str) -> EngineResult<Option<Command>> {
            self.fail().await
        }
        async fn find_unprefixed_exact(&self, _: &str) -> EngineResult<Option<Command>> {
            self.fail().await
        }
        async fn find_unprefixed_substring(&self, _: &str) -> EngineResult<Option<Command>> {
            self.fail().await
        }
        async fn load_sections(&self, _: u64) -> EngineResult<Vec<SectionInfo>> {
            self.fail().await
        }
        async fn load_items(&self, _: u64) -> EngineResult<Vec<ListItem>> {
            self.fail().await
        }
    }

    fn menu_index() -> CommandIndex {
        let index = CommandIndex::default();
        index.create(NewCommand::text("hola", "Hi")).unwrap();
        index.create(NewCommand::text("gracias", "De nada").with_prefix(false)).unwrap();
        index
            .create(
                NewCommand::list("menu", "Menú", "Choose:")
                    .with_section("Drinks", vec![ListItem::new("Coffee", "☕"), ListItem::new("Tea", "")]),
            )
            .unwrap();
        index
    }

    fn dispatcher(lookup: Arc<dyn CommandLookup>, sender: Arc<Recorder>) -> Dispatcher {
        Dispatcher::new(lookup, sender, Arc::new(PendingSelectionStore::default()), DispatchConfig::default())
    }

    #[test]
    fn numeric_reply_detection() {
        assert_eq!(parse_numeric_reply("2"), Some(2));
        assert_eq!(parse_numeric_reply("007"), Some(7));
        assert_eq!(parse_numeric_reply("2a"), None);
        assert_eq!(parse_numeric_reply("-1"), None);
        assert_eq!(parse_numeric_reply("99999999999999999999"), None);
    }

    #[test]
    fn selection_reply_falls_back_to_ack() {
        let mut opt = SelectionOption {
            number: 1,
            title: "Tea".into(),
            description: Some("green".into()),
            section_id: 1,
            item_id: "item_1_0".into(),
            response: String::new(),
        };
        assert_eq!(selection_reply(&opt), "Has seleccionado: Tea - green");
        opt.description = None;
        assert_eq!(selection_reply(&opt), "Has seleccionado: Tea");
        opt.response = "🍵".into();
        assert_eq!(selection_reply(&opt), "🍵");
    }

    #[tokio::test]
    async fn prefixed_text_command() {
        let rec = Arc::new(Recorder::default());
        let d = dispatcher(Arc::new(menu_index()), rec.clone());
        let out = d.dispatch(&InboundMessage::direct("a@s.whatsapp.net", "  !HOLA ")).await;
        assert!(matches!(out, DispatchOutcome::TextReply { .. }));
        assert_eq!(rec.texts(), vec!["Hi"]);
    }

    #[tokio::test]
    async fn prefixed_command_needs_prefix() {
        let rec = Arc::new(Recorder::default());
        let d = dispatcher(Arc::new(menu_index()), rec.clone());
        let out = d.dispatch(&InboundMessage::direct("a", "hola")).await;
        assert_eq!(out, DispatchOutcome::NoCommand);
        assert!(rec.texts().is_empty());
    }

    #[tokio::test]
    async fn unprefixed_substring_match() {
        let rec = Arc::new(Recorder::default());
        let d = dispatcher(Arc::new(menu_index()), rec.clone());
        d.dispatch(&InboundMessage::direct("a", "Muchas gracias amigo")).await;
        assert_eq!(rec.texts(), vec!["De nada"]);
    }

    #[tokio::test]
    async fn list_then_selection() {
        let rec = Arc::new(Recorder::default());
        let d = dispatcher(Arc::new(menu_index()), rec.clone());

        let out = d.dispatch(&InboundMessage::direct("a", "!menu")).await;
        assert!(matches!(out, DispatchOutcome::ListPrompt { options: 2, .. }));
        assert!(d.selections().has_pending("a"));

        let out = d.dispatch(&InboundMessage::direct("a", "5")).await;
        assert_eq!(out, DispatchOutcome::InvalidOption { number: 5 });

        let out = d.dispatch(&InboundMessage::direct("a", "2")).await;
        assert!(matches!(out, DispatchOutcome::OptionSelected { number: 2, .. }));

        let texts = rec.texts();
        assert!(texts[0].contains("1. Coffee\n2. Tea"));
        assert_eq!(texts[1], invalid_option_reply(5));
        assert_eq!(texts[2], "Has seleccionado: Tea");
        assert!(!d.selections().has_pending("a"));
    }

    #[tokio::test]
    async fn number_without_pending_is_plain_text() {
        let rec = Arc::new(Recorder::default());
        let index = menu_index();
        index.create(NewCommand::text("1", "uno").with_prefix(false)).unwrap();
        let d = dispatcher(Arc::new(index), rec.clone());
        d.dispatch(&InboundMessage::direct("a", "1")).await;
        assert_eq!(rec.texts(), vec!["uno"]);
    }

    #[tokio::test]
    async fn empty_body_is_ignored() {
        let rec = Arc::new(Recorder::default());
        let d = dispatcher(Arc::new(menu_index()), rec.clone());
        assert_eq!(d.dispatch(&InboundMessage::direct("a", "   ")).await, DispatchOutcome::Ignored);
        assert!(rec.texts().is_empty());
    }

    #[tokio::test]
    async fn empty_list_explains() {
        let rec = Arc::new(Recorder::default());
        let index = CommandIndex::default();
        index.create(NewCommand::list("vacio", "Vacío", "Nada:")).unwrap();
        let d = dispatcher(Arc::new(index), rec.clone());
        let out = d.dispatch(&InboundMessage::direct("a", "!vacio")).await;
        assert!(matches!(out, DispatchOutcome::EmptyList { .. }));
        assert!(rec.texts()[0].starts_with("Nada:\n\n⚠️"));
        assert!(!d.selections().has_pending("a"));
    }

    #[tokio::test]
    async fn failed_list_send_keeps_selection_and_apologizes() {
        let rec = Arc::new(Recorder { fail: true, ..Default::default() });
        let d = dispatcher(Arc::new(menu_index()), rec.clone());
        d.dispatch(&InboundMessage::direct("a", "!menu")).await;
        let texts = rec.texts();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1], COMMAND_SEND_FAILED);
        assert!(d.selections().has_pending("a"));
    }

    #[tokio::test]
    async fn lookup_errors_mean_no_match() {
        let rec = Arc::new(Recorder::default());
        let d = dispatcher(Arc::new(BrokenLookup { hang: false }), rec.clone());
        assert_eq!(d.dispatch(&InboundMessage::direct("a", "!hola")).await, DispatchOutcome::NoCommand);
        assert!(rec.texts().is_empty());
    }

    #[tokio::test]
    async fn lookup_timeouts_mean_no_match() {
        let rec = Arc::new(Recorder::default());
        let config = DispatchConfig { lookup_timeout: Duration::from_millis(20), ..Default::default() };
        let d = Dispatcher::new(
            Arc::new(BrokenLookup { hang: true }),
            rec.clone(),
            Arc::new(PendingSelectionStore::default()),
            config,
        );
        assert_eq!(d.dispatch(&InboundMessage::direct("a", "!hola")).await, DispatchOutcome::NoCommand);
    }

    #[tokio::test]
    async fn list_load_failure_apologizes() {
        let rec = Arc::new(Recorder::default());
        let d = dispatcher(Arc::new(BrokenLookup { hang: false }), rec.clone());
        let cmd = menu_index().list(None).into_iter().find(|c| c.command == "!menu").unwrap();
        let out = d.send_list("a", &cmd).await;
        assert!(matches!(out, DispatchOutcome::ListFailed { .. }));
        assert_eq!(rec.texts(), vec![LIST_LOAD_FAILED]);
    }
}
