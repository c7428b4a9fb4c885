// wabot Engine — Bot Handler
//
// Front door for every inbound message. The dispatcher gets the first shot;
// only when it finds nothing does the handler fall back to:
//   - built-in commands (help, comandos, ping, hora, status)
//   - "did you mean" suggestions for unknown prefixed commands
//   - canned keyword replies for plain text (optional)
//
// Exactly one of the two paths answers a message, never both.

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::InboundMessage;
use crate::engine::channels::ReplySender;
use crate::engine::commands::{is_prefixed, CommandLookup};
use crate::engine::config::BotConfig;
use crate::engine::dispatcher::{DispatchOutcome, Dispatcher};
use crate::engine::selections::PendingSelectionStore;
use crate::engine::similarity::find_similar;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Weekday};
use log::{debug, error, info, warn};
use rand::seq::IndexedRandom;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ── Built-ins ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCategory {
    General,
    Sistema,
}

impl BuiltinCategory {
    pub const ALL: [BuiltinCategory; 2] = [BuiltinCategory::General, BuiltinCategory::Sistema];

    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinCategory::General => "general",
            BuiltinCategory::Sistema => "sistema",
        }
    }
}

pub struct Builtin {
    pub name: &'static str,
    pub description: &'static str,
    pub category: BuiltinCategory,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "help",
        description: "Muestra la lista de comandos disponibles",
        category: BuiltinCategory::General,
    },
    Builtin { name: "ping", description: "Comprueba si el bot está activo", category: BuiltinCategory::General },
    Builtin { name: "hora", description: "Muestra la hora actual", category: BuiltinCategory::General },
    Builtin {
        name: "status",
        description: "Muestra el estado del bot y el sistema",
        category: BuiltinCategory::Sistema,
    },
    Builtin { name: "comandos", description: "Alias de !help", category: BuiltinCategory::General },
];

// ── Keyword replies ────────────────────────────────────────────────────────

enum KeywordReply {
    Fixed(&'static str),
    HelpHint,
    Random(&'static [&'static str]),
}

const JOKES: &[&str] = &[
    "¿Por qué los programadores prefieren el frío? Porque odian los bugs (bichos)",
    "¿Qué le dice un bit a otro bit? Nos vemos en el bus",
    "Solo hay 10 tipos de personas en el mundo: las que entienden binario y las que no",
    "Si no puedes convencerlos, confúndelos con tu código",
    "La única \"persona\" que escucha mis comandos sin cuestionar es mi WhatsApp Bot",
];

// First group with a matching keyword wins.
const KEYWORDS: &[(&[&str], KeywordReply)] = &[
    (&["hola", "buenas", "saludos"], KeywordReply::Fixed("¡Hola! 👋 ¿En qué puedo ayudarte hoy?")),
    (&["gracias", "agradec"], KeywordReply::Fixed("¡De nada! Estoy aquí para ayudar 😊")),
    (&["ayuda", "help", "comandos"], KeywordReply::HelpHint),
    (
        &["cómo estás", "como estas"],
        KeywordReply::Fixed("Estoy funcionando perfectamente, gracias por preguntar! 🤖"),
    ),
    (&["chiste", "broma"], KeywordReply::Random(JOKES)),
];

// ── Formatting helpers ─────────────────────────────────────────────────────

/// `1d 2h 3m 4s`; leading zero units are left out, seconds always shown.
pub fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (days, hours, minutes, secs) = (total / 86_400, (total % 86_400) / 3600, (total % 3600) / 60, total % 60);

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{}d ", days));
    }
    if hours > 0 || days > 0 {
        out.push_str(&format!("{}h ", hours));
    }
    if minutes > 0 || hours > 0 || days > 0 {
        out.push_str(&format!("{}m ", minutes));
    }
    out.push_str(&format!("{}s", secs));
    out
}

fn weekday_es(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miércoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

const MONTHS_ES: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto", "septiembre", "octubre",
    "noviembre", "diciembre",
];

/// Spanish long date, e.g. `lunes, 19 de octubre de 2026, 14:05:09 (UTC+02:00)`.
pub fn format_fecha<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!(
        "{}, {} de {} de {}, {:02}:{:02}:{:02} (UTC{})",
        weekday_es(now.weekday()),
        now.day(),
        MONTHS_ES[now.month0() as usize],
        now.year(),
        now.hour(),
        now.minute(),
        now.second(),
        now.format("%:z"),
    )
}

// ── Handler ────────────────────────────────────────────────────────────────

/// How a message was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The dispatcher handled (or ignored) it.
    Dispatched(DispatchOutcome),
    Builtin(&'static str),
    /// Unknown prefixed command; suggestions were sent.
    Suggested(Vec<String>),
    /// Unknown prefixed command with nothing similar.
    Unrecognized,
    Keyword,
    Unhandled,
}

pub struct BotHandler {
    dispatcher: Dispatcher,
    sender: Arc<dyn ReplySender>,
    prefix: char,
    max_suggestions: usize,
    keyword_replies: bool,
    started: Instant,
}

impl BotHandler {
    pub fn new(lookup: Arc<dyn CommandLookup>, sender: Arc<dyn ReplySender>, config: &BotConfig) -> Self {
        let selections = Arc::new(PendingSelectionStore::new(config.selection_ttl()));
        let dispatcher = Dispatcher::new(lookup, sender.clone(), selections, config.dispatch_config());
        BotHandler {
            dispatcher,
            sender,
            prefix: config.prefix,
            max_suggestions: config.max_suggestions,
            keyword_replies: config.keyword_replies,
            started: Instant::now(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn selections(&self) -> &Arc<PendingSelectionStore> {
        self.dispatcher.selections()
    }

    pub async fn handle(&self, msg: &InboundMessage) -> HandleOutcome {
        let outcome = self.dispatcher.dispatch(msg).await;
        if outcome != DispatchOutcome::NoCommand {
            return HandleOutcome::Dispatched(outcome);
        }

        let text = msg.body.trim();
        if is_prefixed(text, self.prefix) {
            self.handle_builtin(msg, text).await
        } else if self.keyword_replies {
            self.handle_keywords(msg, text).await
        } else {
            HandleOutcome::Unhandled
        }
    }

    async fn handle_builtin(&self, msg: &InboundMessage, text: &str) -> HandleOutcome {
        let body = text[self.prefix.len_utf8()..].trim();
        let mut parts = body.split_whitespace();
        let Some(name) = parts.next().map(str::to_lowercase) else {
            return HandleOutcome::Unhandled;
        };
        let args: Vec<&str> = parts.collect();
        debug!("[bot] Built-in lookup '{}' args={:?}", name, args);

        let Some(builtin) = BUILTINS.iter().find(|b| b.name == name) else {
            return self.suggest(msg, &name).await;
        };

        let reply = match builtin.name {
            "help" | "comandos" => self.help_text(args.first().copied()),
            "ping" => "¡Pong! 🏓".to_string(),
            "hora" => format!("🕒 *Fecha y hora actual:*\n{}", format_fecha(&Local::now())),
            "status" => self.status_text().await,
            other => {
                warn!("[bot] Built-in '{}' has no handler", other);
                return HandleOutcome::Unhandled;
            }
        };
        info!("[bot] Built-in !{} for {}", builtin.name, msg.sender_key);
        self.send(&msg.sender_key, &reply).await;
        HandleOutcome::Builtin(builtin.name)
    }

    async fn suggest(&self, msg: &InboundMessage, name: &str) -> HandleOutcome {
        let stored = self.stored_names().await;
        let candidates = BUILTINS.iter().map(|b| b.name).chain(stored.iter().map(String::as_str));
        let similar = find_similar(name, candidates, self.max_suggestions);

        if similar.is_empty() {
            self.send(
                &msg.sender_key,
                &format!("⚠️ Comando no reconocido. Usa *{}help* para ver los comandos disponibles.", self.prefix),
            )
            .await;
            return HandleOutcome::Unrecognized;
        }

        let list = similar
            .iter()
            .map(|s| format!("*{}{}*", self.prefix, s))
            .collect::<Vec<_>>()
            .join(", ");
        self.send(
            &msg.sender_key,
            &format!("⚠️ Comando no encontrado: *{}*\n\n¿Quisiste decir alguno de estos?\n{}", name, list),
        )
        .await;
        HandleOutcome::Suggested(similar)
    }

    /// Stored prefixed commands without their prefix, deduplicated against
    /// built-ins. Lookup trouble just means fewer suggestions.
    async fn stored_names(&self) -> Vec<String> {
        let lookup = self.dispatcher.lookup();
        let timeout = self.dispatcher.config().lookup_timeout;
        let names: EngineResult<Vec<String>> = match tokio::time::timeout(timeout, lookup.prefixed_commands()).await {
            Ok(r) => r,
            Err(_) => Err(EngineError::timeout("prefixed_commands", timeout)),
        };
        match names {
            Ok(names) => names
                .into_iter()
                .map(|n| n.trim_start_matches(self.prefix).to_string())
                .filter(|n| !n.is_empty() && !BUILTINS.iter().any(|b| b.name == n.as_str()))
                .collect(),
            Err(e) => {
                warn!("[bot] Could not list stored commands: {}", e);
                Vec::new()
            }
        }
    }

    fn help_text(&self, filter: Option<&str>) -> String {
        let line = |b: &Builtin| format!("*{}{}*: {}\n", self.prefix, b.name, b.description);

        if let Some(filter) = filter.map(str::to_lowercase) {
            return match BuiltinCategory::ALL.iter().find(|c| c.as_str() == filter) {
                Some(cat) => {
                    let mut text = format!("*Comandos de {}:*\n\n", cat.as_str());
                    BUILTINS.iter().filter(|b| b.category == *cat).for_each(|b| text.push_str(&line(b)));
                    text
                }
                None => format!(
                    "No se encontraron comandos para la categoría '{}'. \nCategorías disponibles: {}",
                    filter,
                    BuiltinCategory::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
                ),
            };
        }

        let mut text = String::from("*Comandos disponibles:*\n\n");
        for cat in BuiltinCategory::ALL {
            text.push_str(&format!("\n*==== {} ====*\n", cat.as_str()));
            BUILTINS.iter().filter(|b| b.category == cat).for_each(|b| text.push_str(&line(b)));
        }
        text.push_str(&format!(
            "\nPuedes usar *{}help [categoría]* para ver comandos específicos.",
            self.prefix
        ));
        text
    }

    async fn status_text(&self) -> String {
        let commands = BUILTINS.len() + self.stored_names().await.len();
        format!(
            "*Estado del Bot*\n\n🟢 *En línea:* Sí\n⏱️ *Uptime:* {}\n🖥️ *Sistema:* {} ({})\n📝 *Comandos:* {}\n",
            format_uptime(self.started.elapsed()),
            std::env::consts::OS,
            std::env::consts::ARCH,
            commands
        )
    }

    async fn handle_keywords(&self, msg: &InboundMessage, text: &str) -> HandleOutcome {
        let content = text.to_lowercase();
        let Some((_, reply)) = KEYWORDS.iter().find(|(words, _)| words.iter().any(|w| content.contains(w))) else {
            return HandleOutcome::Unhandled;
        };
        let reply = match reply {
            KeywordReply::Fixed(fixed) => fixed.to_string(),
            KeywordReply::HelpHint => {
                format!("Para ver la lista de comandos disponibles, envía *{}help*", self.prefix)
            }
            KeywordReply::Random(options) => match options.choose(&mut rand::rng()) {
                Some(pick) => pick.to_string(),
                None => return HandleOutcome::Unhandled,
            },
        };
        self.send(&msg.sender_key, &reply).await;
        HandleOutcome::Keyword
    }

    async fn send(&self, sender: &str, text: &str) {
        if let Err(e) = self.sender.reply(sender, text).await {
            error!("[bot] Reply to {} failed: {}", sender, e);
        }
    }
}
