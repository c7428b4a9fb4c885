// ── wabot Atoms: Constants ─────────────────────────────────────────────────
// Named constants and the user-facing (Spanish) reply texts.

use std::time::Duration;

// ── Matching ───────────────────────────────────────────────────────────────

/// Marker character for explicit commands (`!hola`).
pub const DEFAULT_PREFIX: char = '!';

/// Pending selections older than this are discarded at resolve time.
pub const DEFAULT_SELECTION_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound for a single command-repository query.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(3000);

/// How many "did you mean" suggestions to offer for an unknown command.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 3;

/// Candidates scoring above this similarity are suggested.
pub const SIMILARITY_THRESHOLD: f64 = 0.4;

pub const DEFAULT_CREATED_BY: &str = "admin";

// ── Transport ──────────────────────────────────────────────────────────────

/// Replies are split into chunks of at most this many characters.
pub const WHATSAPP_MAX_MESSAGE_CHARS: usize = 4000;

/// A per-sender worker with nothing to do for this long exits.
pub const SENDER_QUEUE_IDLE: Duration = Duration::from_secs(60);

/// Interval of the background sweep over expired pending selections.
pub const SELECTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub const INBOUND_CHANNEL_CAPACITY: usize = 256;

// ── Reply texts ────────────────────────────────────────────────────────────

pub const LIST_REPLY_INSTRUCTION: &str =
    "📝 Responde con el número de la opción que deseas seleccionar.";
pub const LIST_NO_SECTIONS: &str =
    "⚠️ Este comando está configurado como lista pero no tiene opciones definidas.";
pub const LIST_NO_ITEMS: &str =
    "⚠️ Este comando está configurado como lista pero no tiene elementos definidos.";
pub const LIST_LOAD_FAILED: &str =
    "Lo siento, ha ocurrido un error al mostrar las opciones. Por favor, intenta más tarde.";
pub const COMMAND_SEND_FAILED: &str =
    "Lo siento, ha ocurrido un error al procesar este comando. Por favor, inténtalo más tarde.";
