// wabot Engine — Shared Channel Helpers
//
//   - ReplySender    — outbound send primitive the dispatcher talks to
//   - split_message() — splits long replies for platform message limits
//   - excerpt()       — char-safe prefix of a string for logs and errors

use crate::atoms::error::EngineResult;
use async_trait::async_trait;

/// Outbound delivery keyed by chat identifier.
///
/// Errors are returned so callers can log them; retry policy belongs to the
/// implementation, not to the dispatcher.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, sender_key: &str, text: &str) -> EngineResult<()>;
}

/// Split a long message into chunks of at most `max_chars` characters,
/// preferring newline, then space breaks. Always cuts on char boundaries.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }
        // Byte offset just past the `max_chars`-th character.
        let limit = remaining.char_indices().nth(max_chars).map(|(i, _)| i).unwrap_or(remaining.len());
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }
    chunks
}

/// First `max_chars` characters of `text`, never cutting inside a char.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_message_short() {
        assert_eq!(split_message("hola", 100), vec!["hola"]);
    }

    #[test]
    fn split_message_exact_boundary() {
        let msg = "a".repeat(100);
        let chunks = split_message(&msg, 100);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn split_message_prefers_newline_break() {
        let msg = format!("{}\n{}", "a".repeat(60), "b".repeat(60));
        let chunks = split_message(&msg, 80);
        assert_eq!(chunks[0], "a".repeat(60));
        assert_eq!(chunks[1], "b".repeat(60));
    }

    #[test]
    fn split_message_prefers_space_break() {
        let msg = format!("{} {}", "a".repeat(60), "b".repeat(60));
        let chunks = split_message(&msg, 80);
        assert_eq!(chunks[0], "a".repeat(60));
    }

    #[test]
    fn split_message_hard_cut_without_breaks() {
        let msg = "x".repeat(250);
        let chunks = split_message(&msg, 100);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![100, 100, 50]);
    }

    #[test]
    fn split_message_multibyte_safe() {
        // Multi-byte chars: a byte-based cut would panic mid-char.
        let msg = "☕🍵".repeat(30);
        let chunks = split_message(&msg, 7);
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
        assert_eq!(chunks.concat(), msg);
    }

    #[test]
    fn excerpt_stops_on_char_boundary() {
        let text = format!("{}é{}", "a".repeat(199), "b".repeat(50));
        assert_eq!(excerpt(&text, 200), format!("{}é", "a".repeat(199)));
        assert_eq!(excerpt("corto", 200), "corto");
    }
}
