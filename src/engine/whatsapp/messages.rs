// WhatsApp Bridge — Inbound Message Handling
// parse_inbound, run_message_loop
//
// Every sender gets its own worker task fed by an unbounded queue, so one
// sender's messages are handled strictly in arrival order (never two in
// flight) while different senders proceed in parallel. A worker that stays
// idle for SENDER_QUEUE_IDLE retires; the next message respawns it.

use crate::atoms::constants::SENDER_QUEUE_IDLE;
use crate::atoms::types::InboundMessage;
use crate::engine::bot::BotHandler;
use log::{debug, error, info};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

// ── Payload parsing ────────────────────────────────────────────────────

/// Extract text messages from a `messages.upsert` webhook payload.
/// `data` may hold one message or an array of them; own messages and
/// non-text messages are skipped.
pub fn parse_inbound(payload: &Value) -> Vec<InboundMessage> {
    let data = &payload["data"];
    let messages: Vec<&Value> = match data.as_array() {
        Some(arr) => arr.iter().collect(),
        None => vec![data],
    };

    let mut out = Vec::new();
    for msg in messages {
        let key = &msg["key"];
        if key["fromMe"].as_bool().unwrap_or(false) {
            continue;
        }

        let text = msg["message"]["conversation"]
            .as_str()
            .or_else(|| msg["message"]["extendedTextMessage"]["text"].as_str())
            .unwrap_or("");
        if text.trim().is_empty() {
            continue;
        }

        let remote_jid = key["remoteJid"].as_str().unwrap_or("");
        if remote_jid.is_empty() {
            continue;
        }
        let participant = key["participant"].as_str().unwrap_or(remote_jid);
        let sender_id = participant.split('@').next().unwrap_or(participant).to_string();
        let push_name = msg["pushName"].as_str().unwrap_or(&sender_id).to_string();

        debug!(
            "[whatsapp] Message from {} ({}): {}",
            push_name,
            sender_id,
            text.chars().take(50).collect::<String>()
        );

        out.push(InboundMessage {
            sender_key: remote_jid.to_string(),
            sender_id,
            push_name,
            body: text.to_string(),
            is_group: remote_jid.contains("@g.us"),
        });
    }
    out
}

// ── Per-sender ordering ────────────────────────────────────────────────

type SenderQueues = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<InboundMessage>>>>;

/// Hand `msg` to its sender's worker. Returns a receiver when no live worker
/// exists and the caller must spawn one.
fn enqueue(queues: &SenderQueues, msg: InboundMessage) -> Option<mpsc::UnboundedReceiver<InboundMessage>> {
    let mut map = queues.lock();
    let msg = match map.get(&msg.sender_key) {
        Some(tx) => match tx.send(msg) {
            Ok(()) => return None,
            Err(mpsc::error::SendError(msg)) => msg,
        },
        None => msg,
    };
    let (tx, rx) = mpsc::unbounded_channel();
    let key = msg.sender_key.clone();
    // The receiver is alive in this scope, so this cannot fail.
    let _ = tx.send(msg);
    map.insert(key, tx);
    Some(rx)
}

/// Called by an idle worker. Either hands back a message that arrived in the
/// meantime or unregisters the worker. Senders only push while holding the
/// map lock, so nothing can be queued after the removal.
fn retire(queues: &SenderQueues, key: &str, rx: &mut mpsc::UnboundedReceiver<InboundMessage>) -> Option<InboundMessage> {
    let mut map = queues.lock();
    match rx.try_recv() {
        Ok(msg) => Some(msg),
        Err(_) => {
            map.remove(key);
            None
        }
    }
}

async fn sender_worker(
    key: String,
    mut rx: mpsc::UnboundedReceiver<InboundMessage>,
    handler: Arc<BotHandler>,
    queues: SenderQueues,
) {
    loop {
        let msg = match tokio::time::timeout(SENDER_QUEUE_IDLE, rx.recv()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(_) => match retire(&queues, &key, &mut rx) {
                Some(msg) => msg,
                None => {
                    debug!("[whatsapp] Worker for {} idle, retiring", key);
                    break;
                }
            },
        };
        let outcome = handler.handle(&msg).await;
        debug!("[whatsapp] {} → {:?}", key, outcome);
    }
}

/// Drain `rx` until every producer is gone, then wait for the workers to
/// finish what they have queued.
pub async fn run_message_loop(
    mut rx: mpsc::Receiver<InboundMessage>,
    handler: Arc<BotHandler>,
    respond_in_groups: bool,
) {
    let queues: SenderQueues = Arc::new(Mutex::new(HashMap::new()));
    let mut workers = JoinSet::new();

    while let Some(msg) = rx.recv().await {
        if msg.is_group && !respond_in_groups {
            debug!("[whatsapp] Skipping group message from {}", msg.sender_key);
            continue;
        }
        let key = msg.sender_key.clone();
        if let Some(worker_rx) = enqueue(&queues, msg) {
            workers.spawn(sender_worker(key, worker_rx, handler.clone(), queues.clone()));
        }
        while let Some(done) = workers.try_join_next() {
            if let Err(e) = done {
                error!("[whatsapp] Sender worker crashed: {}", e);
            }
        }
    }

    // Closing every queue lets the workers finish their backlog and exit.
    queues.lock().clear();
    while let Some(done) = workers.join_next().await {
        if let Err(e) = done {
            error!("[whatsapp] Sender worker crashed: {}", e);
        }
    }
    info!("[whatsapp] Message loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_conversation_text() {
        let payload = json!({
            "event": "messages.upsert",
            "data": {
                "key": { "remoteJid": "34600111222@s.whatsapp.net", "fromMe": false },
                "pushName": "Ana",
                "message": { "conversation": "!hola" }
            }
        });
        let msgs = parse_inbound(&payload);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].sender_key, "34600111222@s.whatsapp.net");
        assert_eq!(msgs[0].sender_id, "34600111222");
        assert_eq!(msgs[0].push_name, "Ana");
        assert_eq!(msgs[0].body, "!hola");
        assert!(!msgs[0].is_group);
    }

    #[test]
    fn parses_extended_text_and_groups() {
        let payload = json!({
            "data": [{
                "key": {
                    "remoteJid": "12345@g.us",
                    "participant": "34600999888@s.whatsapp.net",
                    "fromMe": false
                },
                "message": { "extendedTextMessage": { "text": "menu" } }
            }]
        });
        let msgs = parse_inbound(&payload);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].is_group);
        assert_eq!(msgs[0].sender_key, "12345@g.us");
        assert_eq!(msgs[0].sender_id, "34600999888");
        assert_eq!(msgs[0].push_name, "34600999888");
    }

    #[test]
    fn skips_own_and_non_text() {
        let payload = json!({
            "data": [
                { "key": { "remoteJid": "1@s.whatsapp.net", "fromMe": true }, "message": { "conversation": "hi" } },
                { "key": { "remoteJid": "2@s.whatsapp.net" }, "message": { "imageMessage": {} } },
                { "key": { "remoteJid": "3@s.whatsapp.net" }, "message": { "conversation": "   " } }
            ]
        });
        assert!(parse_inbound(&payload).is_empty());
    }

    #[test]
    fn enqueue_reuses_live_worker() {
        let queues: SenderQueues = Arc::new(Mutex::new(HashMap::new()));
        let mut rx = enqueue(&queues, InboundMessage::direct("a", "1")).unwrap();
        assert!(enqueue(&queues, InboundMessage::direct("a", "2")).is_none());
        assert!(enqueue(&queues, InboundMessage::direct("b", "x")).is_some());
        assert_eq!(rx.try_recv().unwrap().body, "1");
        assert_eq!(rx.try_recv().unwrap().body, "2");
    }

    #[test]
    fn retire_unregisters_idle_worker() {
        let queues: SenderQueues = Arc::new(Mutex::new(HashMap::new()));
        let mut rx = enqueue(&queues, InboundMessage::direct("a", "1")).unwrap();
        assert_eq!(retire(&queues, "a", &mut rx).map(|m| m.body), Some("1".to_string()));
        assert!(retire(&queues, "a", &mut rx).is_none());
        assert!(queues.lock().is_empty());
        // Next message starts a fresh worker.
        assert!(enqueue(&queues, InboundMessage::direct("a", "2")).is_some());
    }
}
