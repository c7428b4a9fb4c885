// WhatsApp Bridge — Webhook HTTP Listener
// bind_webhook, run_webhook_listener

use super::messages::parse_inbound;
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::InboundMessage;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Upper bound for one webhook request (headers + body).
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Bind the listener on 127.0.0.1. Port 0 picks a free port.
pub async fn bind_webhook(port: u16) -> EngineResult<TcpListener> {
    let addr = format!("127.0.0.1:{}", port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| EngineError::channel("whatsapp", format!("Failed to bind webhook listener on {}: {}", addr, e)))
}

/// Minimal HTTP listener that receives webhooks from Evolution API and
/// forwards parsed text messages into `tx`. Answers `200 OK` before parsing.
/// Returns once `stop` is set (checked every 2 s) or `tx` is closed.
pub async fn run_webhook_listener(
    listener: TcpListener,
    tx: mpsc::Sender<InboundMessage>,
    stop: Arc<AtomicBool>,
) -> EngineResult<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("[whatsapp] Webhook listener started on {}", addr);
    }

    loop {
        if stop.load(Ordering::Relaxed) || tx.is_closed() {
            break;
        }

        let accept_result = tokio::time::timeout(Duration::from_secs(2), listener.accept()).await;
        let (mut stream, _peer) = match accept_result {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!("[whatsapp] Accept error: {}", e);
                continue;
            }
            Err(_) => continue, // Timeout, re-check stop signal
        };

        let request = match read_request(&mut stream).await {
            Ok(r) => r,
            Err(e) => {
                debug!("[whatsapp] Dropping unreadable request: {}", e);
                continue;
            }
        };

        // Evolution expects a quick answer
        let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK";
        let _ = stream.write_all(response.as_bytes()).await;
        drop(stream);

        let Some(idx) = request.find("\r\n\r\n") else {
            continue;
        };
        let payload: serde_json::Value = match serde_json::from_str(&request[idx + 4..]) {
            Ok(v) => v,
            Err(_) => continue,
        };

        for msg in route_event(&payload) {
            if tx.send(msg).await.is_err() {
                warn!("[whatsapp] Message loop is gone, stopping webhook listener");
                return Ok(());
            }
        }
    }

    info!("[whatsapp] Webhook listener stopped");
    Ok(())
}

/// Messages to dispatch for one webhook payload. Accepts both
/// `messages.upsert` and the `MESSAGES_UPSERT` spelling.
fn route_event(payload: &serde_json::Value) -> Vec<InboundMessage> {
    let event = payload["event"].as_str().unwrap_or("").to_lowercase().replace('_', ".");
    match event.as_str() {
        "messages.upsert" => parse_inbound(payload),
        "connection.update" => {
            let state = payload["data"]["state"].as_str().unwrap_or("");
            if state == "open" || state == "connected" {
                info!("[whatsapp] Connection confirmed via webhook");
            } else {
                info!("[whatsapp] Connection state: {}", state);
            }
            Vec::new()
        }
        "qrcode.updated" => {
            warn!("[whatsapp] Instance is waiting for a QR scan");
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Read headers, then as much body as `Content-Length` announces.
async fn read_request(stream: &mut TcpStream) -> EngineResult<String> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];
    loop {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .map_err(|_| EngineError::timeout("webhook read", Duration::from_secs(5)))??;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Err(EngineError::channel("whatsapp", "webhook request too large"));
        }
        if let Some(end) = find_header_end(&buf) {
            let wanted = content_length(&buf[..end]).unwrap_or(0);
            if buf.len() >= end + 4 + wanted {
                break;
            }
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(headers: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(headers).lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
