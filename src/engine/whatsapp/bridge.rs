// WhatsApp Bridge — Lifecycle
// run_bridge, run_selection_sweeper
//
// Wiring, all owned here and handed down as Arcs:
//
//   webhook listener ──mpsc──▶ message loop ──▶ per-sender worker ──▶ BotHandler
//                                                                        │
//                                            EvolutionSender ◀───────────┘
//
// Ctrl-C sets the stop flag; the listener exits within its accept timeout,
// which closes the channel and lets the message loop drain.

use super::evolution_api::EvolutionSender;
use super::messages::run_message_loop;
use super::webhook::{bind_webhook, run_webhook_listener};
use crate::atoms::constants::{INBOUND_CHANNEL_CAPACITY, SELECTION_SWEEP_INTERVAL};
use crate::atoms::error::EngineResult;
use crate::engine::bot::BotHandler;
use crate::engine::commands::CommandLookup;
use crate::engine::config::BotConfig;
use crate::engine::selections::PendingSelectionStore;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Periodically drop expired selections until `stop` is set.
pub async fn run_selection_sweeper(store: Arc<PendingSelectionStore>, every: Duration, stop: Arc<AtomicBool>) {
    let mut tick = tokio::time::interval(every);
    tick.tick().await;
    while !stop.load(Ordering::Relaxed) {
        tick.tick().await;
        let removed = store.sweep_expired();
        if removed > 0 {
            debug!("[selections] Swept {} expired entries, {} left", removed, store.len());
        }
    }
}

/// Run the bot against Evolution API until Ctrl-C.
pub async fn run_bridge(config: BotConfig, lookup: Arc<dyn CommandLookup>) -> EngineResult<()> {
    config.validate()?;
    let wa = config.whatsapp.clone();
    if wa.api_key.is_empty() {
        warn!("[whatsapp] No api_key configured, Evolution API will likely reject sends");
    }

    let sender = Arc::new(EvolutionSender::new(wa.clone())?);
    let handler = Arc::new(BotHandler::new(lookup, sender.clone(), &config));
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

    let listener = bind_webhook(wa.webhook_port).await?;
    let stop_for_webhook = stop.clone();
    let webhook_handle = tokio::spawn(async move {
        if let Err(e) = run_webhook_listener(listener, tx, stop_for_webhook).await {
            error!("[whatsapp] Webhook listener error: {}", e);
        }
    });
    let sweeper_handle = tokio::spawn(run_selection_sweeper(
        handler.selections().clone(),
        SELECTION_SWEEP_INTERVAL,
        stop.clone(),
    ));
    let loop_handle = tokio::spawn(run_message_loop(rx, handler.clone(), wa.respond_in_groups));

    match sender.connection_state().await {
        Ok(state) if state == "open" || state == "connected" => {
            info!("[whatsapp] Instance '{}' connected, ready to receive messages", wa.instance_name)
        }
        Ok(state) => warn!("[whatsapp] Instance '{}' is in state '{}'", wa.instance_name, state),
        Err(e) => warn!("[whatsapp] Connection check failed: {}", e),
    }

    info!(
        "[whatsapp] Bridge running (instance '{}', webhook port {}, prefix '{}')",
        wa.instance_name, wa.webhook_port, config.prefix
    );
    tokio::signal::ctrl_c().await?;
    info!("[whatsapp] Stop signal received, shutting down");
    stop.store(true, Ordering::Relaxed);

    if let Err(e) = webhook_handle.await {
        error!("[whatsapp] Webhook task failed: {}", e);
    }
    if let Err(e) = loop_handle.await {
        error!("[whatsapp] Message loop failed: {}", e);
    }
    sweeper_handle.abort();
    info!("[whatsapp] Bridge stopped");
    Ok(())
}
