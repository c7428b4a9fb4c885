// wabot Engine — WhatsApp Bridge (via Evolution API)
//
// Module layout:
//   config        — WhatsAppConfig
//   evolution_api — EvolutionSender (sendText, connectionState)
//   webhook       — bind_webhook, run_webhook_listener (raw TCP HTTP server)
//   messages      — parse_inbound, run_message_loop (per-sender ordering)
//   bridge        — run_bridge, run_selection_sweeper

pub mod bridge;
pub mod config;
pub mod evolution_api;
pub mod messages;
pub mod webhook;

pub use bridge::{run_bridge, run_selection_sweeper};
pub use config::WhatsAppConfig;
pub use evolution_api::EvolutionSender;
pub use messages::{parse_inbound, run_message_loop};
