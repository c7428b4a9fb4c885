// wabot — WhatsApp command bot
//
// Usage: wabot [CONFIG_PATH]
// Config path falls back to $WABOT_CONFIG, then <config_dir>/wabot/config.json.

use anyhow::Context;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use wabot::engine::whatsapp::run_bridge;
use wabot::{BotConfig, CommandIndex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(BotConfig::default_path);
    let config = BotConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let commands_path = config.commands_path(&config_path);
    let index = CommandIndex::load_json(&commands_path, config.prefix)
        .with_context(|| format!("loading commands from {}", commands_path.display()))?;
    info!("[wabot] {} commands loaded from {}", index.len(), commands_path.display());

    run_bridge(config, Arc::new(index)).await?;
    Ok(())
}
