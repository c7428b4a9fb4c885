// WhatsApp Bridge — Evolution API Client
// EvolutionSender (ReplySender over /message/sendText), connection_state

use super::config::WhatsAppConfig;
use crate::atoms::constants::WHATSAPP_MAX_MESSAGE_CHARS;
use crate::atoms::error::{EngineError, EngineResult};
use crate::engine::channels::{excerpt, split_message, ReplySender};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::json;
use std::time::Duration;

pub struct EvolutionSender {
    client: reqwest::Client,
    config: WhatsAppConfig,
}

impl EvolutionSender {
    pub fn new(config: WhatsAppConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(EvolutionSender { client, config })
    }

    pub fn config(&self) -> &WhatsAppConfig {
        &self.config
    }

    /// Instance state as reported by Evolution API (`open` once paired).
    pub async fn connection_state(&self) -> EngineResult<String> {
        let url = format!("{}/instance/connectionState/{}", self.config.base_url(), self.config.instance_name);
        let resp = self.client.get(&url).header("apikey", &self.config.api_key).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EngineError::channel(
                "whatsapp",
                format!("connectionState {}: {}", status, excerpt(&text, 200)),
            ));
        }
        let body: serde_json::Value = resp.json().await?;
        Ok(body["instance"]["state"]
            .as_str()
            .or_else(|| body["state"].as_str())
            .unwrap_or("unknown")
            .to_string())
    }

    async fn send_chunk(&self, url: &str, to_jid: &str, chunk: &str) -> EngineResult<()> {
        let body = json!({
            "number": to_jid,
            "text": chunk,
        });
        let resp = self
            .client
            .post(url)
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.unwrap_or_default();
            warn!("[whatsapp] sendText error [{}]: {}", status, err_text);
            return Err(EngineError::channel(
                "whatsapp",
                format!("sendText {}: {}", status, excerpt(&err_text, 200)),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplySender for EvolutionSender {
    /// Long replies go out as several messages; the first failing chunk
    /// aborts the rest.
    async fn reply(&self, sender_key: &str, text: &str) -> EngineResult<()> {
        let url = self.config.send_text_url();
        let chunks = split_message(text, WHATSAPP_MAX_MESSAGE_CHARS);
        debug!("[whatsapp] Sending {} chunk(s) to {}", chunks.len(), sender_key);
        for chunk in &chunks {
            self.send_chunk(&url, sender_key, chunk).await?;
        }
        Ok(())
    }
}
