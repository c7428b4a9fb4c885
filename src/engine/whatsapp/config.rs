// WhatsApp Bridge — Configuration
// WhatsAppConfig, validate

use crate::atoms::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Instance name in Evolution API (default: "wabot")
    #[serde(alias = "instanceName")]
    pub instance_name: String,
    /// Evolution API base URL, without trailing slash
    #[serde(alias = "apiUrl")]
    pub api_url: String,
    /// Evolution API key, sent as the `apikey` header
    #[serde(alias = "apiKey")]
    pub api_key: String,
    /// Port for the local webhook listener (default: 8086)
    #[serde(alias = "webhookPort")]
    pub webhook_port: u16,
    /// Whether to answer messages posted in group chats
    #[serde(alias = "respondInGroups")]
    pub respond_in_groups: bool,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        WhatsAppConfig {
            instance_name: "wabot".into(),
            api_url: "http://127.0.0.1:8085".into(),
            api_key: String::new(),
            webhook_port: 8086,
            respond_in_groups: false,
        }
    }
}

impl WhatsAppConfig {
    /// `api_url` with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn send_text_url(&self) -> String {
        format!("{}/message/sendText/{}", self.base_url(), self.instance_name)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.instance_name.trim().is_empty() {
            return Err(EngineError::Config("whatsapp.instance_name is empty".into()));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(EngineError::Config(format!(
                "whatsapp.api_url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        if self.webhook_port == 0 {
            return Err(EngineError::Config("whatsapp.webhook_port must be non-zero".into()));
        }
        Ok(())
    }
}
