use crate::data_sync::config::DiscordConfig;
use async_trait::async_trait;
use eyre::Result;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DISCORD_API_URL: &str = "https://discord.com/api/v10";

/// Delivers alert messages to an external channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `identifier` names what the message is about (used for logging);
    /// `message` is the text to deliver.
    async fn notify(&self, identifier: &str, message: &str) -> Result<()>;
}

/// Notifier that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, identifier: &str, _message: &str) -> Result<()> {
        debug!(identifier, "Notification dropped");
        Ok(())
    }
}

#[derive(Deserialize)]
struct DmChannel {
    id: String,
}

/// Sends alerts as direct messages from a Discord bot.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    http_client: reqwest::Client,
    bot_token: String,
    user_id: u64,
    api_url: String,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { http_client, bot_token: config.bot_token.clone(), user_id: config.user_id, api_url: DISCORD_API_URL.to_string() })
    }

    /// Points the notifier at another API root, e.g. a local stub.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn open_dm_channel(&self) -> Result<String> {
        let channel: DmChannel = self
            .http_client
            .post(format!("{}/users/@me/channels", self.api_url))
            .header("Authorization", self.authorization())
            .json(&serde_json::json!({ "recipient_id": self.user_id.to_string() }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(channel.id)
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, identifier: &str, message: &str) -> Result<()> {
        let channel_id = self.open_dm_channel().await?;

        self.http_client
            .post(format!("{}/channels/{}/messages", self.api_url, channel_id))
            .header("Authorization", self.authorization())
            .json(&serde_json::json!({ "content": message }))
            .send()
            .await?
            .error_for_status()?;

        debug!(identifier, channel_id = %channel_id, "Discord notification sent");
        Ok(())
    }
}
