use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::error::DeliveryError;

/// Discord rejects message contents longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Delivers one formatted text message to a fixed recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub api_base: String,
    pub bot_token: String,
    pub channel_id: String,
}

/// Posts to one channel through the Discord REST API.
pub struct DiscordNotifier {
    client: reqwest::Client,
    endpoint: Url,
    bot_token: String,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> anyhow::Result<Self> {
        if config.bot_token.trim().is_empty() {
            anyhow::bail!("discord bot token is empty");
        }
        if config.channel_id.trim().is_empty() {
            anyhow::bail!("discord channel id is empty");
        }
        let base = format!("{}/", config.api_base.trim_end_matches('/'));
        let endpoint = Url::parse(&base)
            .and_then(|base| base.join(&format!("channels/{}/messages", config.channel_id.trim())))
            .with_context(|| format!("invalid discord api base: {}", config.api_base))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            bot_token: config.bot_token.trim().to_owned(),
        })
    }

    async fn post(&self, content: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))
            .map_err(DeliveryError::Fatal)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let header_retry = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = header_retry.or_else(|| retry_after_from_body(&body));
            return Err(DeliveryError::RateLimited { retry_after });
        }
        Err(DeliveryError::fatal(anyhow::anyhow!(
            "discord send failed ({status}): {body}"
        )))
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        for chunk in split_message(text, DISCORD_MESSAGE_LIMIT) {
            self.post(&chunk).await?;
        }
        Ok(())
    }
}

/// Prints each message to stdout instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        println!("{text}\n");
        Ok(())
    }
}

fn parse_retry_after(raw: &str) -> Option<Duration> {
    seconds(raw.trim().parse().ok()?)
}

fn retry_after_from_body(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    seconds(value.get("retry_after")?.as_f64()?)
}

/// Negative, non-finite and unrepresentable values are treated as absent.
fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Splits `text` into chunks of at most `limit` characters, preferring line boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for line in text.split('\n') {
        let line_len = line.chars().count();
        let joined_len = if current.is_empty() {
            line_len
        } else {
            current_len + 1 + line_len
        };
        if joined_len <= limit {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len = joined_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        // A single line longer than the limit is cut by characters.
        let chars: Vec<char> = line.chars().collect();
        let mut pieces = chars.chunks(limit).map(|c| c.iter().collect::<String>());
        let mut last = pieces.next().unwrap_or_default();
        for piece in pieces {
            chunks.push(std::mem::replace(&mut last, piece));
        }
        current_len = last.chars().count();
        current = last;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
