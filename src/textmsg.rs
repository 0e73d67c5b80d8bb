// 💬 Outbound text replies (WhatsApp Cloud API)

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph API rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Anything that can deliver a text reply to a phone number
pub trait MessageSender: Send + Sync {
    fn send(&self, to: &str, body: &str) -> Result<(), SendError>;
}

/// Pick the Graph API sender when credentials are configured,
/// otherwise only log replies.
pub fn sender_from_config(config: &Config) -> Result<Box<dyn MessageSender>, SendError> {
    match (&config.whatsapp_token, &config.whatsapp_phone_number_id) {
        (Some(token), Some(phone_number_id)) => Ok(Box::new(WhatsAppSender::new(
            token,
            phone_number_id,
            &config.whatsapp_api_version,
        )?)),
        _ => {
            info!("WhatsApp credentials not configured, replies will only be logged");
            Ok(Box::new(LogSender))
        }
    }
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

/// Sends through `POST /{version}/{phone_number_id}/messages`.
/// Uses the blocking client: call it off the async runtime.
pub struct WhatsAppSender {
    client: reqwest::blocking::Client,
    url: String,
    token: String,
}

impl WhatsAppSender {
    pub fn new(token: &str, phone_number_id: &str, api_version: &str) -> Result<Self, SendError> {
        Ok(WhatsAppSender {
            client: reqwest::blocking::Client::builder().build()?,
            url: format!(
                "https://graph.facebook.com/{}/{}/messages",
                api_version, phone_number_id
            ),
            token: token.to_string(),
        })
    }
}

impl MessageSender for WhatsAppSender {
    fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
        let message = OutboundMessage {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body },
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&message)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        debug!(to, "reply sent");
        Ok(())
    }
}

/// Development sender: writes the reply to the log
pub struct LogSender;

impl MessageSender for LogSender {
    fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
        info!(to, body, "reply (not sent)");
        Ok(())
    }
}

/// Test sender that records every reply instead of delivering it
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl RecordingSender {
    /// Replies so far, as (to, body)
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl MessageSender for RecordingSender {
    fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(())
    }
}
