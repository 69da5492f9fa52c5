//! Operator notification channel.
//!
//! Notifications are fire-and-forget from the caller's point of view: a
//! failed delivery is reported back as `NotifyError` so it can be logged, but
//! nothing in the executor waits on or retries it.

use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{NotifierConfig, NotifierKind};
use crate::email_client::{EmailClient, EmailConfig};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Upper bound on a single delivery attempt. Callers on the abort path must
/// never wait longer than this for the operator channel.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum NotifyError {
    Http(String),
    Status(u16),
    Email(String),
    NotConfigured(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotifyError::Http(e) => write!(f, "notification request failed: {}", e),
            NotifyError::Status(code) => write!(f, "notification endpoint returned {}", code),
            NotifyError::Email(e) => write!(f, "email notification failed: {}", e),
            NotifyError::NotConfigured(what) => write!(f, "notifier not configured: {}", what),
        }
    }
}

impl Error for NotifyError {}

#[async_trait]
pub trait Notifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log stream only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        log::warn!("[NOTIFY] {}", text);
        Ok(())
    }
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self, NotifyError> {
        Self::with_base_url(TELEGRAM_API.to_string(), bot_token, chat_id)
    }

    pub fn with_base_url(
        base_url: String,
        bot_token: String,
        chat_id: String,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Http(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            bot_token,
            chat_id,
        })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.bot_token
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let res = self
            .client
            .get(self.send_message_url())
            .query(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        let status = res.status();
        if status.is_success() {
            log::debug!("[NOTIFY] telegram message sent");
            Ok(())
        } else {
            Err(NotifyError::Status(status.as_u16()))
        }
    }
}

pub struct EmailNotifier {
    config: EmailConfig,
    subject_prefix: String,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig, token_name: &str) -> Self {
        let subject_prefix = if token_name.is_empty() {
            "[pairleg]".to_string()
        } else {
            format!("[{}]", token_name)
        };
        Self {
            config,
            subject_prefix,
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let subject = format!(
            "{} {}",
            self.subject_prefix,
            text.lines().next().unwrap_or_default()
        );
        let body = text.to_string();
        let config = self.config.clone();
        // lettre's SMTP transport blocks
        tokio::task::spawn_blocking(move || EmailClient::new(config).send(&subject, &body))
            .await
            .map_err(|e| NotifyError::Email(e.to_string()))?
            .map_err(NotifyError::Email)
    }
}

pub fn build_notifier(cfg: &NotifierConfig) -> Result<Arc<dyn Notifier + Send + Sync>, NotifyError> {
    match cfg.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Telegram => {
            let token = cfg
                .telegram_bot_token
                .clone()
                .ok_or_else(|| NotifyError::NotConfigured("TELEGRAM_BOT_TOKEN".to_string()))?;
            let chat_id = cfg
                .telegram_chat_id
                .clone()
                .ok_or_else(|| NotifyError::NotConfigured("TELEGRAM_CHAT_ID".to_string()))?;
            Ok(Arc::new(TelegramNotifier::new(token, chat_id)?))
        }
        NotifierKind::Email => {
            let email = cfg
                .email
                .clone()
                .ok_or_else(|| NotifyError::NotConfigured("SMTP_SERVER / EMAIL_TO".to_string()))?;
            Ok(Arc::new(EmailNotifier::new(email, &cfg.token_name)))
        }
    }
}
