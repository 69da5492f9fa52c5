use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::env;

#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from: String,
    pub to: String,
}

impl EmailConfig {
    pub fn from_env() -> Option<Self> {
        let smtp_server = env::var("SMTP_SERVER").ok().filter(|v| !v.is_empty())?;
        let to = env::var("EMAIL_TO").ok().filter(|v| !v.is_empty())?;
        Some(Self {
            smtp_server,
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from: env::var("EMAIL_FROM").unwrap_or_else(|_| to.clone()),
            to,
        })
    }
}

pub struct EmailClient {
    config: EmailConfig,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn send(&self, subject: &str, body: &str) -> Result<(), String> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| format!("invalid sender '{}': {}", self.config.from, e))?;
        let to: Mailbox = self
            .config
            .to
            .parse()
            .map_err(|e| format!("invalid recipient '{}': {}", self.config.to, e))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| format!("failed to build email: {}", e))?;

        let mailer = SmtpTransport::relay(&self.config.smtp_server)
            .map_err(|e| format!("smtp relay {}: {}", self.config.smtp_server, e))?
            .credentials(Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            ))
            .build();

        mailer
            .send(&email)
            .map(|_| ())
            .map_err(|e| format!("failed to send email: {}", e))
    }
}
