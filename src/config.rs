use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs::File;
use std::num::ParseIntError;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::email_client::EmailConfig;

const DEFAULT_EXCHANGE_NAME: &str = "scripted";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_POLL_ATTEMPTS: u32 = 2;
const DEFAULT_TIMEZONE_OFFSET_SECS: i32 = 3600;
const DEFAULT_PAIR_TRADE_FILE: &str = "pair_trade.yaml";

#[derive(Debug)]
pub enum ConfigError {
    ParseIntError(ParseIntError),
    OtherError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::ParseIntError(e) => write!(f, "Parse int error: {}", e),
            ConfigError::OtherError(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ParseIntError> for ConfigError {
    fn from(err: ParseIntError) -> ConfigError {
        ConfigError::ParseIntError(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifierKind {
    #[default]
    Log,
    Telegram,
    Email,
}

impl FromStr for NotifierKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "log" => Ok(NotifierKind::Log),
            "telegram" => Ok(NotifierKind::Telegram),
            "email" | "mail" => Ok(NotifierKind::Email),
            other => Err(ConfigError::OtherError(format!(
                "unknown notifier '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub email: Option<EmailConfig>,
    /// Prefix for notification subjects, usually the traded pair.
    pub token_name: String,
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub timezone_offset_secs: i32,
    pub log_file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct ExecutorYaml {
    exchange_name: Option<String>,
    scripted_exchange_file: Option<String>,
    poll_interval_secs: Option<u64>,
    poll_attempts: Option<u32>,
    notifier: Option<String>,
    telegram_bot_token: Option<String>,
    telegram_chat_id: Option<String>,
    smtp_server: Option<String>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    email_from: Option<String>,
    email_to: Option<String>,
    token_name: Option<String>,
    log_file: Option<String>,
    timezone_offset_secs: Option<i32>,
    pair_trade_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub exchange_name: String,
    pub scripted_exchange_file: Option<String>,
    pub poll: PollConfig,
    pub notifier: NotifierConfig,
    pub log: LogConfig,
    pub pair_trade_file: String,
}

impl ExecutorConfig {
    pub fn from_env_or_yaml() -> Result<Self> {
        let config_path = env::var("PAIRTRADE_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty());
        if let Some(path) = config_path {
            return Self::from_yaml_path(path);
        }
        Self::from_env()
    }

    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("failed to open executor config {}", path_ref.display()))?;
        let yaml: ExecutorYaml = serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse executor config {}", path_ref.display()))?;

        let kind = yaml
            .notifier
            .as_deref()
            .unwrap_or("log")
            .parse::<NotifierKind>()?;
        let email = match (yaml.smtp_server, yaml.email_to) {
            (Some(smtp_server), Some(to)) => Some(EmailConfig {
                smtp_server,
                smtp_username: yaml.smtp_username.unwrap_or_default(),
                smtp_password: yaml.smtp_password.unwrap_or_default(),
                from: yaml.email_from.unwrap_or_else(|| to.clone()),
                to,
            }),
            _ => None,
        };

        let cfg = ExecutorConfig {
            exchange_name: yaml
                .exchange_name
                .unwrap_or_else(|| DEFAULT_EXCHANGE_NAME.to_string()),
            scripted_exchange_file: yaml.scripted_exchange_file,
            poll: PollConfig {
                interval: Duration::from_secs(
                    yaml.poll_interval_secs
                        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
                ),
                attempts: yaml.poll_attempts.unwrap_or(DEFAULT_POLL_ATTEMPTS),
            },
            notifier: NotifierConfig {
                kind,
                telegram_bot_token: yaml.telegram_bot_token,
                telegram_chat_id: yaml.telegram_chat_id,
                email,
                token_name: yaml.token_name.unwrap_or_default(),
            },
            log: LogConfig {
                timezone_offset_secs: yaml
                    .timezone_offset_secs
                    .unwrap_or(DEFAULT_TIMEZONE_OFFSET_SECS),
                log_file: yaml.log_file,
            },
            pair_trade_file: yaml
                .pair_trade_file
                .unwrap_or_else(|| DEFAULT_PAIR_TRADE_FILE.to_string()),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let exchange_name =
            env::var("EXCHANGE_NAME").unwrap_or_else(|_| DEFAULT_EXCHANGE_NAME.to_string());
        let scripted_exchange_file = env::var("SCRIPTED_EXCHANGE_FILE").ok();
        let poll_interval_secs = env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_SECS.to_string())
            .parse::<u64>()
            .map_err(ConfigError::from)
            .context("POLL_INTERVAL_SECS")?;
        let poll_attempts = env::var("POLL_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_POLL_ATTEMPTS.to_string())
            .parse::<u32>()
            .map_err(ConfigError::from)
            .context("POLL_ATTEMPTS")?;
        let kind = env::var("NOTIFIER")
            .unwrap_or_default()
            .parse::<NotifierKind>()?;
        let timezone_offset_secs = env::var("TIMEZONE_OFFSET")
            .unwrap_or_else(|_| DEFAULT_TIMEZONE_OFFSET_SECS.to_string())
            .parse::<i32>()
            .map_err(ConfigError::from)
            .context("TIMEZONE_OFFSET")?;

        let cfg = ExecutorConfig {
            exchange_name,
            scripted_exchange_file,
            poll: PollConfig {
                interval: Duration::from_secs(poll_interval_secs),
                attempts: poll_attempts,
            },
            notifier: NotifierConfig {
                kind,
                telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
                telegram_chat_id: env::var("TELEGRAM_CHAT_ID").ok(),
                email: EmailConfig::from_env(),
                token_name: env::var("SYMBOLS")
                    .or_else(|_| env::var("SYMBOL"))
                    .unwrap_or_default(),
            },
            log: LogConfig {
                timezone_offset_secs,
                log_file: env::var("LOG_FILE").ok().filter(|v| !v.is_empty()),
            },
            pair_trade_file: env::var("PAIR_TRADE_FILE")
                .unwrap_or_else(|_| DEFAULT_PAIR_TRADE_FILE.to_string()),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.poll.attempts == 0 {
            return Err(ConfigError::OtherError(
                "poll_attempts must be at least 1".to_owned(),
            ));
        }
        if self.exchange_name == "scripted" && self.scripted_exchange_file.is_none() {
            return Err(ConfigError::OtherError(
                "scripted exchange requires scripted_exchange_file".to_owned(),
            ));
        }
        Ok(())
    }
}
