use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::domain::{PhoneNumber, SubscriberEmail};
use crate::email_client::SmtpMailer;
use crate::helpers::error_chain_fmt;
use crate::messaging_client::WhatsAppClient;
use crate::quote_client::QuoteClient;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub ingestion: IngestionSettings,
    pub subscribers: SubscriberQuerySettings,
    pub quotes: QuoteSettings,
    pub email_client: EmailClientSettings,
    pub whatsapp: WhatsAppSettings,
    pub log_dir: PathBuf,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: SecretString,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db()
            .database(&self.database_name)
            .log_statements(tracing::log::LevelFilter::Trace)
    }

    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct IngestionSettings {
    pub sheet_url: String,
    pub csv_path: PathBuf,
    pub table: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub batch_size: usize,
    pub incremental: bool,
    pub timestamp_column: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_ms: u64,
}

impl IngestionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Table and column names of the opted-in subscriber query.
#[derive(serde::Deserialize, Debug, Clone)]
pub struct SubscriberQuerySettings {
    pub table: String,
    pub first_name_column: String,
    pub last_name_column: String,
    pub email_column: String,
    pub status_column: String,
    pub opt_in_value: String,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct QuoteSettings {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_ms: u64,
}

impl QuoteSettings {
    pub fn client(&self) -> QuoteClient {
        QuoteClient::new(self.base_url.clone(), self.timeout())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct EmailClientSettings {
    pub smtp_host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub smtp_port: u16,
    pub sender_email: String,
    pub sender_password: SecretString,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub send_interval_secs: u64,
    pub require_tls: bool,
}

impl EmailClientSettings {
    pub fn mailer(&self) -> Result<SmtpMailer, String> {
        Ok(SmtpMailer::new(
            self.smtp_host.clone(),
            self.smtp_port,
            self.sender()?,
            self.sender_password.clone(),
            self.timeout(),
            self.require_tls,
        ))
    }

    pub fn sender(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct WhatsAppSettings {
    pub form_link: Option<String>,
    pub message_template: Option<String>,
    pub sender_name: Option<String>,
    pub contacts: Option<String>,
    pub api_base_url: String,
    pub phone_number_id: String,
    pub access_token: SecretString,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub lead_time_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub send_interval_secs: u64,
}

/// The validated inputs of one broadcast run.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub form_link: String,
    pub message_template: String,
    pub sender_name: String,
    pub contacts: Vec<PhoneNumber>,
}

#[derive(thiserror::Error)]
#[error("Missing required WhatsApp settings: {}", .0.join(", "))]
pub struct MissingSettings(pub Vec<&'static str>);

impl std::fmt::Debug for MissingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl WhatsAppSettings {
    /// Empty strings count as missing.
    pub fn broadcast(&self) -> Result<Broadcast, MissingSettings> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.trim().is_empty())
        }

        let required = [
            ("form_link", present(&self.form_link)),
            ("message_template", present(&self.message_template)),
            ("sender_name", present(&self.sender_name)),
            ("contacts", present(&self.contacts)),
        ];
        match required {
            [
                (_, Some(form_link)),
                (_, Some(message_template)),
                (_, Some(sender_name)),
                (_, Some(contacts)),
            ] => {
                let contacts = PhoneNumber::parse_list(contacts);
                if contacts.is_empty() {
                    return Err(MissingSettings(vec!["contacts"]));
                }
                Ok(Broadcast {
                    form_link: form_link.to_string(),
                    message_template: message_template.to_string(),
                    sender_name: sender_name.to_string(),
                    contacts,
                })
            }
            _ => Err(MissingSettings(
                required
                    .iter()
                    .filter(|(_, value)| value.is_none())
                    .map(|(key, _)| *key)
                    .collect(),
            )),
        }
    }

    pub fn client(&self) -> WhatsAppClient {
        WhatsAppClient::new(
            self.api_base_url.clone(),
            self.phone_number_id.clone(),
            self.access_token.clone(),
            self.lead_time(),
        )
    }

    pub fn lead_time(&self) -> Duration {
        Duration::from_secs(self.lead_time_secs)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "{other} is not supported environment. Try to use `local` or `production`",
            )),
        }
    }
}

#[derive(thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to determine the configuration directory.")]
    Directory(#[source] std::io::Error),
    #[error("{0}")]
    Environment(String),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl std::fmt::Debug for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub fn get_configuration() -> Result<Settings, ConfigurationError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir().map_err(ConfigurationError::Directory)?;
    let conf_dir = base_path.join("configuration");
    let env: Environment = std::env::var("APP_ENV")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigurationError::Environment)?;

    let settings = config::Config::builder()
        .add_source(config::File::from(conf_dir.join("base")).required(true))
        .add_source(config::File::from(conf_dir.join(env.as_str())).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .separator("__")
                .prefix_separator("_"),
        )
        .build()?;

    Ok(settings.try_deserialize::<Settings>()?)
}
