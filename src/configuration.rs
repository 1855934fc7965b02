use crate::{
    domain::{Tier, UserEmail},
    email_client::EmailClient,
    payment_client::PaymentClient,
    subscriptions::PriceTable,
};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::{
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions,
};
use std::time::Duration;
use tracing_log::log::LevelFilter;

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email_client: EmailClientSettings,
    pub payments: PaymentsSettings,
    pub notifications: NotificationSettings,
    pub redis_uri: Secret<String>,
}

impl Settings {
    fn ensure_secrets_present(&self) -> Result<(), config::ConfigError> {
        let required = [
            ("application.hmac_secret", &self.application.hmac_secret),
            ("database.password", &self.database.password),
            (
                "email_client.authorization_token",
                &self.email_client.authorization_token,
            ),
            ("payments.secret_key", &self.payments.secret_key),
            ("payments.webhook_secret", &self.payments.webhook_secret),
            ("redis_uri", &self.redis_uri),
        ];

        match required
            .iter()
            .find(|(_, secret)| secret.expose_secret().trim().is_empty())
        {
            Some((name, _)) => Err(config::ConfigError::Message(format!(
                "Required secret `{name}` is missing"
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub base_url: String,
    pub hmac_secret: Secret<String>,
    pub cors_origin: String,
}

#[derive(Clone, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db()
            .database(&self.database_name)
            .log_statements(LevelFilter::Trace)
    }

    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
            .ssl_mode(ssl_mode)
    }
}

#[derive(Clone, Deserialize)]
pub struct EmailClientSettings {
    pub base_url: String,
    sender_email: String,
    pub authorization_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn sender(&self) -> Result<UserEmail, String> {
        UserEmail::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn client(&self) -> Result<EmailClient, anyhow::Error> {
        let sender = self.sender().map_err(anyhow::Error::msg)?;
        EmailClient::new(
            self.base_url.clone(),
            sender,
            self.authorization_token.clone(),
            self.timeout(),
        )
    }
}

#[derive(Clone, Deserialize)]
pub struct PaymentsSettings {
    pub base_url: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub webhook_tolerance_seconds: u64,
    pub prices: PriceSettings,
}

impl PaymentsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn webhook_tolerance(&self) -> Duration {
        Duration::from_secs(self.webhook_tolerance_seconds)
    }

    pub fn client(&self) -> Result<PaymentClient, anyhow::Error> {
        PaymentClient::new(self.base_url.clone(), self.secret_key.clone(), self.timeout())
    }
}

/// Processor price identifiers sold for each paid tier.
#[derive(Clone, Deserialize)]
pub struct PriceSettings {
    pub plus: String,
    pub pro: String,
    pub ultra: String,
}

impl PriceSettings {
    pub fn table(&self) -> PriceTable {
        PriceTable::new([
            (self.plus.clone(), Tier::Plus),
            (self.pro.clone(), Tier::Pro),
            (self.ultra.clone(), Tier::Ultra),
        ])
    }
}

#[derive(Clone, Deserialize)]
pub struct NotificationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub cooldown_seconds: u64,
}

impl NotificationSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let config_dir = std::env::current_dir()
        .map(|dir| dir.join("configuration"))
        .map_err(|e| {
            config::ConfigError::Message(format!("Failed to determine the current directory: {e}"))
        })?;

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let env_config = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(config_dir.join("base.yaml")))
        .add_source(config::File::from(config_dir.join(env_config)))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.ensure_secrets_present()?;

    Ok(settings)
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "`{other}` is not a supported environment. Use either `local` or `production`."
            )),
        }
    }
}
