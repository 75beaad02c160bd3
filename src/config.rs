use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

pub const CONFIG_FILE: &str = "chronikos.toml";
pub const ENV_PREFIX: &str = "CHRONIKOS_";

/// Runtime configuration, layered as defaults <- `chronikos.toml` <- `CHRONIKOS_*` env.
///
/// Nested keys use `__` in the environment, e.g. `CHRONIKOS_LLM__API_KEY`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub push: PushConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    pub proxy: Option<Url>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite://chronikos.sqlite".to_string(),
            loglevel: "info".to_string(),
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the hosted auth provider.
    pub jwt_secret: String,
    pub audience: String,
    /// Session cookie carrying the access token for browser requests.
    pub cookie_name: String,
    /// Bearer secret for the cron/admin routes. Open when unset.
    pub cron_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            audience: "authenticated".to_string(),
            cookie_name: "sb-access-token".to_string(),
            cron_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: Url::parse("https://api.openai.com/v1/").expect("static url is valid"),
            model: "gpt-4o".to_string(),
            max_tokens: 800,
            temperature: 0.7,
            requests_per_minute: 30,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// PEM-encoded P-256 private key used for VAPID signatures. Push is disabled when unset.
    pub vapid_private_key_pem: Option<String>,
    pub vapid_subject: String,
    pub icon: String,
    pub ttl_secs: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_private_key_pem: None,
            vapid_subject: "mailto:admin@chronikos.app".to_string(),
            icon: "/web-app-manifest-192x192.png".to_string(),
            ttl_secs: 60 * 60 * 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub window_minutes: u32,
    pub fact_cooldown_hours: i64,
    /// Internal dispatch tick; 0 leaves dispatch to the cron endpoint only.
    pub tick_interval_secs: u64,
    pub dispatch_concurrency: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_minutes: 5,
            fact_cooldown_hours: 24,
            tick_interval_secs: 0,
            dispatch_concurrency: 8,
        }
    }
}

impl Config {
    /// Load configuration from `chronikos.toml` in the working directory and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }
}
