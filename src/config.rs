use std::env;
use std::time::Duration;

use url::Url;

use crate::circuit_breaker::MAX_COOLDOWN;
use crate::error::{ClientError, Result};
use crate::message::SessionInfo;

pub const API_KEY_ENV: &str = "ADMATCH_API_KEY";
pub const API_URL_ENV: &str = "ADMATCH_API_URL";
pub const TIMEOUT_ENV: &str = "ADMATCH_TIMEOUT_SECS";
pub const MAX_QUEUE_SIZE_ENV: &str = "ADMATCH_MAX_QUEUE_SIZE";
pub const ERROR_THRESHOLD_ENV: &str = "ADMATCH_ERROR_THRESHOLD";
pub const COOLDOWN_ENV: &str = "ADMATCH_COOLDOWN_SECS";
pub const CONTEXT_TEMPLATE_ENV: &str = "ADMATCH_CONTEXT_TEMPLATE";
pub const LOGGING_ENV: &str = "ADMATCH_LOGGING";

pub const DEFAULT_API_URL: &str = "https://api.admatch.dev/v1/match";
pub const DEFAULT_CONTEXT_TEMPLATE: &str =
    "If relevant, mention {ad_title} ({ad_description}). {placement_template}";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;
pub const DEFAULT_ERROR_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Settings for an [`crate::AdClient`].
///
/// `api_key` and `api_url` may be left unset; they are resolved from the
/// environment exactly once, when the client is built.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub session: SessionInfo,
    pub context_template: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout: Duration,
    pub logging: bool,
    pub max_queue_size: usize,
    pub error_threshold: u32,
    pub cooldown: Duration,
}

/// Values fixed at client construction.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub session: SessionInfo,
    pub context_template: String,
    pub api_key: String,
    pub api_url: Url,
    pub timeout: Duration,
    pub logging: bool,
    pub max_queue_size: usize,
    pub error_threshold: u32,
    pub cooldown: Duration,
}

impl ClientConfig {
    pub fn new(session: SessionInfo) -> Self {
        Self {
            session,
            context_template: DEFAULT_CONTEXT_TEMPLATE.to_string(),
            api_key: None,
            api_url: None,
            timeout: DEFAULT_TIMEOUT,
            logging: true,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    /// Build a config from `ADMATCH_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env(session: SessionInfo) -> Result<Self> {
        Self::from_lookup(session, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(session: SessionInfo, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(session);
        config.api_key = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty());
        config.api_url = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty());
        if let Some(secs) = parse_var::<u64>(&lookup, TIMEOUT_ENV)? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(size) = parse_var::<usize>(&lookup, MAX_QUEUE_SIZE_ENV)? {
            config.max_queue_size = size;
        }
        if let Some(threshold) = parse_var::<u32>(&lookup, ERROR_THRESHOLD_ENV)? {
            config.error_threshold = threshold;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, COOLDOWN_ENV)? {
            config.cooldown = Duration::from_secs(secs);
        }
        if let Some(template) = lookup(CONTEXT_TEMPLATE_ENV) {
            config.context_template = template;
        }
        if let Some(logging) = parse_var::<bool>(&lookup, LOGGING_ENV)? {
            config.logging = logging;
        }
        Ok(config)
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn context_template(mut self, template: impl Into<String>) -> Self {
        self.context_template = template.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub(crate) fn resolve(self) -> Result<ResolvedConfig> {
        self.resolve_with(|key| env::var(key).ok())
    }

    pub(crate) fn resolve_with<F>(self, lookup: F) -> Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| lookup(API_KEY_ENV).filter(|key| !key.trim().is_empty()))
            .ok_or(ClientError::MissingApiKey(API_KEY_ENV))?;

        let raw_url = self
            .api_url
            .or_else(|| lookup(API_URL_ENV))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&raw_url)
            .map_err(|e| ClientError::InvalidConfig(format!("api url '{}': {}", raw_url, e)))?;

        if self.max_queue_size == 0 {
            return Err(ClientError::InvalidConfig("max_queue_size must be at least 1".to_string()));
        }
        if self.error_threshold == 0 {
            return Err(ClientError::InvalidConfig("error_threshold must be at least 1".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::InvalidConfig("timeout must be non-zero".to_string()));
        }
        if self.cooldown > MAX_COOLDOWN {
            return Err(ClientError::InvalidConfig(format!(
                "cooldown must be at most {}s",
                MAX_COOLDOWN.as_secs()
            )));
        }

        Ok(ResolvedConfig {
            session: self.session,
            context_template: self.context_template,
            api_key,
            api_url,
            timeout: self.timeout,
            logging: self.logging,
            max_queue_size: self.max_queue_size,
            error_threshold: self.error_threshold,
            cooldown: self.cooldown,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ClientError::InvalidConfig(format!("{}='{}': {}", key, raw, e))),
        None => Ok(None),
    }
}
