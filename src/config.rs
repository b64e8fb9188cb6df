use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::LLMError;
use crate::retry::{Jitter, RetryPolicy};

/// 默认请求超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// 供应商类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    Anthropic,
    Perplexity,
}

impl ProviderKind {
    /// 环境变量前缀 例如 `OPENAI`
    pub fn env_prefix(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI",
            ProviderKind::Anthropic => "ANTHROPIC",
            ProviderKind::Perplexity => "PPLX",
        }
    }

    /// base_url 对应的环境变量名 各家命名不统一
    pub fn base_url_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_BASE",
            ProviderKind::Anthropic => "ANTHROPIC_API_BASE_URL",
            ProviderKind::Perplexity => "PPLX_API_BASE_URL",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1/",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/",
            ProviderKind::Perplexity => "https://api.perplexity.ai/",
        }
    }

    /// Provider 名称 与错误和日志中的一致
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Perplexity => "perplexity",
        }
    }
}

/// Immutable, validated per-provider settings.
///
/// Construct through [`Settings::builder`], [`Settings::from_env`], or
/// [`Settings::from_config`]; every path runs the same validation, so a `Settings`
/// value always has a non-empty key, an http(s) base URL ending in `/`, a positive
/// timeout, and a valid [`RetryPolicy`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use llm_connectors::config::{ProviderKind, Settings};
///
/// let settings = Settings::builder(ProviderKind::OpenAi, "sk-test")
///     .timeout(Duration::from_secs(30))
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(settings.base_url().as_str(), "https://api.openai.com/v1/");
/// assert_eq!(settings.retry().max_retries(), 2);
/// ```
#[derive(Clone)]
pub struct Settings {
    provider: ProviderKind,
    api_key: String,
    base_url: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Settings {
    pub fn builder(provider: ProviderKind, api_key: impl Into<String>) -> SettingsBuilder {
        SettingsBuilder {
            provider,
            api_key: api_key.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: RetryPolicy::DEFAULT_MAX_RETRIES,
            backoff_factor: RetryPolicy::DEFAULT_BACKOFF_FACTOR,
            max_backoff: RetryPolicy::DEFAULT_MAX_BACKOFF,
            jitter: Jitter::None,
        }
    }

    /// 从进程环境变量读取配置
    ///
    /// Reads `<PREFIX>_API_KEY`, the provider's base URL variable, `<PREFIX>_TIMEOUT`
    /// (seconds), `<PREFIX>_MAX_RETRIES` and `<PREFIX>_BACKOFF_FACTOR`. Unset variables
    /// fall back to the defaults; the API key has no default.
    pub fn from_env(provider: ProviderKind) -> Result<Self, LLMError> {
        Self::from_lookup(provider, |key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but reads values through `lookup`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use llm_connectors::config::{ProviderKind, Settings};
    ///
    /// let vars = HashMap::from([
    ///     ("PPLX_API_KEY", "pplx-test"),
    ///     ("PPLX_MAX_RETRIES", "1"),
    /// ]);
    /// let settings = Settings::from_lookup(ProviderKind::Perplexity, |key| {
    ///     vars.get(key).map(|value| value.to_string())
    /// })
    /// .unwrap();
    /// assert_eq!(settings.retry().max_retries(), 1);
    /// ```
    pub fn from_lookup<F>(provider: ProviderKind, lookup: F) -> Result<Self, LLMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = provider.env_prefix();
        let var = |suffix: &str| {
            let key = format!("{prefix}_{suffix}");
            lookup(&key)
                .filter(|value| !value.trim().is_empty())
                .map(|value| (key, value))
        };

        let api_key_var = format!("{prefix}_API_KEY");
        let api_key = lookup(&api_key_var).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(LLMError::configuration(
                "api_key",
                format!("{api_key_var} must be provided either explicitly or via environment"),
            ));
        }

        let config = SettingsConfig {
            provider,
            api_key,
            base_url: lookup(provider.base_url_env()).filter(|v| !v.trim().is_empty()),
            timeout_secs: var("TIMEOUT")
                .map(|(key, value)| parse_number::<f64>(&key, &value))
                .transpose()?,
            max_retries: var("MAX_RETRIES")
                .map(|(key, value)| parse_number::<i64>(&key, &value))
                .transpose()?,
            backoff_factor: var("BACKOFF_FACTOR")
                .map(|(key, value)| parse_number::<f64>(&key, &value))
                .transpose()?,
            max_backoff_secs: None,
            jitter: None,
        };
        Self::from_config(config)
    }

    /// Builds settings from a deserialized [`SettingsConfig`].
    pub fn from_config(config: SettingsConfig) -> Result<Self, LLMError> {
        let mut builder = Settings::builder(config.provider, config.api_key);
        if let Some(base_url) = config.base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(seconds("timeout", secs)?);
        }
        if let Some(retries) = config.max_retries {
            let retries = u32::try_from(retries).map_err(|_| {
                LLMError::configuration(
                    "max_retries",
                    format!("must be a non-negative integer, got {retries}"),
                )
            })?;
            builder = builder.max_retries(retries);
        }
        if let Some(factor) = config.backoff_factor {
            builder = builder.backoff_factor(factor);
        }
        if let Some(secs) = config.max_backoff_secs {
            builder = builder.max_backoff(seconds("max_backoff", secs)?);
        }
        if let Some(jitter) = config.jitter {
            builder = builder.jitter(jitter.into());
        }
        builder.build()
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Resolves `path` relative to the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<String, LLMError> {
        self.base_url
            .join(path)
            .map(String::from)
            .map_err(|err| LLMError::configuration("base_url", format!("cannot join {path}: {err}")))
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Builder for [`Settings`]; validation happens in [`SettingsBuilder::build`].
#[derive(Debug, Clone)]
pub struct SettingsBuilder {
    provider: ProviderKind,
    api_key: String,
    base_url: Option<String>,
    timeout: Duration,
    max_retries: u32,
    backoff_factor: f64,
    max_backoff: Duration,
    jitter: Jitter,
}

impl SettingsBuilder {
    /// 自定义 base_url 便于接入代理或兼容层
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Upper bound for a single backoff delay.
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validates the collected values.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Configuration`] naming the first invalid field.
    pub fn build(self) -> Result<Settings, LLMError> {
        let api_key = self.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(LLMError::configuration(
                "api_key",
                format!("{}_API_KEY must not be empty", self.provider.env_prefix()),
            ));
        }

        let raw_url = self
            .base_url
            .unwrap_or_else(|| self.provider.default_base_url().to_string());
        let base_url = parse_base_url(&raw_url)?;

        if self.timeout.is_zero() {
            return Err(LLMError::configuration("timeout", "must be positive"));
        }

        let retry = RetryPolicy::new(self.max_retries, self.backoff_factor, self.max_backoff)?
            .with_jitter(self.jitter);

        Ok(Settings {
            provider: self.provider,
            api_key,
            base_url,
            timeout: self.timeout,
            retry,
        })
    }
}

/// Serializable settings shape, for callers that keep provider configuration in their
/// own config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, alias = "timeout")]
    pub timeout_secs: Option<f64>,
    /// Signed so that negative values coming from config files are reported instead of
    /// failing deserialization with an opaque message.
    #[serde(default)]
    pub max_retries: Option<i64>,
    #[serde(default)]
    pub backoff_factor: Option<f64>,
    #[serde(default)]
    pub max_backoff_secs: Option<f64>,
    #[serde(default)]
    pub jitter: Option<JitterConfig>,
}

/// Jitter strategy as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterConfig {
    None,
    Full,
}

impl From<JitterConfig> for Jitter {
    fn from(value: JitterConfig) -> Self {
        match value {
            JitterConfig::None => Jitter::None,
            JitterConfig::Full => Jitter::Full,
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, LLMError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|err| LLMError::configuration("base_url", format!("{raw:?}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LLMError::configuration(
            "base_url",
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() {
        return Err(LLMError::configuration("base_url", format!("{raw:?} cannot be a base URL")));
    }
    // 保证以 / 结尾 否则 join 会吞掉最后一段路径 例如 /v1
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn seconds(field: &str, secs: f64) -> Result<Duration, LLMError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(LLMError::configuration(
            field,
            format!("must be a positive number of seconds, got {secs}"),
        ));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|err| LLMError::configuration(field, format!("{secs}: {err}")))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, LLMError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| LLMError::configuration(key, format!("cannot parse {value:?}: {err}")))
}
