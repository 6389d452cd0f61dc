use serde::Deserialize;

pub const DEFAULT_TTL_SECONDS: u64 = 21600;
pub const DEFAULT_MAX_RESULTS: usize = 8;
/// Hard cap on similar titles per seed, whatever the configuration says
pub const MAX_RESULTS_CEILING: usize = 20;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Gemini API key used when a request does not carry its own
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    /// TMDB read token used when a request does not carry its own
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    /// Lifetime of non-empty similar lists
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Similar titles per seed when a request does not say
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Cinemeta base URL
    #[serde(default = "default_cinemeta_url")]
    pub cinemeta_url: String,

    /// Gemini models endpoint
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_url")]
    pub tmdb_url: String,

    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,

    #[serde(default = "default_llm_retries")]
    pub llm_retries: u32,

    #[serde(default = "default_llm_base_delay_ms")]
    pub llm_base_delay_ms: u64,

    /// Generations admitted per credential within one window
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: usize,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// How long a request waits on a fresh orchestration before answering empty
    #[serde(default = "default_response_deadline_ms")]
    pub response_deadline_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_cache_ttl() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_cinemeta_url() -> String {
    "https://v3-cinemeta.strem.io".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_tmdb_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_llm_timeout_ms() -> u64 {
    20_000
}

fn default_llm_retries() -> u32 {
    2
}

fn default_llm_base_delay_ms() -> u64 {
    300
}

fn default_rate_limit_max_requests() -> usize {
    30
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_response_deadline_ms() -> u64 {
    8_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            gemini_api_key: None,
            tmdb_api_key: None,
            cache_ttl_seconds: default_cache_ttl(),
            max_results: default_max_results(),
            cinemeta_url: default_cinemeta_url(),
            gemini_url: default_gemini_url(),
            gemini_model: default_gemini_model(),
            tmdb_url: default_tmdb_url(),
            llm_timeout_ms: default_llm_timeout_ms(),
            llm_retries: default_llm_retries(),
            llm_base_delay_ms: default_llm_base_delay_ms(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            response_deadline_ms: default_response_deadline_ms(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}

/// Per-request settings as they arrive from the query string or catalog extra
///
/// Numbers stay strings here so an unparsable value falls back to a default
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestOverrides {
    #[serde(default)]
    pub gemini_key: Option<String>,
    #[serde(default)]
    pub tmdb_key: Option<String>,
    #[serde(default)]
    pub ttl: Option<String>,
    #[serde(default)]
    pub max: Option<String>,
}

impl RequestOverrides {
    /// Fills unset fields from `fallback`; values already set win
    pub fn or(self, fallback: RequestOverrides) -> Self {
        Self {
            gemini_key: self.gemini_key.or(fallback.gemini_key),
            tmdb_key: self.tmdb_key.or(fallback.tmdb_key),
            ttl: self.ttl.or(fallback.ttl),
            max: self.max.or(fallback.max),
        }
    }
}

/// Effective settings for one similarity lookup
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Language-model credential; `None` disables generation
    pub credential: Option<String>,
    /// Optional secondary lookup credential
    pub secondary_credential: Option<String>,
    pub ttl_seconds: u64,
    pub max_results: usize,
}

impl RuntimeConfig {
    /// Request values first, then startup configuration
    pub fn resolve(overrides: &RequestOverrides, config: &Config) -> Self {
        let credential = non_blank(overrides.gemini_key.as_deref())
            .or_else(|| non_blank(config.gemini_api_key.as_deref()));
        let secondary_credential = non_blank(overrides.tmdb_key.as_deref())
            .or_else(|| non_blank(config.tmdb_api_key.as_deref()));

        let ttl_seconds = match overrides.ttl.as_deref() {
            Some(raw) => raw.trim().parse().unwrap_or(DEFAULT_TTL_SECONDS),
            None => config.cache_ttl_seconds,
        };

        let requested_max = overrides
            .max
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|max| *max != 0)
            .unwrap_or(config.max_results as i64);

        Self {
            credential,
            secondary_credential,
            ttl_seconds,
            max_results: clamp_max_results(requested_max),
        }
    }
}

/// Clamps a requested result count into `[1, MAX_RESULTS_CEILING]`
pub fn clamp_max_results(requested: i64) -> usize {
    requested.clamp(1, MAX_RESULTS_CEILING as i64) as usize
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(max: Option<&str>, ttl: Option<&str>) -> RequestOverrides {
        RequestOverrides {
            max: max.map(str::to_string),
            ttl: ttl.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.cache_ttl_seconds, 21600);
        assert_eq!(config.max_results, 8);
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.gemini_model, "gemini-1.5-flash");
    }

    #[test]
    fn test_environment_values_override_defaults() {
        let config: Config = envy::from_iter(vec![
            ("GEMINI_API_KEY".to_string(), "key-1".to_string()),
            ("CACHE_TTL_SECONDS".to_string(), "600".to_string()),
            ("PORT".to_string(), "8080".to_string()),
        ])
        .unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("key-1"));
        assert_eq!(config.cache_ttl_seconds, 600);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_max_results_is_clamped() {
        let config = Config::default();
        assert_eq!(RuntimeConfig::resolve(&overrides(Some("50"), None), &config).max_results, 20);
        assert_eq!(RuntimeConfig::resolve(&overrides(Some("-3"), None), &config).max_results, 1);
        assert_eq!(RuntimeConfig::resolve(&overrides(Some("5"), None), &config).max_results, 5);
        assert_eq!(RuntimeConfig::resolve(&overrides(Some("0"), None), &config).max_results, 8);
        assert_eq!(RuntimeConfig::resolve(&overrides(Some("abc"), None), &config).max_results, 8);
    }

    #[test]
    fn test_ttl_falls_back_on_garbage() {
        let config = Config {
            cache_ttl_seconds: 900,
            ..Config::default()
        };
        assert_eq!(RuntimeConfig::resolve(&overrides(None, None), &config).ttl_seconds, 900);
        assert_eq!(RuntimeConfig::resolve(&overrides(None, Some("60")), &config).ttl_seconds, 60);
        assert_eq!(
            RuntimeConfig::resolve(&overrides(None, Some("forever")), &config).ttl_seconds,
            DEFAULT_TTL_SECONDS
        );
    }

    #[test]
    fn test_credentials_prefer_request_values() {
        let config = Config {
            gemini_api_key: Some("server-key".to_string()),
            ..Config::default()
        };

        let runtime = RuntimeConfig::resolve(&RequestOverrides::default(), &config);
        assert_eq!(runtime.credential.as_deref(), Some("server-key"));
        assert_eq!(runtime.secondary_credential, None);

        let request = RequestOverrides {
            gemini_key: Some("user-key".to_string()),
            tmdb_key: Some("  ".to_string()),
            ..Default::default()
        };
        let runtime = RuntimeConfig::resolve(&request, &config);
        assert_eq!(runtime.credential.as_deref(), Some("user-key"));
        assert_eq!(runtime.secondary_credential, None);
    }

    #[test]
    fn test_missing_credential_is_none() {
        let runtime = RuntimeConfig::resolve(&RequestOverrides::default(), &Config::default());
        assert_eq!(runtime.credential, None);
    }

    #[test]
    fn test_overrides_or_prefers_self() {
        let extra = overrides(Some("3"), None);
        let query = RequestOverrides {
            gemini_key: Some("k".to_string()),
            max: Some("9".to_string()),
            ..Default::default()
        };
        let merged = extra.or(query);
        assert_eq!(merged.max.as_deref(), Some("3"));
        assert_eq!(merged.gemini_key.as_deref(), Some("k"));
    }
}
