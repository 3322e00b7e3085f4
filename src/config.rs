//! Configuration for the outreach pipeline.
//!
//! Every section has working defaults; `PipelineConfig::from_env` overlays
//! `OUTREACH_*` environment variables (and a `.env` file when one exists).

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PipelineError, PipelineResult};
use crate::sheets::auth::GOOGLE_TOKEN_URL;

/// Top-level configuration for a pipeline run and its control server.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Spreadsheet location and credentials.
    pub sheet: SheetConfig,
    /// Completion service settings.
    pub completion: CompletionConfig,
    /// Source content fetch settings.
    pub fetch: FetchConfig,
    /// Chunked scheduling settings.
    pub batch: BatchConfig,
    /// Control server settings.
    pub server: ServerConfig,
}

impl PipelineConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> PipelineResult<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(%err, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment-shaped).
    ///
    /// # Errors
    /// Returns an error if a numeric value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = get("OUTREACH_SHEET_ID") {
            config.sheet.spreadsheet_id = id;
        }
        if let Some(name) = get("OUTREACH_SHEET_NAME") {
            config.sheet.sheet_name = name;
        }
        if let Some(range) = get("OUTREACH_DATA_RANGE") {
            config.sheet.data_range = range;
        }
        if let Some(range) = get("OUTREACH_PROMPTS_RANGE") {
            config.sheet.prompts_range = range;
        }
        if let Some(base) = get("OUTREACH_SHEETS_BASE_URL") {
            config.sheet.api_base_url = base;
        }
        if let Some(url) = get("OUTREACH_SHEETS_TOKEN_URL") {
            config.sheet.token_url = url;
        }
        if let Some(path) = get("OUTREACH_SHEETS_TOKEN_FILE") {
            config.sheet.credentials = CredentialsSource::AuthorizedUserFile {
                path: PathBuf::from(path),
            };
        }
        if let Some(token) = get("OUTREACH_SHEETS_TOKEN") {
            config.sheet.credentials = CredentialsSource::AccessToken { token };
        }

        if let Some(key) = get("OUTREACH_API_KEY").or_else(|| get("CHATGPT_API_KEY")) {
            config.completion.api_key = key;
        }
        if let Some(model) = get("OUTREACH_MODEL") {
            config.completion.model = model;
        }
        if let Some(base) = get("OUTREACH_API_BASE_URL") {
            config.completion.base_url = base;
        }
        if let Some(value) = get("OUTREACH_MAX_RESPONSE_TOKENS") {
            config.completion.max_response_tokens = parse_var("OUTREACH_MAX_RESPONSE_TOKENS", &value)?;
        }
        if let Some(value) = get("OUTREACH_MAX_RATE_LIMIT_RETRIES") {
            config.completion.max_rate_limit_retries =
                Some(parse_var("OUTREACH_MAX_RATE_LIMIT_RETRIES", &value)?);
        }

        if let Some(value) = get("OUTREACH_CHUNK_SIZE") {
            config.batch.initial_chunk_size = parse_var("OUTREACH_CHUNK_SIZE", &value)?;
        }
        if let Some(value) = get("OUTREACH_CHUNK_DELAY_MS") {
            config.batch.inter_chunk_delay =
                Duration::from_millis(parse_var("OUTREACH_CHUNK_DELAY_MS", &value)?);
        }

        if let Some(value) = get("OUTREACH_PORT") {
            config.server.port = parse_var("OUTREACH_PORT", &value)?;
        }

        Ok(config)
    }

    /// Set the spreadsheet id.
    #[must_use]
    pub fn with_spreadsheet_id(mut self, id: impl Into<String>) -> Self {
        self.sheet.spreadsheet_id = id.into();
        self
    }

    /// Set the completion API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.completion.api_key = key.into();
        self
    }

    /// Set the initial chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.batch.initial_chunk_size = size;
        self
    }

    /// Set the pause between successful chunks.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.batch.inter_chunk_delay = delay;
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.sheet.spreadsheet_id.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "sheet.spreadsheet_id must be set".to_string(),
            ));
        }

        if self.batch.initial_chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch.initial_chunk_size must be > 0".to_string(),
            ));
        }

        if self.completion.model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "completion.model must be set".to_string(),
            ));
        }

        if self.completion.response_token_reserve >= self.completion.prompt_token_ceiling {
            return Err(PipelineError::InvalidConfig(
                "completion.response_token_reserve must be < prompt_token_ceiling".to_string(),
            ));
        }

        for (field, base) in [
            ("completion.base_url", &self.completion.base_url),
            ("sheet.api_base_url", &self.sheet.api_base_url),
            ("sheet.token_url", &self.sheet.token_url),
        ] {
            Url::parse(base)
                .map_err(|err| PipelineError::InvalidConfig(format!("{field}: {err}")))?;
        }

        Ok(())
    }
}

/// Spreadsheet location and credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Spreadsheet id holding both the records and the prompts.
    pub spreadsheet_id: String,
    /// Name of the sheet holding the records.
    pub sheet_name: String,
    /// A1 range of the record rows, relative to `sheet_name`.
    pub data_range: String,
    /// Fully-qualified A1 range of the prompts row.
    pub prompts_range: String,
    /// Sheets API base URL.
    pub api_base_url: String,
    /// OAuth endpoint that exchanges refresh tokens.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Where the bearer token comes from.
    pub credentials: CredentialsSource,
}

impl SheetConfig {
    /// Fully-qualified A1 range of the record rows.
    #[must_use]
    pub fn qualified_data_range(&self) -> String {
        format!("{}!{}", self.sheet_name, self.data_range)
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: "Responses".to_string(),
            data_range: "A2:O".to_string(),
            prompts_range: "Prompts!2:2".to_string(),
            api_base_url: "https://sheets.googleapis.com/v4".to_string(),
            token_url: default_token_url(),
            credentials: CredentialsSource::default(),
        }
    }
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// Source of the Sheets bearer token.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialsSource {
    /// A ready-to-use OAuth access token.
    AccessToken {
        /// Bearer token value.
        token: String,
    },
    /// An authorized-user file holding a refresh token.
    AuthorizedUserFile {
        /// Path to the JSON file.
        path: PathBuf,
    },
}

impl Default for CredentialsSource {
    fn default() -> Self {
        Self::AuthorizedUserFile {
            path: PathBuf::from("token.json"),
        }
    }
}

/// Completion service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// API base URL (without the `/chat/completions` suffix).
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens requested for each response.
    pub max_response_tokens: u32,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Prompts estimated above this many tokens get truncated.
    pub prompt_token_ceiling: usize,
    /// Headroom kept for the response when truncating.
    pub response_token_reserve: usize,
    /// Upper bound on rate-limit retries; `None` retries indefinitely.
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_response_tokens: 4096,
            request_timeout: Duration::from_secs(300),
            prompt_token_ceiling: 128_000,
            response_token_reserve: 30_000,
            max_rate_limit_retries: None,
        }
    }
}

/// Source content fetch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Maximum content length to download (bytes).
    pub max_content_length: usize,
    /// User agents to rotate.
    pub user_agents: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_content_length: 10 * 1024 * 1024, // 10 MB
            user_agents: default_user_agents(),
        }
    }
}

impl FetchConfig {
    /// Get a random user agent from the rotation list.
    #[must_use]
    pub fn random_user_agent(&self) -> String {
        if self.user_agents.is_empty() {
            return default_user_agents().swap_remove(0);
        }
        let mut rng = rand::thread_rng();
        let idx = rng.gen_range(0..self.user_agents.len());
        self.user_agents[idx].clone()
    }
}

/// Chunked scheduling settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records per chunk before any failure shrinks it.
    pub initial_chunk_size: usize,
    /// Pause after a fully successful chunk when records remain.
    #[serde(with = "duration_serde")]
    pub inter_chunk_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_chunk_size: 20,
            inter_chunk_delay: Duration::from_secs(1),
        }
    }
}

/// Control server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::server::DEFAULT_PORT,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> PipelineResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| PipelineError::InvalidConfig(format!("{key}={value}: {err}")))
}

/// Default user agents for rotation.
fn default_user_agents() -> Vec<String> {
    vec![
        // Chrome on Windows
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
        // Chrome on macOS
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
        // Firefox on Linux
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
        // Safari on macOS
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
    ]
}

/// Serde module for Duration serialization, in milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
