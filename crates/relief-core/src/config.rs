use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ReliefError};

/// Top-level Relief Crew configuration.
///
/// Built once at process start (from a TOML file or from the environment)
/// and passed by reference to whichever component needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub crew: CrewConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
}

/// Which chat-completion backend is active for this process.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    OpenAi,
    Groq,
}

impl ModelProvider {
    /// Model used when `model_id` is not set.
    pub fn default_model_id(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4-turbo",
            Self::Groq => "llama3-8b-8192",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Some(Self::OpenAi),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Groq => write!(f, "groq"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,
    /// Model name. Defaults to the provider's default model.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Override the provider's chat-completions endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            model_id: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

impl ModelConfig {
    /// The model name sent to the provider.
    pub fn model_id(&self) -> &str {
        self.model_id
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model_id())
    }
}

fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.7 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// The three secrets the model clients and the search tool need.
///
/// All three must be present at startup, even though only one model
/// provider is active.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub serper_api_key: Option<String>,
}

impl Credentials {
    /// Fail on the first missing secret. Contents are not inspected beyond presence.
    pub fn validate(&self) -> Result<()> {
        require(&self.openai_api_key, "openai_api_key")?;
        require(&self.groq_api_key, "groq_api_key")?;
        require(&self.serper_api_key, "serper_api_key")?;
        Ok(())
    }

    /// API key for the given model provider.
    pub fn model_key(&self, provider: ModelProvider) -> Result<&str> {
        match provider {
            ModelProvider::OpenAi => require(&self.openai_api_key, "openai_api_key"),
            ModelProvider::Groq => require(&self.groq_api_key, "groq_api_key"),
        }
    }

    pub fn serper_key(&self) -> Result<&str> {
        require(&self.serper_api_key, "serper_api_key")
    }

    /// Copy with every present secret replaced by a mask, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        Self {
            openai_api_key: mask(&self.openai_api_key),
            groq_api_key: mask(&self.groq_api_key),
            serper_api_key: mask(&self.serper_api_key),
        }
    }
}

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        // An unexpanded ${VAR} means the variable was not set at load time
        Some(v) if !v.is_empty() && !(v.starts_with("${") && v.ends_with('}')) => Ok(v),
        _ => Err(ReliefError::MissingCredential(name)),
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.is_some())
            .field("groq_api_key", &self.groq_api_key.is_some())
            .field("serper_api_key", &self.serper_api_key.is_some())
            .finish()
    }
}

/// Settings for the relief crew itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewConfig {
    /// Topic label embedded in every input bundle.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Tool rounds each persona may take before it must answer.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Print task and tool progress to stderr from the CLI.
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            max_iterations: default_max_iterations(),
            verbose: default_verbose(),
        }
    }
}

fn default_topic() -> String { "Earthquake Disaster Relief".to_string() }
fn default_max_iterations() -> u32 { 3 }
fn default_verbose() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Wall-clock limit for a single work item.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
    /// Tool output longer than this is truncated before it reaches the model.
    #[serde(default = "default_max_tool_output_chars")]
    pub max_tool_output_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration(),
            max_tool_output_chars: default_max_tool_output_chars(),
        }
    }
}

fn default_max_duration() -> u64 { 600 }
fn default_max_tool_output_chars() -> usize { 8_000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String { "127.0.0.1:8501".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ReliefError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded)
            .map_err(|e| ReliefError::Config(e.to_string()))
    }

    /// Build a config from environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a variable lookup (`OPENAI_API_KEY`, `GROQ_API_KEY`,
    /// `SERPER_API_KEY`, `RELIEF_PROVIDER`, `RELIEF_MODEL`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider = match lookup("RELIEF_PROVIDER") {
            Some(p) => ModelProvider::parse(&p)
                .ok_or_else(|| ReliefError::Config(format!("Unknown provider: {}", p)))?,
            None => ModelProvider::default(),
        };

        Ok(Self {
            model: ModelConfig {
                provider,
                model_id: lookup("RELIEF_MODEL"),
                ..ModelConfig::default()
            },
            credentials: Credentials {
                openai_api_key: lookup("OPENAI_API_KEY"),
                groq_api_key: lookup("GROQ_API_KEY"),
                serper_api_key: lookup("SERPER_API_KEY"),
            },
            crew: CrewConfig::default(),
            agent: AgentConfig::default(),
            gateway: None,
        })
    }

    /// Startup checks: credentials present, crew settings usable.
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        if self.crew.max_iterations == 0 {
            return Err(ReliefError::Config("crew.max_iterations must be at least 1".into()));
        }
        if self.crew.topic.trim().is_empty() {
            return Err(ReliefError::Config("crew.topic must not be empty".into()));
        }
        Ok(())
    }

    /// Copy safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            credentials: self.credentials.redacted(),
            ..self.clone()
        }
    }

    /// Default config location: `~/.relief/config.toml`.
    pub fn home_config_path() -> Option<PathBuf> {
        dirs_home().map(|h| h.join(".relief").join("config.toml"))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
