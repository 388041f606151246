use serde::{Deserialize, Serialize};
use std::{env, path::Path, path::PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LLMConfig,
    pub layout: LayoutConfig,
    pub fetch: FetchConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Unset means the provider's [`LLMProvider::default_model`].
    pub model: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LLMProvider {
    Gemini,
    OpenAI,
    Ollama,
}

impl LLMProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LLMProvider::Gemini => "https://generativelanguage.googleapis.com",
            LLMProvider::OpenAI => "https://api.openai.com",
            LLMProvider::Ollama => "http://localhost:11434",
        }
    }

    /// Environment variables consulted, in order, when no key is configured.
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            LLMProvider::Gemini => &["GEMINI_API_KEY", "API_KEY"],
            LLMProvider::OpenAI => &["OPENAI_API_KEY"],
            LLMProvider::Ollama => &[],
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !self.api_key_vars().is_empty()
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LLMProvider::Gemini => "gemini-2.5-flash",
            LLMProvider::OpenAI => "gpt-4o-mini",
            LLMProvider::Ollama => "llama3.2",
        }
    }
}

impl LLMConfig {
    /// The configured model, or the provider default when none is set.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// Knobs for the knowledge-graph force layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub width: f64,
    pub height: f64,
    pub link_distance: f64,
    pub charge_strength: f64,
    pub max_ticks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Text-to-speech program; the text is passed as its last argument.
    pub command: String,
    pub args: Vec<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Gemini,
            api_key: None,
            base_url: None,
            model: None,
            temperature: 0.2,
            timeout_seconds: 120,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 400.0,
            link_distance: 100.0,
            charge_strength: -300.0,
            max_ticks: 1000,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("news-examer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        let command = if cfg!(target_os = "macos") { "say" } else { "espeak" };
        Self {
            command: command.to_string(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Get the default config file path (~/.news-examer.toml)
    pub fn default_config_path() -> crate::Result<PathBuf> {
        let home_dir = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(PathBuf::from(home_dir).join(".news-examer.toml"))
    }

    /// Load config from the default location, falling back to defaults if
    /// the file doesn't exist. Missing credentials are filled from the
    /// environment.
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::default_config_path()?;

        let mut config = if config_path.exists() {
            tracing::info!(path = %config_path.display(), "loading configuration");
            Self::from_file(&config_path)?
        } else {
            tracing::info!(
                path = %config_path.display(),
                "no config file found, using defaults (run `news-examer config` to create one)"
            );
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific file path, then fill credentials from the environment.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        self.apply_env_with(|name| env::var(name).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            self.llm.api_key = self
                .llm
                .provider
                .api_key_vars()
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()));
        }
    }

    /// Create a config file with all available options documented
    pub fn create_documented_config() -> String {
        format!(
            r#"# News Examer Configuration File
# This file configures how news-examer analyzes articles and renders reports

[llm]
# LLM Provider: "Gemini", "OpenAI", or "Ollama"
provider = "Gemini"

# API key for the provider (can also be set via environment variables)
# Gemini: GEMINI_API_KEY (or API_KEY)
# OpenAI: OPENAI_API_KEY
# api_key = "your-api-key-here"

# Base URL override (mainly for Ollama instances or proxies)
# base_url = "http://localhost:11434"

# Model to use; defaults per provider:
# Gemini: gemini-2.5-flash, OpenAI: gpt-4o-mini, Ollama: llama3.2
# model = "gemini-2.5-flash"

# Temperature for LLM responses (0.0 = deterministic, 1.0 = creative)
temperature = 0.2

# Request timeout in seconds
timeout_seconds = 120

[layout]
# Canvas size of the knowledge graph
width = 800.0
height = 400.0

# Target separation of linked entities
link_distance = 100.0

# Many-body strength (negative values repel)
charge_strength = -300.0

# Upper bound on simulation ticks for static rendering
max_ticks = 1000

[fetch]
# Timeout when fetching an article URL
timeout_seconds = 30
user_agent = "news-examer/{}"

[speech]
# Text-to-speech program used by `news-examer speak`
command = "{}"
args = []
"#,
            env!("CARGO_PKG_VERSION"),
            SpeechConfig::default().command
        )
    }
}
