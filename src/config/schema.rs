use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Upstream API key. `None` is a valid state: the orchestrator answers
    /// from the canned fallback pool without attempting a network call.
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            sampling: SamplingConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.deepseek.com/v1".into()
}

fn default_model() -> String {
    "deepseek-chat".into()
}

// ── Sampling parameters ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Nucleus sampling keeps responses fast without hurting quality much.
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_penalty")]
    pub frequency_penalty: f64,
    #[serde(default = "default_penalty")]
    pub presence_penalty: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            frequency_penalty: default_penalty(),
            presence_penalty: default_penalty(),
        }
    }
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.95
}

fn default_penalty() -> f64 {
    0.3
}

// ── Conversation memory ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Retained window (turns) for standard-tier calls.
    #[serde(default = "default_standard_window")]
    pub standard_window: usize,
    /// Retained window (turns) for elevated-tier calls.
    #[serde(default = "default_elevated_window")]
    pub elevated_window: usize,
    /// Output-token ceiling for standard-tier calls.
    #[serde(default = "default_standard_max_tokens")]
    pub standard_max_tokens: u32,
    /// Output-token ceiling for elevated-tier calls.
    #[serde(default = "default_elevated_max_tokens")]
    pub elevated_max_tokens: u32,
    /// Session count below which eviction is skipped entirely.
    #[serde(default = "default_eviction_watermark")]
    pub eviction_watermark: usize,
    /// Fraction of live sessions removed when eviction runs.
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            standard_window: default_standard_window(),
            elevated_window: default_elevated_window(),
            standard_max_tokens: default_standard_max_tokens(),
            elevated_max_tokens: default_elevated_max_tokens(),
            eviction_watermark: default_eviction_watermark(),
            eviction_fraction: default_eviction_fraction(),
        }
    }
}

fn default_standard_window() -> usize {
    20
}

fn default_elevated_window() -> usize {
    40
}

fn default_standard_max_tokens() -> u32 {
    4000
}

fn default_elevated_max_tokens() -> u32 {
    8000
}

fn default_eviction_watermark() -> usize {
    100
}

fn default_eviction_fraction() -> f64 {
    0.2
}

// ── Load / save ───────────────────────────────────────────────────

impl Config {
    /// Load `~/.ilirion/config.toml`, creating it with defaults on first run.
    ///
    /// The API key can always be supplied via `ILIRION_API_KEY` or
    /// `DEEPSEEK_API_KEY`; the environment wins over the file.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let ilirion_dir = home.join(".ilirion");
        let config_path = ilirion_dir.join("config.toml");

        if !ilirion_dir.exists() {
            fs::create_dir_all(&ilirion_dir).context("Failed to create .ilirion directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        for var in ["ILIRION_API_KEY", "DEEPSEEK_API_KEY"] {
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    self.api_key = Some(key);
                    return;
                }
            }
        }
    }
}
