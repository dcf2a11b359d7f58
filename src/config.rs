use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub production: ProductionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            llm: LlmConfig::default(),
            production: ProductionConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String, // "gemini", "ollama" or "openai"
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gemini: None,
            ollama: None,
            openai: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_openai_model(),
            base_url: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

/// How shot assignments are paired with drafted dialogue lines.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShotMergePolicy {
    /// Shot count must equal the dialogue count.
    #[default]
    Strict,
    /// Missing shots take the fallback label, extra shots are dropped.
    Lenient,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProductionConfig {
    #[serde(default)]
    pub shot_merge: ShotMergePolicy,
    #[serde(default = "default_fallback_shot")]
    pub fallback_shot: String,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            shot_merge: ShotMergePolicy::default(),
            fallback_shot: default_fallback_shot(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_provider() -> String {
    "gemini".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_ollama_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3".to_string()
}
fn default_fallback_shot() -> String {
    "Medium Shot".to_string()
}

impl Config {
    /// Loads `config.yml` from the working directory, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("{} not found, using default configuration", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_output_folder(&self) -> Result<PathBuf> {
        let dir = PathBuf::from(&self.output_folder);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }
}

impl GeminiConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        non_blank(self.api_key.clone())
            .or_else(|| non_blank(env::var("GEMINI_API_KEY").ok()))
            .or_else(|| non_blank(env::var("API_KEY").ok()))
    }
}

impl OpenAIConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        non_blank(self.api_key.clone()).or_else(|| non_blank(env::var("OPENAI_API_KEY").ok()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
