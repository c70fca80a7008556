use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// How the front end collects commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Keyboard only
    Text,
    /// Microphone only
    Voice,
    /// Keyboard; an empty line switches to the microphone for one turn
    Hybrid,
}

impl InputMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "texto" | "text" => Some(InputMode::Text),
            "voz" | "voice" => Some(InputMode::Voice),
            "hibrido" | "híbrido" | "hybrid" => Some(InputMode::Hybrid),
            _ => None,
        }
    }

    pub fn uses_voice(self) -> bool {
        matches!(self, InputMode::Voice | InputMode::Hybrid)
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InputMode::Text => "texto",
            InputMode::Voice => "voz",
            InputMode::Hybrid => "hibrido",
        };
        f.write_str(label)
    }
}

impl Default for InputMode {
    fn default() -> Self {
        InputMode::Hybrid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_api_url")]
    pub api_url: String,
    #[serde(default = "default_image_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_image_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_image_attempt_delay_ms")]
    pub attempt_delay_ms: u64,
    #[serde(default = "default_image_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_image_api_url() -> String {
    "https://image.pollinations.ai/prompt".to_string()
}

fn default_image_cache_dir() -> String {
    "image_cache".to_string()
}

fn default_image_output_dir() -> String {
    ".".to_string()
}

fn default_image_attempt_delay_ms() -> u64 {
    2000
}

fn default_image_timeout_secs() -> u64 {
    60
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_url: default_image_api_url(),
            cache_dir: default_image_cache_dir(),
            output_dir: default_image_output_dir(),
            attempt_delay_ms: default_image_attempt_delay_ms(),
            timeout_secs: default_image_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Speech synthesis program; receives `-s <rate>` and the text
    #[serde(default = "default_tts_command")]
    pub tts_command: String,
    #[serde(default = "default_tts_args")]
    pub tts_args: Vec<String>,
    /// Recorder program; `{output}` is replaced by the WAV path
    #[serde(default = "default_record_command")]
    pub record_command: Vec<String>,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_transcription_language")]
    pub transcription_language: String,
}

fn default_tts_command() -> String {
    "espeak-ng".to_string()
}

fn default_tts_args() -> Vec<String> {
    vec!["-v".to_string(), "pt-br".to_string()]
}

fn default_record_command() -> Vec<String> {
    ["arecord", "-q", "-d", "5", "-f", "cd", "{output}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_transcription_language() -> String {
    "pt".to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_command: default_tts_command(),
            tts_args: default_tts_args(),
            record_command: default_record_command(),
            transcription_model: default_transcription_model(),
            transcription_language: default_transcription_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    // Assistant identity
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_nickname")]
    pub nickname: String,

    // LLM configuration (OpenAI-compatible: Ollama, LM Studio, vLLM, OpenAI, etc.)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    // Interaction
    #[serde(default)]
    pub input_mode: InputMode,
    #[serde(default = "default_true")]
    pub enable_ai: bool,
    #[serde(default = "default_profile")]
    pub default_profile: String,
    #[serde(default = "default_code_language")]
    pub default_code_language: String,

    // Persistence
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_memory_path")]
    pub memory_path: String,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub voice: VoiceConfig,
}

fn default_name() -> String {
    "BENCH-VIS".to_string()
}

fn default_nickname() -> String {
    "Vis".to_string()
}

fn default_llm_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_profile() -> String {
    "bench".to_string()
}

fn default_code_language() -> String {
    "arduino".to_string()
}

fn default_database_path() -> String {
    "benchvis.db".to_string()
}

fn default_memory_path() -> String {
    "memoria_vis.json".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            nickname: default_nickname(),
            llm_api_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: None,
            llm_timeout_secs: default_llm_timeout_secs(),
            input_mode: InputMode::default(),
            enable_ai: true,
            default_profile: default_profile(),
            default_code_language: default_code_language(),
            database_path: default_database_path(),
            memory_path: default_memory_path(),
            image: ImageConfig::default(),
            voice: VoiceConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Get the path to the config file (relative to executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("benchvis_config.toml")
    }

    /// Load config from benchvis_config.toml (next to executable), then apply
    /// environment overrides on top
    pub fn load() -> Self {
        Self::load_from(&Self::config_path(), |key| env::var(key).ok())
    }

    fn load_from(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AssistantConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::warn!("No config file found, using defaults + env vars");
                Self::default()
            }
        };

        config.apply_overrides(lookup);
        config
    }

    /// Save config to file (next to executable)
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, toml_string)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Overwrites fields whose variable `lookup` resolves.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LLM_API_URL") {
            self.llm_api_url = url;
        }

        if let Some(model) = lookup("LLM_MODEL") {
            self.llm_model = model;
        }

        if let Some(key) = lookup("LLM_API_KEY") {
            if !key.trim().is_empty() {
                self.llm_api_key = Some(key);
            }
        }

        if let Some(url) = lookup("BENCHVIS_IMAGE_API_URL") {
            self.image.api_url = url;
        }

        if let Some(mode) = lookup("BENCHVIS_INPUT_MODE") {
            match InputMode::parse(&mode) {
                Some(mode) => self.input_mode = mode,
                None => tracing::warn!("Ignoring unknown BENCHVIS_INPUT_MODE '{}'", mode),
            }
        }

        if let Some(path) = lookup("BENCHVIS_DATABASE_PATH") {
            if !path.trim().is_empty() {
                self.database_path = path;
            }
        }

        if let Some(path) = lookup("BENCHVIS_MEMORY_PATH") {
            if !path.trim().is_empty() {
                self.memory_path = path;
            }
        }

        if let Some(profile) = lookup("BENCHVIS_PROFILE") {
            if !profile.trim().is_empty() {
                self.default_profile = profile.trim().to_lowercase();
            }
        }

        if let Some(command) = lookup("BENCHVIS_TTS_COMMAND") {
            if !command.trim().is_empty() {
                self.voice.tts_command = command;
            }
        }

        if let Some(command) = lookup("BENCHVIS_RECORD_COMMAND") {
            let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
            if !parts.is_empty() {
                self.voice.record_command = parts;
            }
        }

        if let Some(model) = lookup("BENCHVIS_TRANSCRIPTION_MODEL") {
            self.voice.transcription_model = model;
        }
    }
}
