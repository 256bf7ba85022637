use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::application::ports::{DecodingOptions, TranscriptionEngine, TranscriptionError};
use crate::infrastructure::audio::{CandleWhisperEngine, OpenAiWhisperEngine};

use super::Environment;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub cors: CorsSettings,
    #[serde(default)]
    pub transcription: TranscriptionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub provider: TranscriptionProviderSetting,
    pub model: String,
    pub beam_size: usize,
    pub max_concurrent: usize,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProviderSetting {
    #[default]
    Local,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

impl Settings {
    /// Layers `appsettings.<env>` (optional) under `APP_`-prefixed environment
    /// variables, e.g. `APP_SERVER__PORT=9000` or
    /// `APP_CORS__ALLOWED_ORIGINS=http://a,http://b`.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                File::with_name(&format!("appsettings.{}", environment.as_str())).required(false),
            )
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl ServerSettings {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl TranscriptionSettings {
    pub fn decoding_options(&self) -> DecodingOptions {
        DecodingOptions {
            beam_size: self.beam_size.max(1),
        }
    }

    /// `None` when `timeout_secs` is 0.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Builds the process-wide engine for the configured provider. The local
    /// provider downloads and loads `model` from the Hugging Face hub; the
    /// remote one sends it as the API model name and needs a non-empty key.
    pub fn build_engine(&self) -> Result<Arc<dyn TranscriptionEngine>, TranscriptionError> {
        match self.provider {
            TranscriptionProviderSetting::Local => {
                Ok(Arc::new(CandleWhisperEngine::new(&self.model)?))
            }
            TranscriptionProviderSetting::OpenAi => {
                let api_key = self
                    .api_key
                    .clone()
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        TranscriptionError::ModelLoadFailed(
                            "transcription.api_key is required for the openai provider"
                                .to_string(),
                        )
                    })?;
                Ok(Arc::new(OpenAiWhisperEngine::new(
                    api_key,
                    self.base_url.clone(),
                    Some(self.model.clone()),
                )))
            }
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_mb: 25,
        }
    }
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:4200".to_string(),
                "http://localhost:8000".to_string(),
            ],
        }
    }
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: TranscriptionProviderSetting::default(),
            model: "openai/whisper-small".to_string(),
            beam_size: DecodingOptions::default().beam_size,
            max_concurrent: 1,
            timeout_secs: 300,
            api_key: None,
            base_url: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info,parlance=debug,tower_http=debug".to_string(),
            enable_json: false,
        }
    }
}
