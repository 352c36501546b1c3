use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TtsConfig {
    pub synthesis: SynthesisConfig,
    pub transport: TransportConfig,
}

/// Synthesis request parameters, serialized verbatim into the request body.
///
/// These are opaque to the pipeline: the service validates them, not us.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub sample_rate: u32,
    pub base_url: String,
    /// Skipping server-side text normalization saves 30-40ms of latency.
    pub disable_text_normalization: bool,
}

/// Connection pool and dispatch loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_connections: usize,
    pub pool_idle_secs: u64,
    pub queue_poll_ms: u64,
    pub read_buffer_bytes: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: defaults::VOICE_ID.to_string(),
            model_id: defaults::MODEL_ID.to_string(),
            sample_rate: defaults::SAMPLE_RATE,
            base_url: defaults::BASE_URL.to_string(),
            disable_text_normalization: true,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: defaults::REQUEST_TIMEOUT.as_secs(),
            connect_timeout_secs: defaults::CONNECT_TIMEOUT.as_secs(),
            max_connections: defaults::MAX_CONNECTIONS,
            pool_idle_secs: defaults::POOL_IDLE_TIMEOUT.as_secs(),
            queue_poll_ms: defaults::QUEUE_POLL_INTERVAL.as_millis() as u64,
            read_buffer_bytes: defaults::READ_BUFFER_BYTES,
        }
    }
}

impl TtsConfig {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: TtsConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXSTREAM_API_KEY → synthesis.api_key
    /// - VOXSTREAM_VOICE_ID → synthesis.voice_id
    /// - VOXSTREAM_MODEL_ID → synthesis.model_id
    /// - VOXSTREAM_BASE_URL → synthesis.base_url
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(api_key) = std::env::var("VOXSTREAM_API_KEY")
            && !api_key.is_empty()
        {
            self.synthesis.api_key = api_key;
        }

        if let Ok(voice_id) = std::env::var("VOXSTREAM_VOICE_ID")
            && !voice_id.is_empty()
        {
            self.synthesis.voice_id = voice_id;
        }

        if let Ok(model_id) = std::env::var("VOXSTREAM_MODEL_ID")
            && !model_id.is_empty()
        {
            self.synthesis.model_id = model_id;
        }

        if let Ok(base_url) = std::env::var("VOXSTREAM_BASE_URL")
            && !base_url.is_empty()
        {
            self.synthesis.base_url = base_url;
        }

        self
    }

    /// Render the configuration with the API key masked, for log output.
    pub fn redacted(&self) -> String {
        let mut masked = self.clone();
        if !masked.synthesis.api_key.is_empty() {
            masked.synthesis.api_key = "***REDACTED***".to_string();
        }
        format!("{:?}", masked)
    }
}
