use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub audio: AudioConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub save_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SpeechConfig {
    pub language: String,
    pub default_language: String,
}

impl Config {
    /// Load configuration, falling back to defaults for anything the file
    /// does not set. A missing file is not an error.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("api.base_url", "http://localhost:8000")?
            .set_default("api.save_timeout_secs", 10)?
            .set_default("audio.sample_rate", 44100)?
            .set_default("audio.channels", 1)?
            .set_default("audio.chunk_interval_ms", 250)?
            .set_default("speech.language", "en-US")?
            .set_default("speech.default_language", "en-US")?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
