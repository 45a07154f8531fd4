use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ELEVENLABS_KEY_ENV: &str = "ELEVENLABS_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProvider {
    #[default]
    OpenAi,
    ElevenLabs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "openai_api_key", default)]
    pub openai_key: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    #[serde(default = "default_image_quality")]
    pub image_quality: String,
    #[serde(default = "default_image_fetch_timeout")]
    pub image_fetch_timeout_secs: u64,
    #[serde(default)]
    pub speech_provider: SpeechProvider,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
    #[serde(rename = "elevenlabs_api_key", default)]
    pub elevenlabs_key: String,
    #[serde(default = "default_voice_id")]
    pub eleven_voice_id: String,
    #[serde(default = "default_model_id")]
    pub eleven_model_id: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_bin: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe_bin: String,
    #[serde(default = "default_encoder_timeout")]
    pub encoder_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub media_concurrency: usize,
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_image_quality() -> String {
    "standard".to_string()
}

fn default_image_fetch_timeout() -> u64 {
    30
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_tts_voice() -> String {
    "alloy".to_string()
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_encoder_timeout() -> u64 {
    600
}

fn default_concurrency() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_key: String::new(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            image_model: default_image_model(),
            image_size: default_image_size(),
            image_quality: default_image_quality(),
            image_fetch_timeout_secs: default_image_fetch_timeout(),
            speech_provider: SpeechProvider::default(),
            tts_model: default_tts_model(),
            tts_voice: default_tts_voice(),
            elevenlabs_key: String::new(),
            eleven_voice_id: default_voice_id(),
            eleven_model_id: default_model_id(),
            ffmpeg_bin: default_ffmpeg(),
            ffprobe_bin: default_ffprobe(),
            encoder_timeout_secs: default_encoder_timeout(),
            media_concurrency: default_concurrency(),
        }
    }
}

impl Config {
    /// Loads `path` when it exists, then lets the environment fill in or
    /// override the API keys.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if fs::metadata(path).await.is_ok() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            Self::from_json(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(OPENAI_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.openai_key = key;
        }
        if let Some(key) = lookup(ELEVENLABS_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.elevenlabs_key = key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.openai_key.is_empty() {
            anyhow::bail!("OpenAI API key missing (set {OPENAI_KEY_ENV} or openai_api_key)");
        }
        if self.speech_provider == SpeechProvider::ElevenLabs && self.elevenlabs_key.is_empty() {
            anyhow::bail!(
                "ElevenLabs API key missing (set {ELEVENLABS_KEY_ENV} or elevenlabs_api_key)"
            );
        }
        if self.media_concurrency == 0 {
            anyhow::bail!("media_concurrency must be at least 1");
        }
        if self.encoder_timeout_secs == 0 {
            anyhow::bail!("encoder_timeout_secs must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.chat_model, "gpt-4o");
        assert_eq!(cfg.image_size, "1024x1024");
        assert_eq!(cfg.tts_voice, "alloy");
        assert_eq!(cfg.speech_provider, SpeechProvider::OpenAi);
        assert_eq!(cfg.media_concurrency, 1);
        assert_eq!(cfg.image_fetch_timeout_secs, 30);
    }

    #[test]
    fn environment_overrides_file_keys() {
        let mut cfg = Config::from_json(r#"{"openai_api_key":"from-file"}"#).unwrap();
        cfg.apply_env(|key| (key == OPENAI_KEY_ENV).then(|| "from-env".to_string()));
        assert_eq!(cfg.openai_key, "from-env");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn blank_env_value_does_not_clobber_file_key() {
        let mut cfg = Config::from_json(r#"{"openai_api_key":"from-file"}"#).unwrap();
        cfg.apply_env(|_| Some("  ".to_string()));
        assert_eq!(cfg.openai_key, "from-file");
    }

    #[test]
    fn validation_rejects_missing_keys_and_zero_pool() {
        let cfg = Config::default();
        assert!(cfg.validate().is_err());

        let cfg = Config::from_json(
            r#"{"openai_api_key":"k","speech_provider":"elevenlabs"}"#,
        )
        .unwrap();
        assert!(cfg.validate().is_err());

        let cfg = Config::from_json(r#"{"openai_api_key":"k","media_concurrency":0}"#).unwrap();
        assert!(cfg.validate().is_err());
    }
}
