use crate::api::SpeechSynthesizer;
use crate::api::openai::write_audio;
use crate::config::Config;
use crate::error::{Stage, StoryError, StoryResult};
use crate::logw;
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

const ELEVENLABS_BASE: &str = "https://api.elevenlabs.io/v1";

/// Alternative narrator voice backed by ElevenLabs text-to-speech.
#[derive(Clone)]
pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.elevenlabs_key.clone(),
            voice_id: cfg.eleven_voice_id.clone(),
            model_id: cfg.eleven_model_id.clone(),
            base_url: ELEVENLABS_BASE.to_string(),
        }
    }

    fn speech_url(&self) -> String {
        format!(
            "{}/text-to-speech/{}?output_format=mp3_44100_128",
            self.base_url, self.voice_id
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, scene: usize, text: &str, out_path: &Path) -> StoryResult<()> {
        let stage = Stage::Audio(scene);
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(self.speech_url())
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .map_err(|source| StoryError::Network { stage, source })?;

        let status = resp.status();
        if !status.is_success() {
            logw(format!("ElevenLabs TTS failed HTTP {}", status.as_u16()));
            let raw = resp.text().await.unwrap_or_default();
            return Err(StoryError::Service {
                stage,
                status: status.as_u16(),
                body: raw.chars().take(800).collect(),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|source| StoryError::Network { stage, source })?;
        write_audio(out_path, &bytes).await
    }
}
