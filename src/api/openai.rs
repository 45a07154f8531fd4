use crate::api::{ImageGenerator, SpeechSynthesizer, TextGenerator};
use crate::config::Config;
use crate::error::{Stage, StoryError, StoryResult};
use crate::prompt::ChatPrompt;
use crate::{logi, logw};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const CHAT_TIMEOUT_SECS: u64 = 300;
const IMAGE_TIMEOUT_SECS: u64 = 300;
const SPEECH_TIMEOUT_SECS: u64 = 300;
const BODY_SNIPPET_CHARS: usize = 800;

/// Chat, image and speech endpoints sharing one HTTP client and key.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    temperature: f32,
    image_model: String,
    image_size: String,
    image_quality: String,
    image_fetch_timeout: Duration,
    tts_model: String,
    tts_voice: String,
}

impl OpenAiClient {
    pub fn with_client(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.openai_key.clone(),
            base_url: OPENAI_BASE.to_string(),
            chat_model: cfg.chat_model.clone(),
            temperature: cfg.temperature,
            image_model: cfg.image_model.clone(),
            image_size: cfg.image_size.clone(),
            image_quality: cfg.image_quality.clone(),
            image_fetch_timeout: Duration::from_secs(cfg.image_fetch_timeout_secs),
            tts_model: cfg.tts_model.clone(),
            tts_voice: cfg.tts_voice.clone(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post_json(
        &self,
        stage: Stage,
        endpoint: &str,
        body: &Value,
        timeout_s: u64,
    ) -> StoryResult<Response> {
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .json(body)
            .timeout(Duration::from_secs(timeout_s))
            .send()
            .await
            .map_err(|source| StoryError::Network { stage, source })?;
        ensure_success(stage, resp).await
    }
}

async fn ensure_success(stage: Stage, resp: Response) -> StoryResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let raw = resp.text().await.unwrap_or_default();
    logw(format!("OpenAI HTTP {} during {}", status.as_u16(), stage));
    log_api_error(&raw);
    Err(StoryError::Service {
        stage,
        status: status.as_u16(),
        body: raw.chars().take(BODY_SNIPPET_CHARS).collect(),
    })
}

fn log_api_error(raw: &str) {
    let Ok(root) = serde_json::from_str::<Value>(raw) else {
        if !raw.is_empty() {
            let snippet = raw.chars().take(BODY_SNIPPET_CHARS).collect::<String>();
            logw(format!("OpenAI raw body: {}", snippet));
        }
        return;
    };
    let Some(err) = root.get("error") else {
        return;
    };
    if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
        logw(format!("OpenAI error message: {}", msg));
    }
    if let Some(typ) = err.get("type").and_then(|v| v.as_str()) {
        logw(format!("OpenAI error type: {}", typ));
    }
    if let Some(code) = err.get("code").and_then(|v| v.as_str()) {
        logw(format!("OpenAI error code: {}", code));
    }
}

/// Status check for the generated-image download, which is served from a CDN
/// rather than the API and carries no OpenAI error body.
fn check_download(stage: Stage, status: StatusCode) -> StoryResult<()> {
    if status.is_success() {
        return Ok(());
    }
    logw(format!("Image download returned HTTP {} during {}", status.as_u16(), stage));
    Err(StoryError::Service {
        stage,
        status: status.as_u16(),
        body: "image download failed".to_string(),
    })
}

/// First choice's message content from a chat completion body.
pub(crate) fn extract_chat_text(root: &Value) -> Option<String> {
    root.get("choices")?
        .as_array()?
        .iter()
        .find_map(|choice| choice.get("message")?.get("content")?.as_str())
        .map(str::to_string)
}

pub(crate) fn extract_image_url(root: &Value) -> Option<String> {
    root.get("data")?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &ChatPrompt) -> StoryResult<String> {
        let body = json!({
            "model": self.chat_model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.human},
            ],
        });

        let stage = Stage::Script;
        let resp = self
            .post_json(stage, "chat/completions", &body, CHAT_TIMEOUT_SECS)
            .await?;
        let root: Value = resp
            .json()
            .await
            .map_err(|source| StoryError::Network { stage, source })?;

        let text = extract_chat_text(&root).ok_or_else(|| StoryError::Service {
            stage,
            status: 200,
            body: "chat completion carried no message content".to_string(),
        })?;
        logi(format!("Script received ({} chars)", text.len()));
        Ok(text)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(&self, scene: usize, prompt: &str) -> StoryResult<Vec<u8>> {
        let body = json!({
            "model": self.image_model,
            "prompt": prompt,
            "size": self.image_size,
            "quality": self.image_quality,
            "n": 1,
        });

        let stage = Stage::Image(scene);
        let resp = self
            .post_json(stage, "images/generations", &body, IMAGE_TIMEOUT_SECS)
            .await?;
        let root: Value = resp
            .json()
            .await
            .map_err(|source| StoryError::Network { stage, source })?;
        let url = extract_image_url(&root).ok_or_else(|| StoryError::Service {
            stage,
            status: 200,
            body: "image response carried no URL".to_string(),
        })?;

        let resp = self
            .client
            .get(&url)
            .timeout(self.image_fetch_timeout)
            .send()
            .await
            .map_err(|source| StoryError::Network { stage, source })?;
        check_download(stage, resp.status())?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| StoryError::Network { stage, source })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(&self, scene: usize, text: &str, out_path: &Path) -> StoryResult<()> {
        let body = json!({
            "model": self.tts_model,
            "voice": self.tts_voice,
            "input": text,
            "response_format": "mp3",
        });

        let stage = Stage::Audio(scene);
        let resp = self
            .post_json(stage, "audio/speech", &body, SPEECH_TIMEOUT_SECS)
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| StoryError::Network { stage, source })?;
        write_audio(out_path, &bytes).await
    }
}

pub(crate) async fn write_audio(out_path: &Path, bytes: &[u8]) -> StoryResult<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoryError::io(format!("Failed to create dir {}", parent.display()), e))?;
    }
    fs::write(out_path, bytes)
        .await
        .map_err(|e| StoryError::io(format!("Failed to write {}", out_path.display()), e))
}
