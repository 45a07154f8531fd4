use crate::error::StoryResult;
use crate::prompt::ChatPrompt;
use async_trait::async_trait;
use std::path::Path;

pub mod elevenlabs;
pub mod openai;

/// Language model that answers a system + human message pair with free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &ChatPrompt) -> StoryResult<String>;
}

/// Produces one image for a prompt and hands back its encoded bytes.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, scene: usize, prompt: &str) -> StoryResult<Vec<u8>>;
}

/// Speaks `text` and writes the audio to `out_path`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, scene: usize, text: &str, out_path: &Path) -> StoryResult<()>;
}
