use crate::api::elevenlabs::ElevenLabsClient;
use crate::api::openai::OpenAiClient;
use crate::api::{ImageGenerator, SpeechSynthesizer, TextGenerator};
use crate::assemble::{assemble_final, render_scene_clip};
use crate::config::{Config, SpeechProvider};
use crate::error::{StoryError, StoryResult};
use crate::ffmpeg::{FfmpegEncoder, MediaEncoder};
use crate::media::{MediaQueue, SceneFailure, SceneMedia, image_file_name};
use crate::prompt::build_prompt;
use crate::storyboard::parse_storyboard;
use crate::{logi, logok, logw};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub type ProgressHook = Arc<dyn Fn(u8) + Send + Sync + 'static>;

/// External engines one run talks to.
#[derive(Clone)]
pub struct Services {
    pub text: Arc<dyn TextGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub encoder: Arc<dyn MediaEncoder>,
}

impl Services {
    pub fn from_config(cfg: &Config) -> StoryResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoryError::Config(format!("failed to build HTTP client: {e}")))?;

        let openai = Arc::new(OpenAiClient::with_client(http.clone(), cfg));
        let speech: Arc<dyn SpeechSynthesizer> = match cfg.speech_provider {
            SpeechProvider::OpenAi => openai.clone(),
            SpeechProvider::ElevenLabs => Arc::new(ElevenLabsClient::new(http, cfg)),
        };

        Ok(Self {
            text: openai.clone(),
            images: openai,
            speech,
            encoder: Arc::new(FfmpegEncoder::new(cfg)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImage {
    pub scene_index: usize,
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Everything one run hands back, independent of its scratch directory.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub topic: String,
    pub video_bytes: Option<Vec<u8>>,
    pub images: Vec<NamedImage>,
    pub error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.video_bytes.is_some()
    }
}

pub struct StoryPipeline {
    services: Services,
    media_concurrency: usize,
    scratch_root: Option<PathBuf>,
    progress: Option<ProgressHook>,
}

impl StoryPipeline {
    pub fn new(services: Services, media_concurrency: usize) -> Self {
        Self {
            services,
            media_concurrency: media_concurrency.max(1),
            scratch_root: None,
            progress: None,
        }
    }

    pub fn from_config(cfg: &Config) -> StoryResult<Self> {
        Ok(Self::new(Services::from_config(cfg)?, cfg.media_concurrency))
    }

    /// Creates per-run scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    fn report(&self, percent: u8) {
        if let Some(hook) = &self.progress {
            hook(percent.min(100));
        }
    }

    fn scratch_dir(&self) -> StoryResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("storyteller-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| StoryError::io("Failed to create scratch directory", e))
    }

    /// Runs the whole topic-to-video pipeline.
    ///
    /// Never fails outright: errors come back in `GenerationResult::error`
    /// together with any scene images produced before the failure.
    pub async fn run(&self, topic: &str) -> GenerationResult {
        let mut images = Vec::new();
        let outcome = self.run_inner(topic, &mut images).await;
        images.sort_by_key(|img: &NamedImage| img.scene_index);

        let (video_bytes, error) = match outcome {
            Ok(bytes) => {
                logok(format!("Video generated for topic: {}", topic));
                (Some(bytes), None)
            }
            Err(err) => {
                logw(format!("Run failed: {}", err));
                (None, Some(err.user_message()))
            }
        };

        GenerationResult {
            topic: topic.to_string(),
            video_bytes,
            images,
            error,
            generated_at: Utc::now(),
        }
    }

    async fn run_inner(&self, topic: &str, images: &mut Vec<NamedImage>) -> StoryResult<Vec<u8>> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(StoryError::EmptyTopic);
        }

        // Removed on drop, whichever way this function exits.
        let scratch = self.scratch_dir()?;
        self.report(5);

        logi("Generating script... please wait.");
        let prompt = build_prompt(topic);
        let raw = self.services.text.generate(&prompt).await?;
        let storyboard = parse_storyboard(&raw)?;
        logok(format!("Storyboard parsed: {} scenes", storyboard.scenes().len()));
        self.report(15);

        let mut queue = MediaQueue::new(
            storyboard.scenes(),
            self.media_concurrency,
            Arc::clone(&self.services.images),
            Arc::clone(&self.services.speech),
            scratch.path().to_path_buf(),
        );
        let clips = match self
            .render_in_order(&mut queue, storyboard.scenes().len(), scratch.path(), images)
            .await
        {
            Ok(clips) => clips,
            Err(err) => {
                queue.shutdown().await;
                return Err(err);
            }
        };

        let video = assemble_final(self.services.encoder.as_ref(), &clips, scratch.path()).await?;
        self.report(100);
        Ok(video)
    }

    /// Drains the media queue, rendering each scene's clip as soon as it and
    /// every earlier scene are ready. Returns clip paths in scene order.
    async fn render_in_order(
        &self,
        queue: &mut MediaQueue,
        total: usize,
        scratch: &Path,
        images: &mut Vec<NamedImage>,
    ) -> StoryResult<Vec<PathBuf>> {
        let mut ready: BTreeMap<usize, SceneMedia> = BTreeMap::new();
        let mut clips = Vec::with_capacity(total);
        let mut next_index = 1;

        while let Some(result) = queue.next().await {
            let media = match result {
                Ok(media) => media,
                Err(SceneFailure { image, error }) => {
                    if let Some((scene_index, bytes)) = image {
                        images.push(NamedImage {
                            scene_index,
                            name: image_file_name(scene_index),
                            bytes,
                        });
                    }
                    return Err(error);
                }
            };
            logok(format!("Media for scene {} saved.", media.scene_index));
            images.push(NamedImage {
                scene_index: media.scene_index,
                name: image_file_name(media.scene_index),
                bytes: media.image_bytes.clone(),
            });
            ready.insert(media.scene_index, media);

            while let Some(media) = ready.remove(&next_index) {
                let asset = render_scene_clip(self.services.encoder.as_ref(), media, scratch).await?;
                clips.push(asset.clip_path);
                next_index += 1;
                self.report(15 + (clips.len() * 60 / total.max(1)) as u8);
            }
        }

        Ok(clips)
    }
}
