use crate::api::{ImageGenerator, SpeechSynthesizer};
use crate::error::{StoryError, StoryResult};
use crate::logi;
use crate::storyboard::Scene;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::task::JoinSet;

pub fn image_file_name(index: usize) -> String {
    format!("scene_{}.png", index)
}

pub fn audio_file_name(index: usize) -> String {
    format!("scene_{}.mp3", index)
}

pub fn clip_file_name(index: usize) -> String {
    format!("scene_{}.mp4", index)
}

/// Image and narration for one scene, both already persisted in scratch.
#[derive(Debug, Clone)]
pub struct SceneMedia {
    pub scene_index: usize,
    pub image_bytes: Vec<u8>,
    pub image_path: PathBuf,
    pub audio_path: PathBuf,
}

/// A scene that did not finish, with its image when one was already fetched.
#[derive(Debug)]
pub struct SceneFailure {
    pub image: Option<(usize, Vec<u8>)>,
    pub error: StoryError,
}

impl From<StoryError> for SceneFailure {
    fn from(error: StoryError) -> Self {
        Self { image: None, error }
    }
}

pub async fn generate_scene_media(
    scene: &Scene,
    images: &dyn ImageGenerator,
    speech: &dyn SpeechSynthesizer,
    scratch: &Path,
) -> Result<SceneMedia, SceneFailure> {
    let n = scene.index;
    if scene.image_prompt.is_empty() {
        return Err(StoryError::MissingField {
            scene: n,
            field: "image_prompt",
        }
        .into());
    }

    logi(format!("Generating image for scene {}...", n));
    let image_bytes = images.generate_image(n, &scene.image_prompt).await?;
    let image_path = scratch.join(image_file_name(n));
    if let Err(e) = fs::write(&image_path, &image_bytes).await {
        return Err(SceneFailure {
            image: Some((n, image_bytes)),
            error: StoryError::io(format!("Failed to write {}", image_path.display()), e),
        });
    }

    match narrate(scene, speech, scratch).await {
        Ok(audio_path) => Ok(SceneMedia {
            scene_index: n,
            image_bytes,
            image_path,
            audio_path,
        }),
        Err(error) => Err(SceneFailure {
            image: Some((n, image_bytes)),
            error,
        }),
    }
}

async fn narrate(scene: &Scene, speech: &dyn SpeechSynthesizer, scratch: &Path) -> StoryResult<PathBuf> {
    let n = scene.index;
    logi(format!("Generating audio for scene {}...", n));
    let audio_path = scratch.join(audio_file_name(n));
    speech
        .synthesize(n, &scene.voiceover_text, &audio_path)
        .await?;
    if fs::metadata(&audio_path).await.is_err() {
        return Err(StoryError::MissingArtifact(audio_path));
    }
    Ok(audio_path)
}

/// Bounded pool of scene media jobs.
///
/// At most `limit` scenes are in flight. New scenes are started only when the
/// caller asks for the next result, so with a limit of 1 scenes run strictly
/// one after another. Results come back in completion order. Dropping the
/// queue aborts anything still running.
pub struct MediaQueue {
    pending: VecDeque<Scene>,
    running: JoinSet<Result<SceneMedia, SceneFailure>>,
    limit: usize,
    images: Arc<dyn ImageGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    scratch: PathBuf,
}

impl MediaQueue {
    pub fn new(
        scenes: &[Scene],
        limit: usize,
        images: Arc<dyn ImageGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        scratch: PathBuf,
    ) -> Self {
        Self {
            pending: scenes.iter().cloned().collect(),
            running: JoinSet::new(),
            limit: limit.max(1),
            images,
            speech,
            scratch,
        }
    }

    fn fill(&mut self) {
        while self.running.len() < self.limit {
            let Some(scene) = self.pending.pop_front() else {
                break;
            };
            let images = Arc::clone(&self.images);
            let speech = Arc::clone(&self.speech);
            let scratch = self.scratch.clone();
            self.running.spawn(async move {
                generate_scene_media(&scene, images.as_ref(), speech.as_ref(), &scratch).await
            });
        }
    }

    pub async fn next(&mut self) -> Option<Result<SceneMedia, SceneFailure>> {
        self.fill();
        let joined = self.running.join_next().await?;
        Some(match joined {
            Ok(result) => result,
            Err(err) => Err(StoryError::Unexpected(format!("scene media task failed: {err}")).into()),
        })
    }

    /// Aborts outstanding jobs and waits until they are gone.
    pub async fn shutdown(&mut self) {
        self.pending.clear();
        self.running.shutdown().await;
    }
}
