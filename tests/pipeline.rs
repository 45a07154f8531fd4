use ai_storyteller::api::{ImageGenerator, SpeechSynthesizer, TextGenerator};
use ai_storyteller::error::{Stage, StoryError, StoryResult};
use ai_storyteller::ffmpeg::{ConcatMode, MediaEncoder};
use ai_storyteller::prompt::ChatPrompt;
use ai_storyteller::{Services, StoryPipeline};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const LIGHTHOUSE: &str = "Here is your storyboard!\n{\"scenes\":[\
    {\"image_prompt\":\"A lighthouse on a cliff at dusk, cinematic\",\"voiceover_text\":\"The light turns slowly.\"},\
    {\"image_prompt\":\"Ships passing a lit coast at night\",\"voiceover_text\":\"Ships pass safely.\"}]}\nHope it helps.";

struct FakeText {
    response: String,
    prompts: Mutex<Vec<ChatPrompt>>,
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn generate(&self, prompt: &ChatPrompt) -> StoryResult<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        Ok(self.response.clone())
    }
}

#[derive(Default)]
struct FakeImages {
    fail_scene: Option<usize>,
    /// Later scenes finish first when set.
    reverse_delay_of: Option<usize>,
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, scene: usize, _prompt: &str) -> StoryResult<Vec<u8>> {
        if let Some(total) = self.reverse_delay_of {
            tokio::time::sleep(Duration::from_millis(((total - scene) * 40) as u64)).await;
        }
        if self.fail_scene == Some(scene) {
            return Err(StoryError::Service {
                stage: Stage::Image(scene),
                status: 500,
                body: "image backend down".into(),
            });
        }
        Ok(format!("image-{scene}").into_bytes())
    }
}

#[derive(Default)]
struct FakeSpeech {
    fail_scene: Option<usize>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, scene: usize, text: &str, out: &Path) -> StoryResult<()> {
        if self.fail_scene == Some(scene) {
            return Err(StoryError::Service {
                stage: Stage::Audio(scene),
                status: 503,
                body: "tts down".into(),
            });
        }
        std::fs::write(out, text.as_bytes()).map_err(|e| StoryError::io("write audio", e))
    }
}

#[derive(Default)]
struct FakeEncoder {
    fail_clip: Option<usize>,
    fail_copy: bool,
    fail_reencode: bool,
    clips: Mutex<Vec<usize>>,
    concats: Mutex<Vec<ConcatMode>>,
}

fn encoder_error(stage: Stage) -> StoryError {
    StoryError::EncoderFailed {
        stage,
        status: "exit status: 1".into(),
        stderr: "Invalid data found when processing input".into(),
    }
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    async fn render_clip(
        &self,
        scene: usize,
        image: &Path,
        audio: &Path,
        out: &Path,
    ) -> StoryResult<()> {
        self.clips.lock().unwrap().push(scene);
        if self.fail_clip == Some(scene) {
            return Err(encoder_error(Stage::Clip(scene)));
        }
        assert!(image.exists(), "image must exist before its clip is rendered");
        assert!(audio.exists(), "audio must exist before its clip is rendered");
        std::fs::write(out, format!("clip-{scene}")).map_err(|e| StoryError::io("write clip", e))
    }

    async fn concat(&self, mode: ConcatMode, list: &Path, out: &Path) -> StoryResult<()> {
        self.concats.lock().unwrap().push(mode);
        let failing = match mode {
            ConcatMode::Copy => self.fail_copy,
            ConcatMode::Reencode => self.fail_reencode,
        };
        if failing {
            return Err(encoder_error(Stage::Assembly));
        }
        let manifest = std::fs::read_to_string(list).map_err(|e| StoryError::io("read list", e))?;
        let mut joined = String::new();
        for line in manifest.lines() {
            let path = line.trim_start_matches("file '").trim_end_matches('\'');
            joined.push_str(&std::fs::read_to_string(path).map_err(|e| StoryError::io("read clip", e))?);
            joined.push('|');
        }
        std::fs::write(out, joined).map_err(|e| StoryError::io("write final", e))
    }

    async fn probe_duration(&self, _scene: usize, _path: &Path) -> StoryResult<f64> {
        Ok(1.5)
    }
}

struct Harness {
    text: Arc<FakeText>,
    encoder: Arc<FakeEncoder>,
    pipeline: StoryPipeline,
    scratch_root: tempfile::TempDir,
    progress: Arc<Mutex<Vec<u8>>>,
}

fn harness(response: &str, images: FakeImages, encoder: FakeEncoder, concurrency: usize) -> Harness {
    harness_with_speech(response, images, FakeSpeech::default(), encoder, concurrency)
}

fn harness_with_speech(
    response: &str,
    images: FakeImages,
    speech: FakeSpeech,
    encoder: FakeEncoder,
    concurrency: usize,
) -> Harness {
    let text = Arc::new(FakeText {
        response: response.to_string(),
        prompts: Mutex::new(Vec::new()),
    });
    let encoder = Arc::new(encoder);
    let services = Services {
        text: text.clone(),
        images: Arc::new(images),
        speech: Arc::new(speech),
        encoder: encoder.clone(),
    };

    let scratch_root = tempfile::tempdir().unwrap();
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = progress.clone();
    let pipeline = StoryPipeline::new(services, concurrency)
        .with_scratch_root(scratch_root.path())
        .with_progress(Arc::new(move |p: u8| sink.lock().unwrap().push(p)));

    Harness {
        text,
        encoder,
        pipeline,
        scratch_root,
        progress,
    }
}

impl Harness {
    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch_root.path()).unwrap().next().is_none()
    }

    fn clip_calls(&self) -> Vec<usize> {
        self.encoder.clips.lock().unwrap().clone()
    }

    fn concat_calls(&self) -> Vec<ConcatMode> {
        self.encoder.concats.lock().unwrap().clone()
    }
}

fn scenes_json(count: usize) -> String {
    let scenes: Vec<String> = (1..=count)
        .map(|i| format!(r#"{{"image_prompt":"shot {i}","voiceover_text":"line {i}"}}"#))
        .collect();
    format!(r#"{{"scenes":[{}]}}"#, scenes.join(","))
}

#[tokio::test]
async fn lighthouse_topic_produces_video_and_two_images() {
    let h = harness(LIGHTHOUSE, FakeImages::default(), FakeEncoder::default(), 1);
    let result = h.pipeline.run("a lighthouse at dusk").await;

    assert!(result.is_success(), "unexpected error: {:?}", result.error);
    assert_eq!(result.topic, "a lighthouse at dusk");
    assert_eq!(result.video_bytes.as_deref(), Some(&b"clip-1|clip-2|"[..]));
    assert_eq!(result.images.len(), 2);
    assert_eq!(result.images[0].name, "scene_1.png");
    assert_eq!(result.images[0].bytes, b"image-1");
    assert_eq!(result.images[1].name, "scene_2.png");

    assert_eq!(h.clip_calls(), vec![1, 2]);
    assert_eq!(h.concat_calls(), vec![ConcatMode::Copy]);

    let prompts = h.text.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].human, "Here is the topic: a lighthouse at dusk");

    let progress = h.progress.lock().unwrap();
    assert_eq!(progress.first(), Some(&5));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn missing_image_prompt_stops_before_that_scene_is_encoded() {
    let response = r#"{"scenes":[{"image_prompt":"ok","voiceover_text":"a"},{"voiceover_text":"b"}]}"#;
    let h = harness(response, FakeImages::default(), FakeEncoder::default(), 1);
    let result = h.pipeline.run("topic").await;

    let err = result.error.expect("run should fail");
    assert!(err.contains("scene 2"), "{err}");
    assert!(result.video_bytes.is_none());
    assert_eq!(result.images.len(), 1);
    assert_eq!(result.images[0].scene_index, 1);
    assert_eq!(h.clip_calls(), vec![1]);
    assert!(h.concat_calls().is_empty());
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn fast_concat_failure_falls_back_to_reencode() {
    let encoder = FakeEncoder {
        fail_copy: true,
        ..FakeEncoder::default()
    };
    let h = harness(&scenes_json(3), FakeImages::default(), encoder, 1);
    let result = h.pipeline.run("topic").await;

    assert!(result.is_success(), "unexpected error: {:?}", result.error);
    assert_eq!(result.video_bytes.as_deref(), Some(&b"clip-1|clip-2|clip-3|"[..]));
    assert_eq!(h.clip_calls(), vec![1, 2, 3]);
    assert_eq!(
        h.concat_calls(),
        vec![ConcatMode::Copy, ConcatMode::Reencode]
    );
}

#[tokio::test]
async fn both_concat_strategies_failing_reports_assembly_error() {
    let encoder = FakeEncoder {
        fail_copy: true,
        fail_reencode: true,
        ..FakeEncoder::default()
    };
    let h = harness(LIGHTHOUSE, FakeImages::default(), encoder, 1);
    let result = h.pipeline.run("topic").await;

    assert_eq!(result.error.as_deref(), Some("Final FFmpeg assembly failed."));
    assert!(result.video_bytes.is_none());
    assert_eq!(result.images.len(), 2);
    assert_eq!(h.concat_calls().len(), 2);
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn clip_failure_names_the_scene_and_keeps_images() {
    let encoder = FakeEncoder {
        fail_clip: Some(2),
        ..FakeEncoder::default()
    };
    let h = harness(&scenes_json(3), FakeImages::default(), encoder, 1);
    let result = h.pipeline.run("topic").await;

    assert_eq!(
        result.error.as_deref(),
        Some("FFmpeg failed while creating scene 2.")
    );
    assert_eq!(result.images.len(), 2);
    assert_eq!(h.clip_calls(), vec![1, 2]);
    assert!(h.concat_calls().is_empty());
}

#[tokio::test]
async fn response_without_json_fails_cleanly() {
    let h = harness(
        "Sorry, I can only answer in prose.",
        FakeImages::default(),
        FakeEncoder::default(),
        1,
    );
    let result = h.pipeline.run("topic").await;

    let err = result.error.expect("run should fail");
    assert!(err.contains("no JSON found"), "{err}");
    assert!(result.images.is_empty());
    assert!(h.clip_calls().is_empty());
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn empty_scene_list_fails_with_no_scenes() {
    let h = harness(r#"{"scenes": []}"#, FakeImages::default(), FakeEncoder::default(), 1);
    let result = h.pipeline.run("topic").await;
    assert!(result.error.unwrap().contains("no scenes"));
}

#[tokio::test]
async fn image_service_failure_keeps_earlier_images() {
    let images = FakeImages {
        fail_scene: Some(2),
        ..FakeImages::default()
    };
    let h = harness(&scenes_json(3), images, FakeEncoder::default(), 1);
    let result = h.pipeline.run("topic").await;

    let err = result.error.expect("run should fail");
    assert!(err.contains("image generation for scene 2"), "{err}");
    assert_eq!(result.images.len(), 1);
    assert_eq!(h.clip_calls(), vec![1]);
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn speech_failure_keeps_the_image_of_the_failing_scene() {
    let speech = FakeSpeech { fail_scene: Some(2) };
    let h = harness_with_speech(LIGHTHOUSE, FakeImages::default(), speech, FakeEncoder::default(), 1);
    let result = h.pipeline.run("topic").await;

    let err = result.error.expect("run should fail");
    assert!(err.contains("audio generation for scene 2"), "{err}");
    assert!(result.video_bytes.is_none());
    let names: Vec<&str> = result.images.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["scene_1.png", "scene_2.png"]);
    assert_eq!(result.images[1].bytes, b"image-2");
    assert_eq!(h.clip_calls(), vec![1]);
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn blank_topic_is_rejected_without_calling_services() {
    let h = harness(LIGHTHOUSE, FakeImages::default(), FakeEncoder::default(), 1);
    let result = h.pipeline.run("   ").await;

    assert!(result.error.unwrap().contains("topic must not be empty"));
    assert!(h.text.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn parallel_media_still_renders_and_joins_in_scene_order() {
    let images = FakeImages {
        reverse_delay_of: Some(4),
        ..FakeImages::default()
    };
    let h = harness(&scenes_json(4), images, FakeEncoder::default(), 4);
    let result = h.pipeline.run("topic").await;

    assert!(result.is_success(), "unexpected error: {:?}", result.error);
    assert_eq!(h.clip_calls(), vec![1, 2, 3, 4]);
    assert_eq!(
        result.video_bytes.as_deref(),
        Some(&b"clip-1|clip-2|clip-3|clip-4|"[..])
    );
    let order: Vec<usize> = result.images.iter().map(|i| i.scene_index).collect();
    assert_eq!(order, vec![1, 2, 3, 4]);
}
