use crate::error::{StoryError, StoryResult};
use crate::ffmpeg::{ConcatMode, MediaEncoder};
use crate::media::{SceneMedia, clip_file_name};
use crate::{logi, logok, logw};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MANIFEST_NAME: &str = "filelist.txt";
pub const FINAL_VIDEO_NAME: &str = "final_video.mp4";

/// A scene whose still image and narration have been merged into a clip.
#[derive(Debug, Clone)]
pub struct SceneAsset {
    pub media: SceneMedia,
    pub clip_path: PathBuf,
    pub audio_duration: Option<f64>,
}

/// One concat-demuxer entry; single quotes are closed, escaped and reopened.
pub fn manifest_line(path: &Path) -> String {
    let quoted = path.display().to_string().replace('\'', r"'\''");
    format!("file '{}'\n", quoted)
}

pub fn build_manifest(clips: &[PathBuf]) -> String {
    clips.iter().map(|p| manifest_line(p)).collect()
}

pub async fn render_scene_clip(
    encoder: &dyn MediaEncoder,
    media: SceneMedia,
    scratch: &Path,
) -> StoryResult<SceneAsset> {
    let n = media.scene_index;
    let audio_duration = match encoder.probe_duration(n, &media.audio_path).await {
        Ok(dur) => Some(dur),
        Err(err) => {
            logw(format!("Could not measure narration for scene {}: {}", n, err));
            None
        }
    };

    let clip_path = scratch.join(clip_file_name(n));
    match audio_duration {
        Some(dur) => logi(format!("Building clip {} (narr={:.2}s) => {}", n, dur, clip_path.display())),
        None => logi(format!("Building clip {} => {}", n, clip_path.display())),
    }
    encoder
        .render_clip(n, &media.image_path, &media.audio_path, &clip_path)
        .await?;
    if fs::metadata(&clip_path).await.is_err() {
        return Err(StoryError::MissingArtifact(clip_path));
    }
    logok(format!("Built clip {} OK", n));

    Ok(SceneAsset {
        media,
        clip_path,
        audio_duration,
    })
}

/// Concatenates `clips` in the given order and returns the final video bytes.
///
/// Tries a stream copy first and falls back to a full re-encode.
pub async fn assemble_final(
    encoder: &dyn MediaEncoder,
    clips: &[PathBuf],
    scratch: &Path,
) -> StoryResult<Vec<u8>> {
    let list_path = scratch.join(MANIFEST_NAME);
    fs::write(&list_path, build_manifest(clips))
        .await
        .map_err(|e| StoryError::io(format!("Failed to write {}", list_path.display()), e))?;

    let out = scratch.join(FINAL_VIDEO_NAME);
    logi(format!("Concatenating {} clips -> {}", clips.len(), out.display()));
    if let Err(fast_err) = encoder.concat(ConcatMode::Copy, &list_path, &out).await {
        logw(format!("Stream-copy concat failed ({}); re-encoding", fast_err));
        let _ = fs::remove_file(&out).await;
        match encoder.concat(ConcatMode::Reencode, &list_path, &out).await {
            Ok(()) => logok("Re-encode concat OK"),
            Err(err @ StoryError::Timeout { .. }) => return Err(err),
            Err(err) => {
                return Err(StoryError::AssemblyFailed {
                    stderr: err.to_string(),
                });
            }
        }
    }

    if fs::metadata(&out).await.is_err() {
        return Err(StoryError::MissingArtifact(out));
    }
    let bytes = fs::read(&out)
        .await
        .map_err(|e| StoryError::io(format!("Failed to read {}", out.display()), e))?;
    logok(format!("Final video assembled ({} bytes)", bytes.len()));
    Ok(bytes)
}
