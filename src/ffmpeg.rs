use crate::config::Config;
use crate::error::{Stage, StoryError, StoryResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    /// Container-level copy; needs every clip to share stream parameters.
    Copy,
    /// Full re-encode; slower but accepts mismatched clips.
    Reencode,
}

/// External encoder the clip assembler drives.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Loops `image` for the length of `audio` and writes a single clip.
    async fn render_clip(
        &self,
        scene: usize,
        image: &Path,
        audio: &Path,
        out: &Path,
    ) -> StoryResult<()>;

    /// Joins the clips listed in a concat-demuxer manifest.
    async fn concat(&self, mode: ConcatMode, list: &Path, out: &Path) -> StoryResult<()>;

    /// Length in seconds of one scene's narration.
    async fn probe_duration(&self, scene: usize, path: &Path) -> StoryResult<f64>;
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(cfg: &Config) -> Self {
        Self {
            ffmpeg: cfg.ffmpeg_bin.clone(),
            ffprobe: cfg.ffprobe_bin.clone(),
            timeout: Duration::from_secs(cfg.encoder_timeout_secs),
        }
    }
}

fn common_args() -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ]
}

pub fn clip_args(image: &Path, audio: &Path, out: &Path) -> Vec<String> {
    let mut args = common_args();
    args.extend([
        "-loop".to_string(),
        "1".to_string(),
        "-i".to_string(),
        image.display().to_string(),
        "-i".to_string(),
        audio.display().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-tune".to_string(),
        "stillimage".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-shortest".to_string(),
        out.display().to_string(),
    ]);
    args
}

pub fn concat_args(mode: ConcatMode, list: &Path, out: &Path) -> Vec<String> {
    let mut args = common_args();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list.display().to_string(),
    ]);
    match mode {
        ConcatMode::Copy => args.extend(["-c".to_string(), "copy".to_string()]),
        ConcatMode::Reencode => args.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
        ]),
    }
    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        out.display().to_string(),
    ]);
    args
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Runs one encoder process; the child is killed if `timeout` elapses first.
async fn run_cmd(
    program: &str,
    args: &[String],
    stage: Stage,
    timeout: Duration,
) -> StoryResult<Vec<u8>> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| StoryError::io(format!("Failed to launch {program}"), e))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| StoryError::io(format!("{program} wait failed"), e))?,
        Err(_) => {
            return Err(StoryError::Timeout {
                stage,
                secs: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        return Err(StoryError::EncoderFailed {
            stage,
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        });
    }
    Ok(output.stdout)
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn render_clip(
        &self,
        scene: usize,
        image: &Path,
        audio: &Path,
        out: &Path,
    ) -> StoryResult<()> {
        let args = clip_args(image, audio, out);
        run_cmd(&self.ffmpeg, &args, Stage::Clip(scene), self.timeout).await?;
        Ok(())
    }

    async fn concat(&self, mode: ConcatMode, list: &Path, out: &Path) -> StoryResult<()> {
        let args = concat_args(mode, list, out);
        run_cmd(&self.ffmpeg, &args, Stage::Assembly, self.timeout).await?;
        Ok(())
    }

    async fn probe_duration(&self, scene: usize, path: &Path) -> StoryResult<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.display().to_string(),
        ];
        let stdout = run_cmd(&self.ffprobe, &args, Stage::Clip(scene), self.timeout).await?;
        parse_duration(&String::from_utf8_lossy(&stdout)).ok_or_else(|| {
            StoryError::EncoderFailed {
                stage: Stage::Clip(scene),
                status: "invalid duration".to_string(),
                stderr: format!("ffprobe could not measure {}", path.display()),
            }
        })
    }
}

fn parse_duration(text: &str) -> Option<f64> {
    let duration = text.trim().parse::<f64>().ok()?;
    (duration > 0.0).then_some(duration)
}
