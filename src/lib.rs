pub mod api;
pub mod assemble;
pub mod config;
pub mod delivery;
pub mod error;
pub mod ffmpeg;
pub mod generator;
pub mod init;
pub mod media;
pub mod prompt;
pub mod storyboard;

pub use error::{StoryError, StoryResult};
pub use generator::{GenerationResult, NamedImage, Services, StoryPipeline};

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("[{}] {}", tag, message),
        _ => tracing::info!("[{}] {}", tag, message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
