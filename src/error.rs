use std::fmt;
use std::path::PathBuf;

/// Pipeline stage a failure is attributed to in user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Script,
    Storyboard,
    Image(usize),
    Audio(usize),
    Clip(usize),
    Assembly,
    Delivery,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Script => write!(f, "script generation"),
            Stage::Storyboard => write!(f, "storyboard parsing"),
            Stage::Image(n) => write!(f, "image generation for scene {n}"),
            Stage::Audio(n) => write!(f, "audio generation for scene {n}"),
            Stage::Clip(n) => write!(f, "clip rendering for scene {n}"),
            Stage::Assembly => write!(f, "final assembly"),
            Stage::Delivery => write!(f, "delivery"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    NoJson,
    InvalidJson,
    NoScenes,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Malformed::NoJson => write!(f, "no JSON found in model response"),
            Malformed::InvalidJson => write!(f, "model response JSON could not be decoded"),
            Malformed::NoScenes => write!(f, "no scenes found in the storyboard JSON"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("{0}")]
    MalformedResponse(Malformed),

    #[error("scene {scene} missing '{field}'")]
    MissingField { scene: usize, field: &'static str },

    #[error("request failed during {stage}: {source}")]
    Network {
        stage: Stage,
        #[source]
        source: reqwest::Error,
    },

    #[error("service returned HTTP {status} during {stage}: {body}")]
    Service {
        stage: Stage,
        status: u16,
        body: String,
    },

    #[error("ffmpeg exited with {status} during {stage}: {stderr}")]
    EncoderFailed {
        stage: Stage,
        status: String,
        stderr: String,
    },

    #[error("both concat strategies failed: {stderr}")]
    AssemblyFailed { stderr: String },

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    #[error("expected output missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not package results: {0}")]
    Delivery(String),

    #[error("{0}")]
    Unexpected(String),
}

pub type StoryResult<T> = std::result::Result<T, StoryError>;

impl StoryError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StoryError::Io {
            context: context.into(),
            source,
        }
    }

    /// Stage to blame when no better attribution is carried by the error itself.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            StoryError::EmptyTopic | StoryError::Config(_) => None,
            StoryError::MalformedResponse(_) => Some(Stage::Storyboard),
            StoryError::MissingField { scene, .. } => Some(Stage::Image(*scene)),
            StoryError::Network { stage, .. }
            | StoryError::Service { stage, .. }
            | StoryError::EncoderFailed { stage, .. }
            | StoryError::Timeout { stage, .. } => Some(*stage),
            StoryError::AssemblyFailed { .. } | StoryError::MissingArtifact(_) => {
                Some(Stage::Assembly)
            }
            StoryError::Delivery(_) => Some(Stage::Delivery),
            StoryError::Io { .. } | StoryError::Unexpected(_) => None,
        }
    }

    /// Single line shown to the person who started the run.
    pub fn user_message(&self) -> String {
        match self {
            StoryError::EncoderFailed {
                stage: Stage::Clip(n),
                ..
            } => format!("FFmpeg failed while creating scene {n}."),
            StoryError::AssemblyFailed { .. } => "Final FFmpeg assembly failed.".to_string(),
            StoryError::MissingArtifact(_) => "Final video not created.".to_string(),
            other => match other.stage() {
                Some(stage) => format!("Generation error ({stage}): {other}"),
                None if matches!(other, StoryError::Unexpected(_)) => {
                    format!("Unexpected error: {other}")
                }
                None => format!("Generation error: {other}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_failures_name_the_scene() {
        let err = StoryError::EncoderFailed {
            stage: Stage::Clip(2),
            status: "exit status: 1".into(),
            stderr: "boom".into(),
        };
        assert_eq!(err.stage(), Some(Stage::Clip(2)));
        assert_eq!(err.user_message(), "FFmpeg failed while creating scene 2.");
    }

    #[test]
    fn malformed_response_is_attributed_to_parsing() {
        let err = StoryError::MalformedResponse(Malformed::NoScenes);
        assert_eq!(err.stage(), Some(Stage::Storyboard));
        assert!(err.user_message().contains("no scenes"));
        assert!(err.user_message().contains("storyboard parsing"));
    }

    #[test]
    fn missing_prompt_points_at_image_stage() {
        let err = StoryError::MissingField {
            scene: 3,
            field: "image_prompt",
        };
        assert_eq!(err.to_string(), "scene 3 missing 'image_prompt'");
        assert_eq!(err.stage(), Some(Stage::Image(3)));
    }
}
