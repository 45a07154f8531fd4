use crate::error::{Malformed, StoryError, StoryResult};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    /// 1-based position in the storyboard.
    pub index: usize,
    /// Empty when the model left it out; rejected by the media step.
    pub image_prompt: String,
    pub voiceover_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storyboard {
    scenes: Vec<Scene>,
}

#[derive(Debug, Deserialize)]
struct RawScene {
    #[serde(default)]
    image_prompt: Option<String>,
    #[serde(default)]
    voiceover_text: Option<String>,
}

impl Storyboard {
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    fn from_root(root: &Value) -> StoryResult<Self> {
        let items = match root.get("scenes") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return Err(StoryError::MalformedResponse(Malformed::NoScenes)),
        };

        let mut scenes = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let raw = RawScene::deserialize(item)
                .map_err(|_| StoryError::MalformedResponse(Malformed::InvalidJson))?;
            scenes.push(Scene {
                index: idx + 1,
                image_prompt: raw.image_prompt.unwrap_or_default().trim().to_string(),
                voiceover_text: raw.voiceover_text.unwrap_or_default(),
            });
        }
        Ok(Self { scenes })
    }
}

/// Pulls the storyboard object out of free-form model output.
///
/// Every `{` is tried as the start of a complete JSON value; the first object
/// carrying a `scenes` key wins. When none does, the span from the first `{`
/// to the last `}` is decoded as a whole. A value cut off by the end of the
/// text ends the scan, since every later `{` sits inside it.
pub fn parse_storyboard(raw: &str) -> StoryResult<Storyboard> {
    let (first, last) = match (raw.find('{'), raw.rfind('}')) {
        (Some(first), Some(last)) if last > first => (first, last),
        _ => return Err(StoryError::MalformedResponse(Malformed::NoJson)),
    };

    let mut saw_object = false;
    for (start, _) in raw.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => {
                if value.get("scenes").is_some() {
                    return Storyboard::from_root(&value);
                }
                saw_object = true;
            }
            Some(Err(err)) if err.is_eof() => break,
            _ => {}
        }
    }

    match serde_json::from_str::<Value>(&raw[first..=last]) {
        Ok(value) if value.is_object() => Storyboard::from_root(&value),
        _ if saw_object => Err(StoryError::MalformedResponse(Malformed::NoScenes)),
        _ => Err(StoryError::MalformedResponse(Malformed::InvalidJson)),
    }
}
