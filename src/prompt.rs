/// Number of scenes the model is asked for.
pub const SCENE_COUNT: usize = 2;

fn system_directive() -> String {
    format!(
        "You are a helpful assistant that generates short, {n}-scene video scripts. \
Your output must be a valid JSON object with a single key 'scenes' holding an array of exactly {n} scene objects. \
Each scene object must have an 'image_prompt' and a 'voiceover_text'. \
The 'image_prompt' must be a highly detailed description for an AI image generator, \
aiming for a photorealistic, cinematic style with dramatic lighting. \
Think like a film director specifying a shot.",
        n = SCENE_COUNT
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub human: String,
}

pub fn build_prompt(topic: &str) -> ChatPrompt {
    ChatPrompt {
        system: system_directive(),
        human: format!("Here is the topic: {}", topic),
    }
}
