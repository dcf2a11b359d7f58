//! Prompt templates for every stage.
//!
//! Each stage has a small struct naming the values its template needs;
//! `render` serializes the context and substitutes the `{{PLACEHOLDER}}`s.

use crate::script::{signature_actions, Character, DialogueLine, ProjectSettings, Scene, Script};
use serde_json::Result;

pub const SYSTEM_PROMPT: &str =
    "You are part of a short-video writing room. Reply with valid JSON only.";

const STRATEGY_AUDIENCE: &str = r#"
You are a video strategist. Based on the topic, define the target audience and style positioning:
- Target audience: age, gender, interest tags (e.g. "18-25 Gen Z, into anime and plot twists")
- Core emotional need: the feeling the audience craves (e.g. "stress relief comedy", "hot-blooded", "healing warmth")
- Style template: traits borrowed from viral hits (e.g. "fast-paced twist short", "anime remix", "cinematic immersion")
- Memory point design: 1-2 shareable elements (e.g. "catchphrase", "repeated gesture gag", "striking visual shot")

Topic: {{TOPIC}}

Output strictly as JSON: {"audience": "...", "emotion_need": "...", "style_template": "...", "memory_point": "..."}
"#;

const DIRECTOR_SCENE_PLAN: &str = r#"
You are the director. Plan the scenes of a short drama from the following.

Topic: {{TOPIC}}
Audience and style: {{STRATEGY_JSON}}
Characters: {{CHARACTERS_JSON}}

Scene planning rules:
1. Every scene carries one micro-conflict (opposing views, an accident, a hidden secret) that drives the plot.
2. Scene 1 opens with a hook (odd behaviour, a suspenseful line).
3. Scene 3 (or the ending) holds the climax or twist.
4. Vary the rhythm: at least one "Fast" scene (dense dialogue, lots of action) and one "Slow" scene (mood, close detail).

Produce 3-5 scene outlines.
Output strictly as JSON:
{
  "scenes": [
    { "id": 1, "location": "...", "description": "...", "conflict": "...", "rhythmType": "Fast/Slow" }
  ]
}
"#;

const SCREENWRITER_DIALOGUE: &str = r#"
You are the screenwriter. Write dialogue and basic action for this scene.

Scene: {{SCENE_JSON}}
Characters: {{CHARACTERS_JSON}} (signature actions: {{SIGNATURE_ACTIONS}})

Dialogue rules:
1. Include 1-2 shareable golden sentences that fit the style.
2. Emotion escalates step by step (calm, doubt, outburst).
3. Leave things unsaid: hint key information through action or camera.
4. No expository lines.

Action rules:
1. Repeat each character's signature action at key lines.
2. Pair intense lines with exaggerated action.

Output strictly as JSON:
{
  "dialogues": [
    { "speaker": "RoleName", "text": "...", "action": "...", "emotion": "...", "isGoldenSentence": false }
  ]
}
"#;

const CINEMATOGRAPHER_SHOTS: &str = r#"
You are the director of photography. Design the shots for this dialogue.

Dialogue: {{DIALOGUE_JSON}}
Style: {{STYLE}}

Shot rules:
1. At least one signature viral shot per scene (low-angle burst, orbit move, slow motion).
2. The first 3 seconds use a strong visual hook.
3. At least 40% dynamic shots (e.g. tracking shots).
4. Never more than 3 static shots in a row.

Output strictly as JSON, exactly one entry per dialogue line, in order:
{
  "shots": [
    { "shotType": "..." }
  ]
}
"#;

const VIRAL_CHECK: &str = r#"
You are a viral video reviewer. Judge the spread potential of this complete script.

Script: {{SCRIPT_JSON}}

Assess:
1. Hook strength: do the first 30 seconds compel viewers to finish?
2. Emotion peak: is there at least one moment viewers want to screenshot or share?
3. Rhythm fit: does the pacing fit the target platform?
4. Memory repeat: do signature actions or golden sentences recur 2-3 times?
5. Spread potential: are there elements open to remixing?

Output strictly as JSON: {"hook_strength": "...", "emotion_peak": "...", "rhythm_fit": "...", "memory_repeat": "...", "spread_potential": "..."}
"#;

fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{}}}}}", key), value)
    })
}

pub struct StrategyPrompt<'a> {
    pub topic: &'a str,
}

impl StrategyPrompt<'_> {
    pub fn render(&self) -> Result<String> {
        Ok(fill(STRATEGY_AUDIENCE, &[("TOPIC", self.topic)]))
    }
}

pub struct ScenePlanPrompt<'a> {
    pub topic: &'a str,
    pub settings: &'a ProjectSettings,
    pub characters: &'a [Character],
}

impl ScenePlanPrompt<'_> {
    pub fn render(&self) -> Result<String> {
        let strategy = serde_json::to_string(self.settings)?;
        let characters = serde_json::to_string(self.characters)?;
        Ok(fill(
            DIRECTOR_SCENE_PLAN,
            &[
                ("TOPIC", self.topic),
                ("STRATEGY_JSON", &strategy),
                ("CHARACTERS_JSON", &characters),
            ],
        ))
    }
}

pub struct DialoguePrompt<'a> {
    pub scene: &'a Scene,
    pub characters: &'a [Character],
}

impl DialoguePrompt<'_> {
    pub fn render(&self) -> Result<String> {
        let scene = serde_json::to_string(self.scene)?;
        let characters = serde_json::to_string(self.characters)?;
        let actions = signature_actions(self.characters);
        Ok(fill(
            SCREENWRITER_DIALOGUE,
            &[
                ("SCENE_JSON", &scene),
                ("CHARACTERS_JSON", &characters),
                ("SIGNATURE_ACTIONS", &actions),
            ],
        ))
    }
}

pub struct ShotPrompt<'a> {
    pub dialogues: &'a [DialogueLine],
    pub style: &'a str,
}

impl ShotPrompt<'_> {
    pub fn render(&self) -> Result<String> {
        let dialogues = serde_json::to_string(self.dialogues)?;
        Ok(fill(
            CINEMATOGRAPHER_SHOTS,
            &[("DIALOGUE_JSON", &dialogues), ("STYLE", self.style)],
        ))
    }
}

pub struct ViralCheckPrompt<'a> {
    pub script: &'a Script<'a>,
}

impl ViralCheckPrompt<'_> {
    pub fn render(&self) -> Result<String> {
        let script = serde_json::to_string(self.script)?;
        Ok(fill(VIRAL_CHECK, &[("SCRIPT_JSON", &script)]))
    }
}
