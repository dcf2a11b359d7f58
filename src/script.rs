use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub topic: String,
    pub target_audience: String,
    pub style_template: String,
    pub emotion_need: String,
    pub memory_point: String,
}

/// Result of the strategy stage. Fields the model left out stay `None` and do
/// not touch the existing settings.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct StrategyPatch {
    #[serde(default, alias = "targetAudience")]
    pub audience: Option<String>,
    #[serde(default, alias = "emotionNeed")]
    pub emotion_need: Option<String>,
    #[serde(default, alias = "styleTemplate")]
    pub style_template: Option<String>,
    #[serde(default, alias = "memoryPoint")]
    pub memory_point: Option<String>,
}

impl ProjectSettings {
    /// Overwrites the four strategy fields present in `patch`. `topic` is never
    /// touched.
    pub fn apply(&mut self, patch: StrategyPatch) {
        if let Some(v) = patch.audience {
            self.target_audience = v;
        }
        if let Some(v) = patch.emotion_need {
            self.emotion_need = v;
        }
        if let Some(v) = patch.style_template {
            self.style_template = v;
        }
        if let Some(v) = patch.memory_point {
            self.memory_point = v;
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    #[default]
    Male,
    Female,
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub name: String,
    pub gender: Gender,
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_action: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub emotion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_golden_sentence: Option<bool>,
}

impl DialogueLine {
    pub fn has_shot(&self) -> bool {
        self.shot_type
            .as_deref()
            .map_or(false, |s| !s.trim().is_empty())
    }
}

/// Production progress of one scene, derived from its dialogue lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Pending,
    DialogueDrafted,
    ShotAssigned,
}

impl fmt::Display for SceneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SceneState::Pending => "pending",
            SceneState::DialogueDrafted => "dialogue drafted",
            SceneState::ShotAssigned => "shots assigned",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: u32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conflict: String,
    #[serde(default, alias = "rhythm_type")]
    pub rhythm_type: String,
    #[serde(default)]
    pub dialogues: Vec<DialogueLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viral_score: Option<f64>,
}

/// Models number scenes however they like ("2", 2.0, null). Anything that is
/// not a whole non-negative number becomes 0 and is renumbered later.
fn lenient_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let id = match &value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(id.unwrap_or(0))
}

impl Scene {
    pub fn state(&self) -> SceneState {
        if self.dialogues.is_empty() {
            SceneState::Pending
        } else if self.dialogues.iter().all(DialogueLine::has_shot) {
            SceneState::ShotAssigned
        } else {
            SceneState::DialogueDrafted
        }
    }

    pub fn is_production_complete(&self) -> bool {
        self.state() == SceneState::ShotAssigned
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViralAnalysis {
    #[serde(alias = "hook_strength")]
    pub hook_strength: String,
    #[serde(alias = "emotion_peak")]
    pub emotion_peak: String,
    #[serde(alias = "rhythm_fit")]
    pub rhythm_fit: String,
    #[serde(alias = "memory_repeat")]
    pub memory_repeat: String,
    #[serde(alias = "spread_potential")]
    pub spread_potential: String,
}

/// The script as handed to the viral reviewer.
#[derive(Debug, Serialize, Clone)]
pub struct Script<'a> {
    pub title: &'a str,
    pub scenes: &'a [Scene],
}

/// Exported artifact of a session.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalDocument {
    pub settings: ProjectSettings,
    pub characters: Vec<Character>,
    pub scenes: Vec<Scene>,
    pub viral_analysis: Option<ViralAnalysis>,
}

pub fn signature_actions(characters: &[Character]) -> String {
    characters
        .iter()
        .map(|c| {
            let action = c
                .signature_action
                .as_deref()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or("None");
            format!("{}: {}", c.name, action)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(shot: Option<&str>) -> DialogueLine {
        DialogueLine {
            speaker: "A".to_string(),
            text: "hi".to_string(),
            shot_type: shot.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_strategy_patch_leaves_topic_alone() {
        let mut settings = ProjectSettings {
            topic: "office drama".to_string(),
            target_audience: "old".to_string(),
            memory_point: "keep me".to_string(),
            ..Default::default()
        };
        let patch: StrategyPatch = serde_json::from_str(
            r#"{"audience": "Gen Z", "emotion_need": "catharsis", "styleTemplate": "fast cuts", "topic": "ignored"}"#,
        )
        .unwrap();

        settings.apply(patch);

        assert_eq!(settings.topic, "office drama");
        assert_eq!(settings.target_audience, "Gen Z");
        assert_eq!(settings.emotion_need, "catharsis");
        assert_eq!(settings.style_template, "fast cuts");
        assert_eq!(settings.memory_point, "keep me");
    }

    #[test]
    fn test_scene_state_derivation() {
        let mut scene = Scene { id: 1, ..Default::default() };
        assert_eq!(scene.state(), SceneState::Pending);

        scene.dialogues = vec![line(Some("Close-up")), line(None)];
        assert_eq!(scene.state(), SceneState::DialogueDrafted);

        scene.dialogues[1].shot_type = Some("  ".to_string());
        assert_eq!(scene.state(), SceneState::DialogueDrafted);

        scene.dialogues[1].shot_type = Some("Wide".to_string());
        assert_eq!(scene.state(), SceneState::ShotAssigned);
        assert!(scene.is_production_complete());
    }

    #[test]
    fn test_scene_accepts_both_rhythm_spellings() {
        let a: Scene = serde_json::from_str(r#"{"id": 2, "rhythmType": "Fast"}"#).unwrap();
        let b: Scene = serde_json::from_str(r#"{"id": 2, "rhythm_type": "Fast"}"#).unwrap();
        assert_eq!(a.rhythm_type, "Fast");
        assert_eq!(a, b);
        assert!(a.dialogues.is_empty());
    }

    #[test]
    fn test_scene_id_tolerates_loose_numbers() {
        let ids: Vec<u32> = [r#""3""#, "4.0", r#"" 5 ""#, r#""two""#, "-1", "null"]
            .iter()
            .map(|id| {
                let scene: Scene = serde_json::from_str(&format!(r#"{{"id": {}, "location": "Lobby"}}"#, id)).unwrap();
                assert_eq!(scene.location, "Lobby");
                scene.id
            })
            .collect();
        assert_eq!(ids, vec![3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn test_viral_analysis_accepts_snake_case() {
        let analysis: ViralAnalysis = serde_json::from_str(
            r#"{"hook_strength": "a", "emotion_peak": "b", "rhythm_fit": "c", "memory_repeat": "d", "spread_potential": "e"}"#,
        )
        .unwrap();
        assert_eq!(analysis.spread_potential, "e");

        let out = serde_json::to_value(&analysis).unwrap();
        assert_eq!(out["hookStrength"], "a");
    }

    #[test]
    fn test_viral_analysis_requires_every_field() {
        let result: Result<ViralAnalysis, _> =
            serde_json::from_str(r#"{"hook_strength": "a"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_signature_actions_summary() {
        let characters = vec![
            Character {
                name: "Lin".to_string(),
                signature_action: Some("taps glasses".to_string()),
                ..Default::default()
            },
            Character {
                name: "Zhao".to_string(),
                gender: Gender::Female,
                ..Default::default()
            },
        ];
        assert_eq!(
            signature_actions(&characters),
            "Lin: taps glasses, Zhao: None"
        );
    }

    #[test]
    fn test_final_document_uses_camel_case() {
        let doc = FinalDocument::default();
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("viralAnalysis").is_some());
        assert_eq!(value["settings"]["targetAudience"], "");
    }
}
