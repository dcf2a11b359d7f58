use crate::config::{ProductionConfig, ShotMergePolicy};
use crate::error::GenerationError;
use crate::generation::{decode, GenerationClient};
use crate::prompts::{DialoguePrompt, ScenePlanPrompt, ShotPrompt, StrategyPrompt, ViralCheckPrompt};
use crate::script::{
    Character, DialogueLine, ProjectSettings, Scene, Script, StrategyPatch, ViralAnalysis,
};
use log::warn;
use serde::Deserialize;

pub type StageResult<T> = Result<T, GenerationError>;

/// The five model-backed steps. Each renders its prompt, makes one call and
/// decodes the answer; failures are returned as-is.
pub struct Stages<'a> {
    client: &'a GenerationClient,
    production: &'a ProductionConfig,
}

#[derive(Deserialize)]
struct ScenePlan {
    scenes: Vec<Scene>,
}

#[derive(Deserialize)]
struct DialogueDraft {
    dialogues: Vec<DialogueLine>,
}

#[derive(Deserialize)]
struct ShotList {
    shots: Vec<ShotAssignment>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ShotAssignment {
    #[serde(default, rename = "shotType", alias = "shot_type")]
    pub shot_type: Option<String>,
}

impl<'a> Stages<'a> {
    pub fn new(client: &'a GenerationClient, production: &'a ProductionConfig) -> Self {
        Self { client, production }
    }

    pub async fn strategy(&self, topic: &str) -> StageResult<StrategyPatch> {
        let prompt = StrategyPrompt { topic }.render()?;
        self.client.invoke_as(&prompt).await
    }

    pub async fn plan_scenes(
        &self,
        topic: &str,
        settings: &ProjectSettings,
        characters: &[Character],
    ) -> StageResult<Vec<Scene>> {
        let prompt = ScenePlanPrompt { topic, settings, characters }.render()?;
        let plan: ScenePlan = self.client.invoke_as(&prompt).await?;

        let mut scenes = plan.scenes;
        if !(3..=5).contains(&scenes.len()) {
            warn!("Scene plan returned {} scenes, expected 3-5", scenes.len());
        }
        for scene in scenes.iter_mut() {
            scene.dialogues.clear();
        }
        normalize_scene_ids(&mut scenes);
        Ok(scenes)
    }

    pub async fn write_dialogue(
        &self,
        scene: &Scene,
        characters: &[Character],
    ) -> StageResult<Vec<DialogueLine>> {
        let prompt = DialoguePrompt { scene, characters }.render()?;
        let value = self.client.invoke(&prompt).await?;
        let raw = value.to_string();
        let draft: DialogueDraft = decode(value)?;

        if draft.dialogues.is_empty() {
            return Err(GenerationError::parse(
                format!("no dialogue lines for scene {}", scene.id),
                &raw,
            ));
        }

        Ok(draft
            .dialogues
            .into_iter()
            .map(|line| DialogueLine { shot_type: None, ..line })
            .collect())
    }

    /// Returns a copy of `dialogues` with a shot attached to every line.
    pub async fn design_shots(
        &self,
        dialogues: &[DialogueLine],
        style: &str,
    ) -> StageResult<Vec<DialogueLine>> {
        let prompt = ShotPrompt { dialogues, style }.render()?;
        let list: ShotList = self.client.invoke_as(&prompt).await?;
        merge_shots(
            dialogues,
            &list.shots,
            self.production.shot_merge,
            &self.production.fallback_shot,
        )
    }

    pub async fn review_virality(&self, script: &Script<'_>) -> StageResult<ViralAnalysis> {
        let prompt = ViralCheckPrompt { script }.render()?;
        self.client.invoke_as(&prompt).await
    }
}

/// Pairs shots with dialogue lines by position. Only `shot_type` changes.
pub fn merge_shots(
    dialogues: &[DialogueLine],
    shots: &[ShotAssignment],
    policy: ShotMergePolicy,
    fallback: &str,
) -> StageResult<Vec<DialogueLine>> {
    if policy == ShotMergePolicy::Strict && shots.len() != dialogues.len() {
        return Err(GenerationError::ShotMismatch {
            expected: dialogues.len(),
            actual: shots.len(),
        });
    }
    if shots.len() != dialogues.len() {
        warn!(
            "Shot count {} differs from dialogue count {}, filling with '{}'",
            shots.len(),
            dialogues.len(),
            fallback
        );
    }

    Ok(dialogues
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let shot = shots
                .get(i)
                .and_then(|s| s.shot_type.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback);
            DialogueLine {
                shot_type: Some(shot.to_string()),
                ..line.clone()
            }
        })
        .collect())
}

/// Renumbers scenes 1..n in list order unless they already are.
pub fn normalize_scene_ids(scenes: &mut [Scene]) -> bool {
    let sequential = scenes
        .iter()
        .enumerate()
        .all(|(i, s)| s.id as usize == i + 1);
    if sequential {
        return false;
    }

    warn!(
        "Scene ids {:?} are not sequential, renumbering",
        scenes.iter().map(|s| s.id).collect::<Vec<_>>()
    );
    for (i, scene) in scenes.iter_mut().enumerate() {
        scene.id = i as u32 + 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmClient;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct ScriptedLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            Ok(self.reply.clone())
        }
    }

    fn client(reply: &str) -> (GenerationClient, Arc<ScriptedLlm>) {
        let llm = Arc::new(ScriptedLlm {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        (GenerationClient::new("mock", Some(llm.clone())), llm)
    }

    fn line(speaker: &str, text: &str) -> DialogueLine {
        DialogueLine {
            speaker: speaker.to_string(),
            text: text.to_string(),
            action: "shrugs".to_string(),
            emotion: "calm".to_string(),
            ..Default::default()
        }
    }

    fn shot(label: &str) -> ShotAssignment {
        ShotAssignment { shot_type: Some(label.to_string()) }
    }

    #[test]
    fn test_merge_shots_preserves_everything_but_shot_type() {
        let dialogues = vec![line("A", "one"), line("B", "two")];
        let merged = merge_shots(
            &dialogues,
            &[shot("Close-up"), shot("Tracking")],
            ShotMergePolicy::Strict,
            "Medium Shot",
        )
        .unwrap();

        assert_eq!(merged.len(), 2);
        for (before, after) in dialogues.iter().zip(&merged) {
            assert_eq!(before.speaker, after.speaker);
            assert_eq!(before.text, after.text);
            assert_eq!(before.action, after.action);
            assert_eq!(before.emotion, after.emotion);
        }
        assert_eq!(merged[0].shot_type.as_deref(), Some("Close-up"));
        assert_eq!(merged[1].shot_type.as_deref(), Some("Tracking"));
    }

    #[test]
    fn test_strict_merge_rejects_length_mismatch() {
        let dialogues = vec![line("A", "one"), line("B", "two")];
        let err = merge_shots(&dialogues, &[shot("Wide")], ShotMergePolicy::Strict, "Medium Shot")
            .unwrap_err();
        assert!(matches!(err, GenerationError::ShotMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_lenient_merge_fills_and_truncates() {
        let dialogues = vec![line("A", "one"), line("B", "two")];

        let short = merge_shots(&dialogues, &[shot("Wide")], ShotMergePolicy::Lenient, "Medium Shot")
            .unwrap();
        assert_eq!(short[1].shot_type.as_deref(), Some("Medium Shot"));

        let long = merge_shots(
            &dialogues,
            &[shot("Wide"), shot("Pan"), shot("Extra")],
            ShotMergePolicy::Lenient,
            "Medium Shot",
        )
        .unwrap();
        assert_eq!(long.len(), 2);
    }

    #[test]
    fn test_blank_shot_takes_fallback() {
        let dialogues = vec![line("A", "one"), line("B", "two")];
        let merged = merge_shots(
            &dialogues,
            &[shot(" "), ShotAssignment::default()],
            ShotMergePolicy::Strict,
            "Medium Shot",
        )
        .unwrap();
        assert!(merged.iter().all(|l| l.shot_type.as_deref() == Some("Medium Shot")));
    }

    #[test]
    fn test_normalize_scene_ids() {
        let mut scenes = vec![
            Scene { id: 1, ..Default::default() },
            Scene { id: 2, ..Default::default() },
        ];
        assert!(!normalize_scene_ids(&mut scenes));

        let mut scenes = vec![
            Scene { id: 4, ..Default::default() },
            Scene { id: 4, ..Default::default() },
            Scene { id: 0, ..Default::default() },
        ];
        assert!(normalize_scene_ids(&mut scenes));
        assert_eq!(scenes.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_plan_scenes_clears_dialogues() {
        let (client, llm) = client(
            r#"{"scenes": [
                {"id": 1, "location": "Lab", "description": "d", "conflict": "c", "rhythmType": "Fast",
                 "dialogues": [{"speaker": "X", "text": "leaked"}]},
                {"id": 2, "location": "Roof", "description": "d", "conflict": "c", "rhythmType": "Slow"}
            ]}"#,
        );
        let production = ProductionConfig::default();
        let stages = Stages::new(&client, &production);
        let settings = ProjectSettings { topic: "secrets".to_string(), ..Default::default() };

        let scenes = stages.plan_scenes("secrets", &settings, &[]).await.unwrap();

        assert_eq!(scenes.len(), 2);
        assert!(scenes.iter().all(|s| s.dialogues.is_empty()));
        assert_eq!(scenes[1].rhythm_type, "Slow");
        assert!(llm.prompts.lock().unwrap()[0].contains("Topic: secrets"));
    }

    #[tokio::test]
    async fn test_write_dialogue_drops_shot_type() {
        let (client, _) = client(
            r#"```json
{"dialogues": [{"speaker": "Lin", "text": "You knew.", "action": "slams desk", "emotion": "anger", "shotType": "Wide", "isGoldenSentence": true}]}
```"#,
        );
        let production = ProductionConfig::default();
        let stages = Stages::new(&client, &production);

        let lines = stages
            .write_dialogue(&Scene { id: 1, ..Default::default() }, &[])
            .await
            .unwrap();

        assert_eq!(lines.len(), 1);
        assert!(lines[0].shot_type.is_none());
        assert_eq!(lines[0].is_golden_sentence, Some(true));
    }

    #[tokio::test]
    async fn test_write_dialogue_rejects_empty_draft() {
        let (client, _) = client(r#"{"dialogues": []}"#);
        let production = ProductionConfig::default();
        let stages = Stages::new(&client, &production);

        let err = stages
            .write_dialogue(&Scene { id: 7, ..Default::default() }, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_empty_draft_keeps_model_reply() {
        let (client, _) = client(r#"{"dialogues": [], "note": "nothing to say"}"#);
        let production = ProductionConfig::default();
        let stages = Stages::new(&client, &production);

        let err = stages
            .write_dialogue(&Scene { id: 3, ..Default::default() }, &[])
            .await
            .unwrap_err();
        match err {
            GenerationError::Parse { message, raw } => {
                assert!(message.contains("scene 3"));
                assert!(raw.contains("nothing to say"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plan_scenes_renumbers_string_ids() {
        let (client, _) = client(
            r#"{"scenes": [
                {"id": "1", "location": "Lab", "rhythmType": "Fast"},
                {"id": "scene-2", "location": "Roof", "rhythmType": "Slow"},
                {"id": 3.0, "location": "Street", "rhythmType": "Fast"}
            ]}"#,
        );
        let production = ProductionConfig::default();
        let stages = Stages::new(&client, &production);
        let settings = ProjectSettings { topic: "secrets".to_string(), ..Default::default() };

        let scenes = stages.plan_scenes("secrets", &settings, &[]).await.unwrap();

        assert_eq!(scenes.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(scenes[1].location, "Roof");
    }

    #[tokio::test]
    async fn test_review_virality_decodes_whole_record() {
        let (client, llm) = client(
            r#"{"hook_strength": "strong", "emotion_peak": "scene 3", "rhythm_fit": "good", "memory_repeat": "twice", "spread_potential": "high"}"#,
        );
        let production = ProductionConfig::default();
        let stages = Stages::new(&client, &production);
        let scenes = vec![Scene { id: 1, location: "Lab".to_string(), ..Default::default() }];

        let analysis = stages
            .review_virality(&Script { title: "secrets", scenes: &scenes })
            .await
            .unwrap();

        assert_eq!(analysis.hook_strength, "strong");
        assert!(llm.prompts.lock().unwrap()[0].contains("\"title\":\"secrets\""));
    }
}
