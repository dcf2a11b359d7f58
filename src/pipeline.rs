//! Production pipeline.
//!
//! Walks the scene list in order and, for each scene, drafts dialogue and then
//! designs shots. A failing scene is logged and skipped; the loop always runs
//! to the end and never rolls back what earlier scenes reached.

use crate::script::{Character, Scene, SceneState};
use crate::stages::Stages;
use crate::state::{AgentRole, Severity};

pub const PRODUCTION_COMPLETE: &str = "Production Complete";

/// Receives progress while the pipeline runs.
pub trait ProductionObserver {
    fn status(&mut self, message: &str);
    fn log(&mut self, role: AgentRole, message: String, severity: Severity);
    /// Called after every scene with the full, current scene list.
    fn scenes_updated(&mut self, scenes: &[Scene]);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneOutcome {
    pub scene_id: u32,
    pub state: SceneState,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionReport {
    pub outcomes: Vec<SceneOutcome>,
}

impl ProductionReport {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == SceneState::ShotAssigned)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

pub struct ProductionPipeline<'a> {
    stages: Stages<'a>,
}

impl<'a> ProductionPipeline<'a> {
    pub fn new(stages: Stages<'a>) -> Self {
        Self { stages }
    }

    pub async fn run<O>(
        &self,
        scenes: &mut [Scene],
        characters: &[Character],
        style: &str,
        observer: &mut O,
    ) -> ProductionReport
    where
        O: ProductionObserver + ?Sized,
    {
        let mut report = ProductionReport::default();

        for i in 0..scenes.len() {
            let error = self.produce_scene(&mut scenes[i], characters, style, observer).await;
            report.outcomes.push(SceneOutcome {
                scene_id: scenes[i].id,
                state: scenes[i].state(),
                error,
            });
            observer.scenes_updated(scenes);
        }

        observer.status(PRODUCTION_COMPLETE);
        report
    }

    /// Returns the failure message if the scene stopped short.
    async fn produce_scene<O>(
        &self,
        scene: &mut Scene,
        characters: &[Character],
        style: &str,
        observer: &mut O,
    ) -> Option<String>
    where
        O: ProductionObserver + ?Sized,
    {
        observer.status(&format!("Processing Scene {}...", scene.id));
        observer.log(
            AgentRole::Screenwriter,
            format!("Writing dialogue for Scene {} ({})...", scene.id, scene.location),
            Severity::Info,
        );

        let drafted = match self.stages.write_dialogue(scene, characters).await {
            Ok(lines) => lines,
            Err(e) => {
                let message = format!("Dialogue failed for Scene {}: {}", scene.id, e);
                observer.log(AgentRole::Screenwriter, message.clone(), Severity::Error);
                return Some(message);
            }
        };
        scene.dialogues = drafted;
        observer.log(
            AgentRole::Screenwriter,
            format!("Drafted {} lines for Scene {}.", scene.dialogues.len(), scene.id),
            Severity::Success,
        );

        observer.log(
            AgentRole::Cinematographer,
            format!("Designing shots for Scene {}...", scene.id),
            Severity::Info,
        );
        match self.stages.design_shots(&scene.dialogues, style).await {
            Ok(with_shots) => {
                scene.dialogues = with_shots;
                observer.log(
                    AgentRole::Cinematographer,
                    format!("Shots assigned for Scene {}.", scene.id),
                    Severity::Success,
                );
                None
            }
            Err(e) => {
                let message = format!("Shot design failed for Scene {}: {}", scene.id, e);
                observer.log(AgentRole::Cinematographer, message.clone(), Severity::Error);
                Some(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProductionConfig;
    use crate::generation::GenerationClient;
    use crate::llm::LlmClient;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Answers dialogue and shot prompts, failing on request per scene id.
    #[derive(Debug, Default)]
    struct MockLlmClient {
        fail_dialogue: HashSet<u32>,
        fail_shots: HashSet<u32>,
        calls: Mutex<Vec<String>>,
        in_flight: Mutex<usize>,
    }

    fn scene_id_in(prompt: &str) -> u32 {
        let start = prompt.find("\"id\":").expect("scene json in prompt") + 5;
        prompt[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap()
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn chat(&self, _system: &str, user: &str) -> Result<String> {
            {
                let mut n = self.in_flight.lock().unwrap();
                *n += 1;
                assert_eq!(*n, 1, "calls must never overlap");
            }
            tokio::task::yield_now().await;
            *self.in_flight.lock().unwrap() -= 1;

            if user.contains("You are the screenwriter") {
                let id = scene_id_in(user);
                self.calls.lock().unwrap().push(format!("dialogue:{}", id));
                if self.fail_dialogue.contains(&id) {
                    return Err(anyhow!("model overloaded"));
                }
                return Ok(format!(
                    r#"{{"dialogues": [
                        {{"speaker": "A", "text": "scene {id} first", "action": "points", "emotion": "calm"}},
                        {{"speaker": "B", "text": "scene {id} second", "action": "freezes", "emotion": "shock"}}
                    ]}}"#
                ));
            }

            if user.contains("You are the director of photography") {
                let tag = user
                    .split("scene ")
                    .nth(1)
                    .and_then(|rest| rest.split_whitespace().next())
                    .and_then(|id| id.parse::<u32>().ok())
                    .unwrap_or(0);
                self.calls.lock().unwrap().push(format!("shots:{}", tag));
                if self.fail_shots.contains(&tag) {
                    return Ok("not json".to_string());
                }
                let count = user.matches("\"speaker\"").count();
                let shots = vec![r#"{"shotType": "Close-up"}"#; count].join(",");
                return Ok(format!(r#"{{"shots": [{}]}}"#, shots));
            }

            Err(anyhow!("unexpected prompt"))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        statuses: Vec<String>,
        logs: Vec<(AgentRole, String, Severity)>,
        publications: Vec<Vec<SceneState>>,
    }

    impl ProductionObserver for RecordingObserver {
        fn status(&mut self, message: &str) {
            self.statuses.push(message.to_string());
        }

        fn log(&mut self, role: AgentRole, message: String, severity: Severity) {
            self.logs.push((role, message, severity));
        }

        fn scenes_updated(&mut self, scenes: &[Scene]) {
            self.publications.push(scenes.iter().map(Scene::state).collect());
        }
    }

    fn scenes(ids: &[u32]) -> Vec<Scene> {
        ids.iter()
            .map(|id| Scene {
                id: *id,
                location: format!("Room {}", id),
                ..Default::default()
            })
            .collect()
    }

    async fn run_with(llm: MockLlmClient, ids: &[u32]) -> (Vec<Scene>, RecordingObserver, ProductionReport, Arc<MockLlmClient>) {
        let llm = Arc::new(llm);
        let client = GenerationClient::new("mock", Some(llm.clone()));
        let production = ProductionConfig::default();
        let pipeline = ProductionPipeline::new(Stages::new(&client, &production));

        let mut scenes = scenes(ids);
        let mut observer = RecordingObserver::default();
        let report = pipeline.run(&mut scenes, &[], "noir", &mut observer).await;
        (scenes, observer, report, llm)
    }

    #[tokio::test]
    async fn test_all_scenes_reach_shot_assigned_in_order() {
        let (scenes, observer, report, llm) = run_with(MockLlmClient::default(), &[1, 2, 3]).await;

        assert!(scenes.iter().all(Scene::is_production_complete));
        assert_eq!(report.completed(), 3);
        assert_eq!(report.failed(), 0);
        assert_eq!(
            *llm.calls.lock().unwrap(),
            vec!["dialogue:1", "shots:1", "dialogue:2", "shots:2", "dialogue:3", "shots:3"]
        );
        assert_eq!(observer.statuses.last().map(String::as_str), Some(PRODUCTION_COMPLETE));
        assert_eq!(observer.statuses[0], "Processing Scene 1...");
    }

    #[tokio::test]
    async fn test_dialogue_failure_skips_shots_and_continues() {
        let llm = MockLlmClient {
            fail_dialogue: HashSet::from([2]),
            ..Default::default()
        };
        let (scenes, observer, report, llm) = run_with(llm, &[1, 2]).await;

        assert_eq!(scenes[0].state(), SceneState::ShotAssigned);
        assert_eq!(scenes[0].dialogues.len(), 2);
        assert_eq!(scenes[1].state(), SceneState::Pending);
        assert!(scenes[1].dialogues.is_empty());

        assert_eq!(*llm.calls.lock().unwrap(), vec!["dialogue:1", "shots:1", "dialogue:2"]);

        let errors: Vec<_> = observer
            .logs
            .iter()
            .filter(|(_, _, severity)| *severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("Scene 2"));
        assert_eq!(report.failed(), 1);
        assert_eq!(observer.statuses.last().map(String::as_str), Some(PRODUCTION_COMPLETE));
    }

    #[tokio::test]
    async fn test_shot_failure_leaves_scene_drafted() {
        let llm = MockLlmClient {
            fail_shots: HashSet::from([1]),
            ..Default::default()
        };
        let (scenes, _, report, llm) = run_with(llm, &[1, 2]).await;

        assert_eq!(scenes[0].state(), SceneState::DialogueDrafted);
        assert!(scenes[0].dialogues.iter().all(|d| d.shot_type.is_none()));
        assert_eq!(scenes[1].state(), SceneState::ShotAssigned);
        assert_eq!(llm.calls.lock().unwrap().len(), 4);
        assert_eq!(report.outcomes[0].state, SceneState::DialogueDrafted);
        assert!(report.outcomes[0].error.is_some());
    }

    #[tokio::test]
    async fn test_scenes_published_after_every_scene() {
        let llm = MockLlmClient {
            fail_dialogue: HashSet::from([1]),
            ..Default::default()
        };
        let (_, observer, _, _) = run_with(llm, &[1, 2, 3]).await;

        assert_eq!(
            observer.publications,
            vec![
                vec![SceneState::Pending, SceneState::Pending, SceneState::Pending],
                vec![SceneState::Pending, SceneState::ShotAssigned, SceneState::Pending],
                vec![SceneState::Pending, SceneState::ShotAssigned, SceneState::ShotAssigned],
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_scene_list_still_completes() {
        let (_, observer, report, llm) = run_with(MockLlmClient::default(), &[]).await;

        assert!(report.outcomes.is_empty());
        assert!(llm.calls.lock().unwrap().is_empty());
        assert_eq!(observer.statuses, vec![PRODUCTION_COMPLETE.to_string()]);
    }
}
