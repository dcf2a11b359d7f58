use crate::config::Config;
use crate::error::HandlerError;
use crate::generation::GenerationClient;
use crate::llm::create_llm;
use crate::pipeline::{ProductionObserver, ProductionPipeline, ProductionReport};
use crate::script::{Character, FinalDocument, ProjectSettings, Scene, Script};
use crate::stages::Stages;
use crate::state::{AgentRole, Severity, Stage, Step, WizardState};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

pub const EXPORT_FILE: &str = "script.json";

/// Owns the session state and runs the stage handlers against it.
///
/// Handlers take `&self`: the state lock is only held between model calls,
/// never across them, so observers can take snapshots while a stage runs.
/// Every mutation bumps the revision published through [`subscribe`].
///
/// [`subscribe`]: WizardController::subscribe
pub struct WizardController {
    config: Config,
    client: GenerationClient,
    state: Mutex<WizardState>,
    revision: watch::Sender<u64>,
}

impl WizardController {
    pub fn new(config: Config) -> Result<Self> {
        let llm = create_llm(&config)?;
        let client = GenerationClient::new(config.llm.provider.clone(), llm);
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Config, client: GenerationClient) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            config,
            client,
            state: Mutex::new(WizardState::default()),
            revision,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    pub fn snapshot(&self) -> WizardState {
        self.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, WizardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut WizardState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            f(&mut state)
        };
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    pub fn log(&self, role: AgentRole, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        self.mutate(|s| {
            s.push_log(role, message, severity);
        });
    }

    // --- Setup ---

    pub fn set_topic(&self, topic: impl Into<String>) {
        let topic = topic.into();
        self.mutate(|s| s.settings.topic = topic);
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut ProjectSettings)) {
        self.mutate(|s| f(&mut s.settings));
    }

    pub fn add_character(&self, character: Character) {
        self.mutate(|s| s.characters.push(character));
    }

    pub fn remove_character(&self, index: usize) -> Option<Character> {
        self.mutate(|s| (index < s.characters.len()).then(|| s.characters.remove(index)))
    }

    pub fn set_characters(&self, characters: Vec<Character>) {
        self.mutate(|s| s.characters = characters);
    }

    // --- Navigation ---

    pub fn step(&self) -> Step {
        self.lock().step
    }

    /// Jumps straight to `step`, like picking it from a sidebar.
    pub fn go_to(&self, step: Step) {
        self.mutate(|s| s.step = step);
    }

    /// Moves one step forward. Returns `None` when already at the end or when
    /// Setup is incomplete.
    pub fn next_step(&self) -> Option<Step> {
        self.mutate(|s| {
            if s.step == Step::Setup && !s.can_leave_setup() {
                return None;
            }
            let next = s.step.next()?;
            s.step = next;
            Some(next)
        })
    }

    // --- Handlers ---

    /// Claims the stage's loading flag and logs the start entry.
    fn begin(&self, stage: Stage, role: AgentRole, message: String, severity: Severity) -> Result<(), HandlerError> {
        self.mutate(|s| {
            if let Some(running) = s.loading.blocker(stage) {
                s.push_log(role, format!("{} is already running.", running), Severity::Warning);
                return Err(HandlerError::Busy(running));
            }
            s.loading.set(stage, true);
            s.push_log(role, message, severity);
            Ok(())
        })
    }

    fn stages(&self) -> Stages<'_> {
        Stages::new(&self.client, &self.config.production)
    }

    pub async fn generate_strategy(&self) -> Result<(), HandlerError> {
        let topic = self.lock().settings.topic.clone();
        self.begin(
            Stage::Strategy,
            AgentRole::Strategist,
            format!("Analyzing topic: \"{}\"...", topic),
            Severity::Info,
        )?;

        let result = self.stages().strategy(&topic).await;

        self.mutate(|s| {
            s.loading.set(Stage::Strategy, false);
            match result {
                Ok(patch) => {
                    s.settings.apply(patch);
                    s.push_log(AgentRole::Strategist, "Strategy defined successfully.", Severity::Success);
                    Ok(())
                }
                Err(e) => {
                    s.push_log(
                        AgentRole::Strategist,
                        format!("Failed to generate strategy: {}", e),
                        Severity::Error,
                    );
                    Err(HandlerError::from(e))
                }
            }
        })
    }

    pub async fn plan_scenes(&self) -> Result<(), HandlerError> {
        self.begin(
            Stage::ScenePlanning,
            AgentRole::Director,
            "Planning scenes with conflict hooks...".to_string(),
            Severity::Info,
        )?;

        let (settings, characters) = {
            let s = self.lock();
            (s.settings.clone(), s.characters.clone())
        };
        let result = self
            .stages()
            .plan_scenes(&settings.topic, &settings, &characters)
            .await;

        self.mutate(|s| {
            s.loading.set(Stage::ScenePlanning, false);
            match result {
                Ok(scenes) => {
                    s.push_log(
                        AgentRole::Director,
                        format!("Generated {} scenes.", scenes.len()),
                        Severity::Success,
                    );
                    s.scenes = scenes;
                    Ok(())
                }
                Err(e) => {
                    s.push_log(
                        AgentRole::Director,
                        format!("Failed to plan scenes: {}", e),
                        Severity::Error,
                    );
                    Err(HandlerError::from(e))
                }
            }
        })
    }

    /// Runs the production pipeline over the current scenes.
    ///
    /// Scene failures are logged and reported, never returned as an error.
    pub async fn start_production(&self) -> Result<ProductionReport, HandlerError> {
        self.begin(
            Stage::Production,
            AgentRole::Director,
            "Starting production...".to_string(),
            Severity::Info,
        )?;

        // Scene planning cannot start while the production flag is held, so
        // this copy stays the only writer of the scene list until the end.
        let (mut scenes, characters, style) = {
            let s = self.lock();
            (s.scenes.clone(), s.characters.clone(), s.settings.style_template.clone())
        };

        let pipeline = ProductionPipeline::new(self.stages());
        let mut publisher = StatePublisher { controller: self };
        let report = pipeline
            .run(&mut scenes, &characters, &style, &mut publisher)
            .await;

        self.mutate(|s| {
            s.loading.set(Stage::Production, false);
            let severity = if report.failed() == 0 {
                Severity::Success
            } else {
                Severity::Warning
            };
            s.push_log(
                AgentRole::Director,
                format!(
                    "Production finished: {}/{} scenes complete.",
                    report.completed(),
                    report.outcomes.len()
                ),
                severity,
            );
        });
        Ok(report)
    }

    pub async fn run_viral_check(&self) -> Result<(), HandlerError> {
        self.begin(
            Stage::ViralReview,
            AgentRole::Reviewer,
            "Running blockbuster simulation...".to_string(),
            Severity::Warning,
        )?;

        let (title, scenes) = {
            let s = self.lock();
            (s.settings.topic.clone(), s.scenes.clone())
        };
        let script = Script { title: &title, scenes: &scenes };
        let result = self.stages().review_virality(&script).await;

        self.mutate(|s| {
            s.loading.set(Stage::ViralReview, false);
            match result {
                Ok(analysis) => {
                    s.viral_analysis = Some(analysis);
                    s.push_log(AgentRole::Reviewer, "Analysis complete.", Severity::Success);
                    Ok(())
                }
                Err(e) => {
                    s.push_log(
                        AgentRole::Reviewer,
                        format!("Analysis failed: {}", e),
                        Severity::Error,
                    );
                    Err(HandlerError::from(e))
                }
            }
        })
    }

    // --- Output ---

    pub fn final_document(&self) -> FinalDocument {
        self.lock().final_document()
    }

    pub fn final_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.final_document()).context("Failed to render final document")
    }

    /// Writes the final document to `<output_folder>/script.json`.
    pub fn export(&self) -> Result<PathBuf> {
        let dir = self.config.ensure_output_folder()?;
        let path = dir.join(EXPORT_FILE);
        fs::write(&path, self.final_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Feeds pipeline progress straight into the controller's state.
struct StatePublisher<'a> {
    controller: &'a WizardController,
}

impl ProductionObserver for StatePublisher<'_> {
    fn status(&mut self, message: &str) {
        let message = message.to_string();
        self.controller.mutate(|s| s.production_status = message);
    }

    fn log(&mut self, role: AgentRole, message: String, severity: Severity) {
        self.controller.log(role, message, severity);
    }

    fn scenes_updated(&mut self, scenes: &[Scene]) {
        let scenes = scenes.to_vec();
        self.controller.mutate(|s| s.scenes = scenes);
    }
}
