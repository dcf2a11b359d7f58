use crate::script::{Character, FinalDocument, ProjectSettings, Scene, ViralAnalysis};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Wizard steps, in order.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Setup,
    Strategy,
    Scenes,
    Production,
    ViralCheck,
    Final,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Setup,
        Step::Strategy,
        Step::Scenes,
        Step::Production,
        Step::ViralCheck,
        Step::Final,
    ];

    pub fn next(self) -> Option<Step> {
        let idx = Step::ALL.iter().position(|s| *s == self)?;
        Step::ALL.get(idx + 1).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Setup => "Project Setup",
            Step::Strategy => "Strategic Positioning",
            Step::Scenes => "Scene Architecture",
            Step::Production => "Production & Shot Design",
            Step::ViralCheck => "Viral Factor Verification",
            Step::Final => "Final Output",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// The long-running actions a user can trigger, one loading flag each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Strategy,
    ScenePlanning,
    Production,
    ViralReview,
}

impl Stage {
    /// Stages that may not run at the same time as this one. Scene planning
    /// and production both write the scene list.
    pub fn excludes(self) -> &'static [Stage] {
        match self {
            Stage::ScenePlanning => &[Stage::Production],
            Stage::Production => &[Stage::ScenePlanning],
            Stage::Strategy | Stage::ViralReview => &[],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Strategy => "Strategy",
            Stage::ScenePlanning => "Scene planning",
            Stage::Production => "Production",
            Stage::ViralReview => "Viral review",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Director,
    Screenwriter,
    Cinematographer,
    Strategist,
    #[serde(rename = "Viral Reviewer")]
    Reviewer,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentRole::Director => "Director",
            AgentRole::Screenwriter => "Screenwriter",
            AgentRole::Cinematographer => "Cinematographer",
            AgentRole::Strategist => "Strategist",
            AgentRole::Reviewer => "Viral Reviewer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub role: AgentRole,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    pub strategy: bool,
    pub scenes: bool,
    pub production: bool,
    pub viral: bool,
}

impl LoadingFlags {
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Strategy => self.strategy,
            Stage::ScenePlanning => self.scenes,
            Stage::Production => self.production,
            Stage::ViralReview => self.viral,
        }
    }

    /// The running stage that keeps `stage` from starting, if any.
    pub fn blocker(&self, stage: Stage) -> Option<Stage> {
        std::iter::once(stage)
            .chain(stage.excludes().iter().copied())
            .find(|s| self.get(*s))
    }

    pub fn set(&mut self, stage: Stage, value: bool) {
        let flag = match stage {
            Stage::Strategy => &mut self.strategy,
            Stage::ScenePlanning => &mut self.scenes,
            Stage::Production => &mut self.production,
            Stage::ViralReview => &mut self.viral,
        };
        *flag = value;
    }
}

/// Everything one wizard session holds in memory.
#[derive(Debug, Clone, Default)]
pub struct WizardState {
    pub step: Step,
    pub settings: ProjectSettings,
    pub characters: Vec<Character>,
    pub scenes: Vec<Scene>,
    pub viral_analysis: Option<ViralAnalysis>,
    pub loading: LoadingFlags,
    pub production_status: String,
    logs: Vec<LogEntry>,
    next_log_id: u64,
}

impl WizardState {
    /// Appends to the activity feed and mirrors the entry to the `log` facade.
    pub fn push_log(&mut self, role: AgentRole, message: impl Into<String>, severity: Severity) -> u64 {
        let message = message.into();
        match severity {
            Severity::Error => log::error!("[{}] {}", role, message),
            Severity::Warning => log::warn!("[{}] {}", role, message),
            Severity::Info | Severity::Success => log::info!("[{}] {}", role, message),
        }

        self.next_log_id += 1;
        let id = self.next_log_id;
        self.logs.push(LogEntry {
            id,
            timestamp: Utc::now(),
            role,
            message,
            severity,
        });
        id
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Setup may only be left once there is a topic and a cast.
    pub fn can_leave_setup(&self) -> bool {
        !self.settings.topic.trim().is_empty() && !self.characters.is_empty()
    }

    pub fn production_complete(&self) -> bool {
        !self.scenes.is_empty() && self.scenes.iter().all(Scene::is_production_complete)
    }

    pub fn final_document(&self) -> FinalDocument {
        FinalDocument {
            settings: self.settings.clone(),
            characters: self.characters.clone(),
            scenes: self.scenes.clone(),
            viral_analysis: self.viral_analysis.clone(),
        }
    }
}
