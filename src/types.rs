use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    AdvancingCountdown,
    Overtime,
    Finished,
}

impl Phase {
    /// Phases during which the step clock is ticking
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Phase::Running | Phase::AdvancingCountdown | Phase::Overtime
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Running => "Running",
            Phase::Paused => "Paused",
            Phase::AdvancingCountdown => "Next step",
            Phase::Overtime => "Overtime",
            Phase::Finished => "Finished",
        }
    }
}

/// One timed phase of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub name: String,
    pub duration_secs: u32,
    /// Water poured during this step, 0 for steps that only wait
    #[serde(default)]
    pub water_ml: f32,
    #[serde(default)]
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub steps: Vec<RecipeStep>,
}

impl Recipe {
    pub fn new(name: impl Into<String>, steps: Vec<RecipeStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn total_water_ml(&self) -> f32 {
        self.steps.iter().map(|step| step.water_ml).sum()
    }

    pub fn nominal_duration_secs(&self) -> u64 {
        self.steps.iter().map(|step| step.duration_secs as u64).sum()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

impl RecipeStep {
    pub fn new(name: impl Into<String>, duration_secs: u32, water_ml: f32) -> Self {
        Self {
            name: name.into(),
            duration_secs,
            water_ml,
            instruction: String::new(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

/// Timing truth for a single brewing run. Only the engine mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub current_step: usize,
    pub remaining_secs: u32,
    /// Counts up once the final step's countdown has run out
    pub overtime_secs: u32,
    pub phase: Phase,
    pub completed_steps: BTreeSet<usize>,
    /// Only meaningful while `phase == AdvancingCountdown`
    pub advance_countdown_remaining: u32,
    pub has_started: bool,
    /// Ticks processed while the clock was running
    pub active_secs: u64,
}

impl EngineState {
    pub fn new(first_step_secs: u32) -> Self {
        Self {
            current_step: 0,
            remaining_secs: first_step_secs,
            overtime_secs: 0,
            phase: Phase::Idle,
            completed_steps: BTreeSet::new(),
            advance_countdown_remaining: 0,
            has_started: false,
            active_secs: 0,
        }
    }

    pub fn is_step_completed(&self, index: usize) -> bool {
        self.completed_steps.contains(&index)
    }
}

/// Immutable copy of the engine state handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrewSnapshot {
    pub run_id: Uuid,
    pub revision: u64,
    pub state: EngineState,
    pub total_steps: usize,
    pub water_ml: f32,
    pub target_water_ml: f32,
}

impl BrewSnapshot {
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_final_step(&self) -> bool {
        self.state.current_step + 1 >= self.total_steps
    }
}

/// Terminal record of a finished run, handed to the history collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrewSummary {
    pub run_id: Uuid,
    pub recipe_name: String,
    /// Nominal durations summed plus overtime
    pub total_secs: u64,
    pub overtime_secs: u32,
    pub active_secs: u64,
    pub completed_steps: usize,
    pub skipped_steps: usize,
    pub water_ml: f32,
}

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const ADVANCE_COUNTDOWN_TICKS: u32 = 3;
pub const BREW_OUTPUT_CAPACITY: usize = 8;
