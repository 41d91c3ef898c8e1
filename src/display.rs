//! Presentation adapters for the brewing screens.
//!
//! Each mode projects the same snapshot differently. Nothing here keeps timing
//! state: a `DisplayState` is rebuilt from scratch for every snapshot.

use crate::system::events::EngineCommand;
use crate::types::{BrewSnapshot, Phase, Recipe};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrewMode {
    /// Steps advance on their own
    Auto,
    /// Brewer moves on with "Next" whenever ready
    Manual,
    /// Every counter on screen
    Expert,
    /// Full-screen timer, controls only while paused
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    Start,
    Pause,
    Resume,
    Next,
    Finish,
}

impl Control {
    pub fn command(&self) -> EngineCommand {
        match self {
            Control::Start => EngineCommand::Start,
            Control::Pause => EngineCommand::Pause,
            Control::Resume => EngineCommand::Resume,
            Control::Next => EngineCommand::Skip,
            Control::Finish => EngineCommand::Finish,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Control::Start => "Start",
            Control::Pause => "Pause",
            Control::Resume => "Resume",
            Control::Next => "Next",
            Control::Finish => "Finish",
        }
    }
}

// UI state for one rendered frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub mode: BrewMode,
    pub headline: String,
    pub step_label: String,
    pub instruction: String,
    pub timer_text: String,
    pub water_text: String,
    pub countdown_text: Option<String>,
    pub detail: Option<String>,
    pub show_controls: bool,
    pub controls: heapless::Vec<Control, 4>,
}

/// Format seconds as `m:ss`
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub fn render(mode: BrewMode, snapshot: &BrewSnapshot, recipe: &Recipe) -> DisplayState {
    let state = &snapshot.state;
    let step = recipe.steps.get(state.current_step);
    let phase = snapshot.phase();

    let headline = match phase {
        Phase::Idle => recipe.name.clone(),
        Phase::Finished => "Enjoy your coffee".to_string(),
        _ => step.map(|s| s.name.clone()).unwrap_or_default(),
    };

    let timer_text = if state.overtime_secs > 0 || phase == Phase::Overtime {
        format!("+{}", format_clock(state.overtime_secs as u64))
    } else {
        format_clock(state.remaining_secs as u64)
    };

    let water_text = if mode == BrewMode::Expert {
        format!("{:.1} / {:.1} ml", snapshot.water_ml, snapshot.target_water_ml)
    } else {
        format!("{:.0} / {:.0} ml", snapshot.water_ml, snapshot.target_water_ml)
    };

    let countdown_text = (phase == Phase::AdvancingCountdown).then(|| {
        let next = recipe
            .steps
            .get(state.current_step + 1)
            .map(|s| s.name.as_str())
            .unwrap_or("next step");
        format!("{} in {}", next, state.advance_countdown_remaining)
    });

    let detail = (mode == BrewMode::Expert).then(|| {
        format!(
            "{:?} | elapsed {} | completed {}/{} | r{}",
            phase,
            format_clock(state.active_secs),
            state.completed_steps.len(),
            snapshot.total_steps,
            snapshot.revision
        )
    });

    let controls = controls_for(mode, snapshot);
    let show_controls = match mode {
        BrewMode::Focus => matches!(phase, Phase::Idle | Phase::Paused | Phase::Overtime),
        _ => !controls.is_empty(),
    };

    DisplayState {
        mode,
        headline,
        step_label: format!(
            "Step {}/{}",
            state.current_step + 1,
            snapshot.total_steps
        ),
        instruction: step.map(|s| s.instruction.clone()).unwrap_or_default(),
        timer_text,
        water_text,
        countdown_text,
        detail,
        show_controls,
        controls,
    }
}

/// Controls whose commands the engine would accept right now
pub fn controls_for(mode: BrewMode, snapshot: &BrewSnapshot) -> heapless::Vec<Control, 4> {
    let mut controls = heapless::Vec::new();
    let final_step = snapshot.is_final_step();

    let wanted: &[Control] = match snapshot.phase() {
        Phase::Idle => &[Control::Start],
        Phase::Running if final_step => &[Control::Pause, Control::Finish],
        Phase::Running => match mode {
            // Auto and focus keep the timed flow; skipping is for manual and expert
            BrewMode::Manual | BrewMode::Expert => &[Control::Pause, Control::Next],
            BrewMode::Auto | BrewMode::Focus => &[Control::Pause],
        },
        Phase::AdvancingCountdown => &[Control::Pause],
        Phase::Overtime => &[Control::Pause, Control::Finish],
        Phase::Paused if final_step => &[Control::Resume, Control::Finish],
        Phase::Paused => &[Control::Resume],
        Phase::Finished => &[],
    };

    for control in wanted {
        let _ = controls.push(*control);
    }
    controls
}
