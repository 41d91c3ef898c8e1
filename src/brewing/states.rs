//! Brewing process engine built on a statig state machine
//! States: Idle, Running, AdvancingCountdown, Overtime, Paused, Finished

use crate::brewing::clock::StepClock;
use crate::brewing::projector;
use crate::system::config::EngineConfig;
use crate::system::events::EngineCommand;
use crate::types::{
    BrewSnapshot, BrewSummary, EngineState, Phase, Recipe, BREW_OUTPUT_CAPACITY,
};
use log::{debug, info, warn};
use statig::prelude::*;
use uuid::Uuid;

// Input events to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrewInput {
    Command(EngineCommand),
    Tick,
}

// Output events from the state machine, for notifications, haptics, audio and history
#[derive(Debug, Clone, PartialEq)]
pub enum BrewOutput {
    BrewingStarted,
    StepStarted { index: usize },
    StepCompleted { index: usize },
    StepSkipped { index: usize },
    AdvanceCountdownStarted { next_index: usize, ticks: u32 },
    OvertimeStarted,
    Paused,
    Resumed,
    BrewingFinished { summary: BrewSummary },
    PhaseChanged { from: Phase, to: Phase },
}

pub type BrewOutputs = heapless::Vec<BrewOutput, BREW_OUTPUT_CAPACITY>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    EmptyRecipe,
    ZeroDurationStep { index: usize },
    InvalidWaterAmount { index: usize },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::EmptyRecipe => write!(f, "recipe has no steps"),
            EngineError::ZeroDurationStep { index } => {
                write!(f, "step {} has a zero duration", index)
            }
            EngineError::InvalidWaterAmount { index } => {
                write!(f, "step {} has a negative or non-finite water amount", index)
            }
        }
    }
}

impl std::error::Error for EngineError {}

// Shared context for the state machine
pub struct BrewContext {
    recipe: Recipe,
    state: EngineState,
    advance_countdown_ticks: u32,
    // Active phase to return to on resume
    resume_to: Phase,
    skipped_steps: usize,
    summary: Option<BrewSummary>,
    outputs: BrewOutputs, // Collect outputs during state transitions
}

impl BrewContext {
    fn emit(&mut self, output: BrewOutput) {
        if let Err(dropped) = self.outputs.push(output) {
            warn!("Output buffer full, dropping {:?}", dropped);
        }
    }

    fn is_final_step(&self) -> bool {
        self.state.current_step >= self.recipe.last_index()
    }

    fn step_duration(&self, index: usize) -> u32 {
        self.recipe
            .steps
            .get(index)
            .map(|step| step.duration_secs)
            .unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct BrewStateMachine;

#[state_machine(
    initial = "State::idle()",
    state(derive(Debug)),
    on_transition = "Self::on_transition"
)]
impl BrewStateMachine {
    /// Constructed but not yet started; the clock is not running
    #[state]
    fn idle(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::Command(EngineCommand::Start) => {
                context.state.has_started = true;
                context.state.current_step = 0;
                context.state.remaining_secs = context.step_duration(0);
                context.emit(BrewOutput::BrewingStarted);
                context.emit(BrewOutput::StepStarted { index: 0 });
                Transition(State::running())
            }
            _ => Handled,
        }
    }

    /// Counting down the current step
    #[state]
    fn running(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::Tick => {
                context.state.active_secs += 1;
                if context.state.remaining_secs > 1 {
                    context.state.remaining_secs -= 1;
                    return Handled;
                }

                context.state.remaining_secs = 0;
                Self::complete_current_step(context);

                if context.is_final_step() {
                    context.state.overtime_secs = 0;
                    context.emit(BrewOutput::OvertimeStarted);
                    Transition(State::overtime())
                } else if context.advance_countdown_ticks == 0 {
                    Self::advance_to_next_step(context);
                    Handled
                } else {
                    let ticks = context.advance_countdown_ticks;
                    context.state.advance_countdown_remaining = ticks;
                    context.emit(BrewOutput::AdvanceCountdownStarted {
                        next_index: context.state.current_step + 1,
                        ticks,
                    });
                    Transition(State::advancing_countdown())
                }
            }
            BrewInput::Command(EngineCommand::Pause) => Self::pause_from(context, Phase::Running),
            BrewInput::Command(EngineCommand::Skip) => {
                if context.is_final_step() {
                    debug!("Skip ignored on the final step");
                    return Handled;
                }

                let index = context.state.current_step;
                Self::complete_current_step(context);
                context.skipped_steps += 1;
                context.emit(BrewOutput::StepSkipped { index });
                Self::advance_to_next_step(context);
                Handled
            }
            BrewInput::Command(EngineCommand::Finish) if context.is_final_step() => {
                Self::finish(context)
            }
            _ => Handled,
        }
    }

    /// Short delay between a step's natural completion and the next step
    #[state]
    fn advancing_countdown(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::Tick => {
                context.state.active_secs += 1;
                context.state.advance_countdown_remaining =
                    context.state.advance_countdown_remaining.saturating_sub(1);

                if context.state.advance_countdown_remaining == 0 {
                    Self::advance_to_next_step(context);
                    Transition(State::running())
                } else {
                    Handled
                }
            }
            BrewInput::Command(EngineCommand::Pause) => {
                Self::pause_from(context, Phase::AdvancingCountdown)
            }
            _ => Handled,
        }
    }

    /// Final step has run out; counts up until the brewer finishes
    #[state]
    fn overtime(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::Tick => {
                context.state.active_secs += 1;
                context.state.overtime_secs = context.state.overtime_secs.saturating_add(1);
                Handled
            }
            BrewInput::Command(EngineCommand::Pause) => Self::pause_from(context, Phase::Overtime),
            BrewInput::Command(EngineCommand::Finish) => Self::finish(context),
            _ => Handled,
        }
    }

    #[state]
    fn paused(context: &mut BrewContext, event: &BrewInput) -> Response<State> {
        use Response::*;

        match event {
            BrewInput::Command(EngineCommand::Resume) => {
                context.emit(BrewOutput::Resumed);
                match context.resume_to {
                    Phase::AdvancingCountdown => Transition(State::advancing_countdown()),
                    Phase::Overtime => Transition(State::overtime()),
                    _ => Transition(State::running()),
                }
            }
            BrewInput::Command(EngineCommand::Finish) if context.is_final_step() => {
                Self::finish(context)
            }
            // Ticks that slip through while paused are dropped
            _ => Handled,
        }
    }

    /// Terminal
    #[state]
    fn finished(event: &BrewInput) -> Response<State> {
        debug!("Ignoring {:?} after finish", event);
        Response::Handled
    }

    fn on_transition(&mut self, source: &State, target: &State) {
        let source_phase = Self::state_to_phase(source);
        let target_phase = Self::state_to_phase(target);

        if source_phase != target_phase {
            info!("🔄 Brew phase transition: {:?} -> {:?}", source_phase, target_phase);
        }
    }

    /// Convert internal State to the public Phase
    fn state_to_phase(state: &State) -> Phase {
        match state {
            State::Idle {} => Phase::Idle,
            State::Running {} => Phase::Running,
            State::AdvancingCountdown {} => Phase::AdvancingCountdown,
            State::Overtime {} => Phase::Overtime,
            State::Paused {} => Phase::Paused,
            State::Finished {} => Phase::Finished,
        }
    }
}

// Step bookkeeping shared by several states
impl BrewStateMachine {
    fn complete_current_step(context: &mut BrewContext) {
        let index = context.state.current_step;
        if context.state.completed_steps.insert(index) {
            info!("✅ Step {} '{}' complete", index, context.recipe.steps[index].name);
        }
        context.emit(BrewOutput::StepCompleted { index });
    }

    fn advance_to_next_step(context: &mut BrewContext) {
        let next = (context.state.current_step + 1).min(context.recipe.last_index());
        context.state.current_step = next;
        context.state.remaining_secs = context.step_duration(next);
        context.state.advance_countdown_remaining = 0;
        info!("➡️ Step {} '{}' started", next, context.recipe.steps[next].name);
        context.emit(BrewOutput::StepStarted { index: next });
    }

    fn pause_from(context: &mut BrewContext, phase: Phase) -> Response<State> {
        context.resume_to = phase;
        context.emit(BrewOutput::Paused);
        Response::Transition(State::paused())
    }

    fn finish(context: &mut BrewContext) -> Response<State> {
        let recipe = &context.recipe;
        let summary = BrewSummary {
            run_id: Uuid::nil(),
            recipe_name: recipe.name.clone(),
            total_secs: recipe.nominal_duration_secs() + context.state.overtime_secs as u64,
            overtime_secs: context.state.overtime_secs,
            active_secs: context.state.active_secs,
            completed_steps: context.state.completed_steps.len(),
            skipped_steps: context.skipped_steps,
            water_ml: projector::cumulative_target(recipe, recipe.last_index()),
        };

        info!(
            "🏁 Brew finished: {}s total, {}s overtime, {:.0}ml",
            summary.total_secs, summary.overtime_secs, summary.water_ml
        );
        context.summary = Some(summary.clone());
        context.emit(BrewOutput::BrewingFinished { summary });
        Response::Transition(State::finished())
    }
}

pub type SubscriptionId = u64;

type SnapshotCallback = Box<dyn FnMut(&BrewSnapshot)>;

// Main interface: owns the machine, its context and the step clock for one run
pub struct BrewEngine {
    machine: statig::prelude::StateMachine<BrewStateMachine>,
    context: BrewContext,
    clock: StepClock,
    run_id: Uuid,
    revision: u64,
    subscribers: Vec<(SubscriptionId, SnapshotCallback)>,
    next_subscription_id: SubscriptionId,
}

impl BrewEngine {
    pub fn new(recipe: Recipe) -> Result<Self, EngineError> {
        Self::with_config(recipe, &EngineConfig::default())
    }

    pub fn with_config(recipe: Recipe, config: &EngineConfig) -> Result<Self, EngineError> {
        Self::validate(&recipe)?;

        let state = EngineState::new(recipe.steps[0].duration_secs);
        let run_id = Uuid::new_v4();
        info!(
            "☕ New brew {} of '{}' ({} steps, {:.0}ml)",
            run_id,
            recipe.name,
            recipe.steps.len(),
            recipe.total_water_ml()
        );

        Ok(Self {
            machine: BrewStateMachine::default().state_machine(),
            context: BrewContext {
                recipe,
                state,
                advance_countdown_ticks: config.advance_countdown_ticks,
                resume_to: Phase::Running,
                skipped_steps: 0,
                summary: None,
                outputs: heapless::Vec::new(),
            },
            clock: StepClock::new(config.tick_interval()),
            run_id,
            revision: 0,
            subscribers: Vec::new(),
            next_subscription_id: 0,
        })
    }

    fn validate(recipe: &Recipe) -> Result<(), EngineError> {
        if recipe.steps.is_empty() {
            return Err(EngineError::EmptyRecipe);
        }

        for (index, step) in recipe.steps.iter().enumerate() {
            if step.duration_secs == 0 {
                return Err(EngineError::ZeroDurationStep { index });
            }
            if !step.water_ml.is_finite() || step.water_ml < 0.0 {
                return Err(EngineError::InvalidWaterAmount { index });
            }
        }

        Ok(())
    }

    /// Process an input event and return output events
    pub fn handle_input(&mut self, input: BrewInput) -> BrewOutputs {
        // Clear previous outputs
        self.context.outputs.clear();

        let previous_state = self.context.state.clone();

        let _ = self.machine.handle_with_context(&input, &mut self.context);

        let phase = self.phase();
        self.context.state.phase = phase;

        // Only emit PhaseChanged if the phase actually changed
        if previous_state.phase != phase {
            self.context.emit(BrewOutput::PhaseChanged {
                from: previous_state.phase,
                to: phase,
            });
        }

        self.sync_clock(phase);

        if self.context.state != previous_state {
            self.revision += 1;
            debug!(
                "Brew r{}: step {} {:?} remaining={}s overtime={}s",
                self.revision,
                self.context.state.current_step,
                phase,
                self.context.state.remaining_secs,
                self.context.state.overtime_secs
            );
            self.notify_subscribers();
        }

        std::mem::take(&mut self.context.outputs)
    }

    pub fn tick(&mut self) -> BrewOutputs {
        self.handle_input(BrewInput::Tick)
    }

    pub fn apply(&mut self, command: EngineCommand) -> BrewOutputs {
        self.handle_input(BrewInput::Command(command))
    }

    pub fn start(&mut self) -> BrewOutputs {
        self.apply(EngineCommand::Start)
    }

    pub fn pause(&mut self) -> BrewOutputs {
        self.apply(EngineCommand::Pause)
    }

    pub fn resume(&mut self) -> BrewOutputs {
        self.apply(EngineCommand::Resume)
    }

    pub fn skip(&mut self) -> BrewOutputs {
        self.apply(EngineCommand::Skip)
    }

    pub fn finish(&mut self) -> BrewOutputs {
        self.apply(EngineCommand::Finish)
    }

    /// Abandon the run: the clock is released and no further ticks arrive
    pub fn cancel(&mut self) {
        info!("🛑 Brew {} cancelled in {:?}", self.run_id, self.phase());
        self.clock.stop();
    }

    /// Register a callback invoked with every new snapshot
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&BrewSnapshot) + 'static,
    {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscription, _)| *subscription != id);
        self.subscribers.len() != before
    }

    pub fn snapshot(&self) -> BrewSnapshot {
        let recipe = &self.context.recipe;
        BrewSnapshot {
            run_id: self.run_id,
            revision: self.revision,
            state: self.context.state.clone(),
            total_steps: recipe.steps.len(),
            water_ml: projector::current_amount(&self.context.state, recipe),
            target_water_ml: recipe.total_water_ml(),
        }
    }

    /// Terminal record, available once the run is finished
    pub fn summary(&self) -> Option<BrewSummary> {
        self.context.summary.clone().map(|summary| BrewSummary {
            run_id: self.run_id,
            ..summary
        })
    }

    pub fn phase(&self) -> Phase {
        BrewStateMachine::state_to_phase(self.machine.state())
    }

    pub fn state(&self) -> &EngineState {
        &self.context.state
    }

    pub fn recipe(&self) -> &Recipe {
        &self.context.recipe
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == Phase::Finished
    }

    pub fn clock(&self) -> &StepClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut StepClock {
        &mut self.clock
    }

    fn sync_clock(&mut self, phase: Phase) {
        if phase.is_active() {
            self.clock.start();
        } else {
            self.clock.stop();
        }
    }

    fn notify_subscribers(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&snapshot);
        }
    }
}
