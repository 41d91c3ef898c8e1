//! Water projection for progress displays.
//!
//! Everything here is derived from `EngineState` on demand; nothing is cached,
//! so the engine stays the single source of timing truth.

use crate::types::{EngineState, Phase, Recipe};

/// Water poured once steps `[0, step_index]` have completed
pub fn cumulative_target(recipe: &Recipe, step_index: usize) -> f32 {
    recipe
        .steps
        .iter()
        .take(step_index.saturating_add(1))
        .map(|step| step.water_ml)
        .sum()
}

/// Water poured before `step_index` began
pub fn step_start_target(recipe: &Recipe, step_index: usize) -> f32 {
    if step_index == 0 {
        0.0
    } else {
        cumulative_target(recipe, step_index - 1)
    }
}

/// Cumulative water "so far" for the given state
pub fn current_amount(state: &EngineState, recipe: &Recipe) -> f32 {
    let index = state.current_step.min(recipe.last_index());

    match state.phase {
        Phase::Idle => step_start_target(recipe, index),
        Phase::AdvancingCountdown | Phase::Overtime | Phase::Finished => {
            cumulative_target(recipe, index)
        }
        // Paused counters are frozen, so re-deriving gives the held amount
        Phase::Running | Phase::Paused => {
            if state.is_step_completed(index) {
                cumulative_target(recipe, index)
            } else {
                interpolate(state, recipe, index)
            }
        }
    }
}

fn interpolate(state: &EngineState, recipe: &Recipe, index: usize) -> f32 {
    let Some(step) = recipe.steps.get(index) else {
        return 0.0;
    };
    let start = step_start_target(recipe, index);
    let target = cumulative_target(recipe, index);
    if step.duration_secs == 0 {
        return target;
    }

    let elapsed = step.duration_secs.saturating_sub(state.remaining_secs);
    let fraction = elapsed as f32 / step.duration_secs as f32;
    (start + step.water_ml * fraction).min(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecipeStep;

    fn pour_over() -> Recipe {
        Recipe::new(
            "V60",
            vec![
                RecipeStep::new("Bloom", 30, 50.0),
                RecipeStep::new("Wait", 15, 0.0),
                RecipeStep::new("Main pour", 60, 200.0),
            ],
        )
    }

    fn running_at(step: usize, remaining_secs: u32) -> EngineState {
        let mut state = EngineState::new(remaining_secs);
        state.phase = Phase::Running;
        state.has_started = true;
        state.current_step = step;
        state.remaining_secs = remaining_secs;
        state
    }

    #[test]
    fn test_cumulative_target_is_inclusive() {
        let recipe = pour_over();
        assert_eq!(cumulative_target(&recipe, 0), 50.0);
        assert_eq!(cumulative_target(&recipe, 1), 50.0);
        assert_eq!(cumulative_target(&recipe, 2), 250.0);
        assert_eq!(step_start_target(&recipe, 0), 0.0);
        assert_eq!(step_start_target(&recipe, 2), 50.0);
    }

    #[test]
    fn test_running_interpolates_within_step() {
        let recipe = pour_over();

        let state = running_at(2, 45);
        let amount = current_amount(&state, &recipe);
        assert!((amount - 100.0).abs() < 1e-3, "amount was {}", amount);

        let state = running_at(0, 30);
        assert_eq!(current_amount(&state, &recipe), 0.0);
    }

    #[test]
    fn test_completed_phases_use_full_target() {
        let recipe = pour_over();

        let mut state = running_at(0, 0);
        state.completed_steps.insert(0);
        state.phase = Phase::AdvancingCountdown;
        assert_eq!(current_amount(&state, &recipe), 50.0);

        state.current_step = 2;
        state.phase = Phase::Overtime;
        assert_eq!(current_amount(&state, &recipe), 250.0);

        state.phase = Phase::Finished;
        assert_eq!(current_amount(&state, &recipe), 250.0);
    }

    #[test]
    fn test_paused_holds_interpolated_amount() {
        let recipe = pour_over();
        let mut state = running_at(2, 30);
        let before = current_amount(&state, &recipe);

        state.phase = Phase::Paused;
        assert_eq!(current_amount(&state, &recipe), before);
    }

    #[test]
    fn test_idle_reports_nothing_poured() {
        let recipe = pour_over();
        let state = EngineState::new(30);
        assert_eq!(current_amount(&state, &recipe), 0.0);
    }
}
