//! Scripted host: starts a brew, renders every snapshot, finishes a little into overtime

use crate::brewing::states::{BrewEngine, BrewOutput};
use crate::display::{render, BrewMode};
use crate::system::events::{CommandChannel, EngineCommand, SessionBus, SessionEvent};
use crate::system::session::run_brew;
use crate::types::{BrewSummary, Phase};
use embassy_futures::join::join;
use embassy_sync::channel::Channel;
use log::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ScriptedHost {
    pub mode: BrewMode,
    /// Overtime the final step may run before the host sends Finish
    pub finish_after_overtime_secs: u32,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self {
            mode: BrewMode::Focus,
            finish_after_overtime_secs: 3,
        }
    }
}

impl ScriptedHost {
    /// Run one brew to completion. `None` if the session ended without a summary.
    pub async fn run(&self, engine: &mut BrewEngine) -> Option<BrewSummary> {
        let recipe = engine.recipe().clone();
        let commands: CommandChannel = Channel::new();
        let bus = SessionBus::new();
        let Some(mut events) = bus.subscriber() else {
            warn!("No free session bus slot for the host");
            return None;
        };

        let script = async {
            commands.send(EngineCommand::Start).await;
            let mut finish_sent = false;

            loop {
                let event = events.next_event().await;
                if let SessionEvent::Snapshot(snapshot) = &event {
                    let frame = render(self.mode, snapshot, &recipe);
                    info!(
                        "{} | {} | {}{}",
                        frame.headline,
                        frame.timer_text,
                        frame.water_text,
                        frame
                            .countdown_text
                            .map(|text| format!(" | {}", text))
                            .unwrap_or_default()
                    );

                    if !finish_sent
                        && snapshot.state.overtime_secs >= self.finish_after_overtime_secs
                    {
                        commands.send(EngineCommand::Finish).await;
                        finish_sent = true;
                    }
                }
                if ends_brew(&event) {
                    break;
                }
            }
        };

        let (summary, ()) = join(run_brew(engine, &commands, &bus), script).await;
        summary
    }
}

/// Either signal is enough: a lagging subscriber may have lost the other one
pub fn ends_brew(event: &SessionEvent) -> bool {
    match event {
        SessionEvent::Output(BrewOutput::BrewingFinished { .. }) => true,
        SessionEvent::Snapshot(snapshot) => snapshot.phase() == Phase::Finished,
        SessionEvent::Output(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::config::EngineConfig;
    use crate::types::{Recipe, RecipeStep};
    use embassy_futures::block_on;

    fn fast_engine() -> BrewEngine {
        let recipe = Recipe::new(
            "Host test",
            vec![
                RecipeStep::new("Bloom", 2, 40.0),
                RecipeStep::new("Pour", 3, 160.0),
            ],
        );
        let config = EngineConfig {
            tick_interval_ms: 5,
            advance_countdown_ticks: 1,
        };
        BrewEngine::with_config(recipe, &config).unwrap()
    }

    #[test]
    fn test_scripted_host_reaches_summary() {
        let mut engine = fast_engine();
        let host = ScriptedHost {
            finish_after_overtime_secs: 2,
            ..ScriptedHost::default()
        };

        let summary = block_on(host.run(&mut engine)).unwrap();

        assert_eq!(engine.phase(), Phase::Finished);
        assert!(!engine.clock().is_running());
        assert_eq!(summary.recipe_name, "Host test");
        assert_eq!(summary.completed_steps, 2);
        assert_eq!(summary.water_ml, 200.0);
        assert!(summary.overtime_secs >= 2);
        assert!(serde_json::to_string_pretty(&summary).is_ok());
    }

    #[test]
    fn test_finished_snapshot_ends_brew() {
        let mut engine = fast_engine();
        engine.start();
        assert!(!ends_brew(&SessionEvent::Snapshot(engine.snapshot())));
        assert!(!ends_brew(&SessionEvent::Output(BrewOutput::OvertimeStarted)));

        for _ in 0..2 + 1 + 3 {
            engine.tick();
        }
        engine.finish();

        // Without the BrewingFinished output, the snapshot alone stops the host
        assert!(ends_brew(&SessionEvent::Snapshot(engine.snapshot())));
        let summary = engine.summary().unwrap();
        assert!(ends_brew(&SessionEvent::Output(BrewOutput::BrewingFinished {
            summary
        })));
    }
}
