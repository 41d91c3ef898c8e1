//! Async run loop: serializes clock ticks and renderer commands for one brew

use crate::brewing::states::{BrewEngine, BrewOutput};
use crate::system::events::{CommandChannel, EngineCommand, SessionBus};
use crate::types::BrewSummary;
use embassy_futures::select::{select, Either};
use log::{debug, info};

/// Drive `engine` until it finishes (`Some(summary)`) or is cancelled (`None`).
///
/// Every tick and command is fully processed before the next one is taken, and
/// each resulting output and snapshot is published on `bus`.
pub async fn run_brew(
    engine: &mut BrewEngine,
    commands: &CommandChannel,
    bus: &SessionBus,
) -> Option<BrewSummary> {
    info!("Starting brew session {}", engine.run_id());
    bus.publish_snapshot(engine.snapshot());

    if engine.is_finished() {
        return engine.summary();
    }

    loop {
        let event = select(engine.clock_mut().next_tick(), commands.receive()).await;

        let revision = engine.revision();
        let outputs = match event {
            Either::First(()) => engine.tick(),
            Either::Second(EngineCommand::Cancel) => {
                engine.cancel();
                return None;
            }
            Either::Second(command) => {
                debug!("Session command: {:?}", command);
                engine.apply(command)
            }
        };

        for output in outputs {
            log_output(&output);
            bus.publish_output(output);
        }

        if engine.revision() != revision {
            bus.publish_snapshot(engine.snapshot());
        }

        if let Some(summary) = engine.summary() {
            info!("Brew session {} complete", engine.run_id());
            return Some(summary);
        }
    }
}

fn log_output(output: &BrewOutput) {
    match output {
        BrewOutput::StepCompleted { index } => info!("🔔 Step {} complete", index),
        BrewOutput::AdvanceCountdownStarted { next_index, ticks } => {
            info!("⏭️ Step {} starts in {} ticks", next_index, ticks)
        }
        BrewOutput::OvertimeStarted => info!("⏰ Final step over, counting overtime"),
        other => debug!("Output: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::config::EngineConfig;
    use crate::system::events::SessionEvent;
    use crate::types::{Phase, Recipe, RecipeStep};
    use embassy_futures::{block_on, join::join};
    use embassy_sync::channel::Channel;
    use embassy_time::Timer;

    fn fast_engine(steps: &[(u32, f32)]) -> BrewEngine {
        let recipe = Recipe::new(
            "Session test",
            steps
                .iter()
                .map(|&(secs, water)| RecipeStep::new("Pour", secs, water))
                .collect(),
        );
        let config = EngineConfig {
            tick_interval_ms: 5,
            advance_countdown_ticks: 1,
        };
        BrewEngine::with_config(recipe, &config).unwrap()
    }

    #[test]
    fn test_session_runs_to_finish() {
        let mut engine = fast_engine(&[(2, 40.0), (2, 60.0)]);
        let commands: CommandChannel = Channel::new();
        let bus = SessionBus::new();
        let mut events = bus.subscriber().unwrap();

        // Host side: start, wait for a couple of overtime ticks, then finish
        let host = async {
            commands.send(EngineCommand::Start).await;
            let mut saw_overtime = false;
            loop {
                match events.next_event().await {
                    SessionEvent::Output(BrewOutput::OvertimeStarted) => saw_overtime = true,
                    SessionEvent::Snapshot(snapshot) if snapshot.state.overtime_secs >= 2 => break,
                    _ => {}
                }
            }
            commands.send(EngineCommand::Finish).await;
            saw_overtime
        };

        let (summary, saw_overtime) = block_on(join(run_brew(&mut engine, &commands, &bus), host));

        let summary = summary.unwrap();
        assert!(saw_overtime);
        assert_eq!(engine.phase(), Phase::Finished);
        assert!(!engine.clock().is_running());
        assert_eq!(summary.completed_steps, 2);
        assert_eq!(summary.water_ml, 100.0);
        assert!(summary.overtime_secs >= 2);
        assert_eq!(summary.total_secs, 4 + summary.overtime_secs as u64);
    }

    #[test]
    fn test_cancel_releases_clock() {
        let mut engine = fast_engine(&[(100, 40.0)]);
        let commands: CommandChannel = Channel::new();
        let bus = SessionBus::new();

        let (summary, ()) = block_on(join(run_brew(&mut engine, &commands, &bus), async {
            commands.send(EngineCommand::Start).await;
            Timer::after_millis(30).await;
            commands.send(EngineCommand::Cancel).await;
        }));

        assert!(summary.is_none());
        assert_eq!(engine.phase(), Phase::Running);
        assert!(!engine.clock().is_running());
        assert!(engine.state().remaining_secs < 100);
    }

    #[test]
    fn test_paused_session_does_not_advance() {
        let mut engine = fast_engine(&[(100, 40.0)]);
        let commands: CommandChannel = Channel::new();
        let bus = SessionBus::new();
        let mut snapshots = bus.snapshot_subscriber().unwrap();

        let (summary, ()) = block_on(join(run_brew(&mut engine, &commands, &bus), async {
            commands.send(EngineCommand::Start).await;
            commands.send(EngineCommand::Pause).await;
            Timer::after_millis(50).await;
            commands.send(EngineCommand::Cancel).await;
        }));

        assert!(summary.is_none());
        assert_eq!(engine.phase(), Phase::Paused);
        assert_eq!(engine.state().remaining_secs, 100);

        // Initial snapshot, start, pause
        let mut count = 0;
        while snapshots.try_next_event().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
