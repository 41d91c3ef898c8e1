//! Command channel and session bus for a running brew
//! Clean, type-safe interface hiding embassy-sync complexity

use crate::brewing::states::BrewOutput;
use crate::types::BrewSnapshot;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::Channel,
    pubsub::{PubSubChannel, Subscriber, WaitResult},
};

/// Commands renderers send into the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start,
    Pause,
    Resume,
    Skip,
    Finish,
    /// Abandon the run (renderer unmounted or navigated away)
    Cancel,
}

pub type CommandChannel = Channel<CriticalSectionRawMutex, EngineCommand, 8>;

/// Everything a session publishes
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Snapshot(BrewSnapshot),
    Output(BrewOutput),
}

const BUS_CAPACITY: usize = 32;
const BUS_SUBSCRIBERS: usize = 4;
const BUS_PUBLISHERS: usize = 1;

type BusChannel =
    PubSubChannel<CriticalSectionRawMutex, SessionEvent, BUS_CAPACITY, BUS_SUBSCRIBERS, BUS_PUBLISHERS>;
type BusSubscriber<'a> =
    Subscriber<'a, CriticalSectionRawMutex, SessionEvent, BUS_CAPACITY, BUS_SUBSCRIBERS, BUS_PUBLISHERS>;

/// Fan-out of session events to any number of renderers
pub struct SessionBus {
    channel: BusChannel,
}

impl SessionBus {
    pub fn new() -> Self {
        Self {
            channel: PubSubChannel::new(),
        }
    }

    /// Never waits: a subscriber that falls behind skips ahead instead of stalling the engine
    pub fn publish(&self, event: SessionEvent) {
        self.channel.immediate_publisher().publish_immediate(event);
    }

    pub fn publish_snapshot(&self, snapshot: BrewSnapshot) {
        self.publish(SessionEvent::Snapshot(snapshot));
    }

    pub fn publish_output(&self, output: BrewOutput) {
        self.publish(SessionEvent::Output(output));
    }

    /// None once every subscriber slot is taken
    pub fn subscriber(&self) -> Option<SessionSubscriber<'_>> {
        self.filtered_subscriber(accept_all as fn(&SessionEvent) -> bool)
    }

    pub fn filtered_subscriber<F>(&self, filter: F) -> Option<SessionSubscriber<'_, F>>
    where
        F: Fn(&SessionEvent) -> bool,
    {
        match self.channel.subscriber() {
            Ok(inner) => Some(SessionSubscriber { inner, filter }),
            Err(_) => {
                log::warn!("Session bus has no free subscriber slots");
                None
            }
        }
    }

    /// Convenience method: subscribe only to snapshots
    pub fn snapshot_subscriber(&self) -> Option<SessionSubscriber<'_, impl Fn(&SessionEvent) -> bool>> {
        self.filtered_subscriber(|event: &SessionEvent| matches!(event, SessionEvent::Snapshot(_)))
    }

    /// Convenience method: subscribe only to lifecycle outputs (effects, history)
    pub fn output_subscriber(&self) -> Option<SessionSubscriber<'_, impl Fn(&SessionEvent) -> bool>> {
        self.filtered_subscriber(|event: &SessionEvent| matches!(event, SessionEvent::Output(_)))
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}

fn accept_all(_: &SessionEvent) -> bool {
    true
}

/// Subscriber that only receives events matching its filter
pub struct SessionSubscriber<'a, F = fn(&SessionEvent) -> bool>
where
    F: Fn(&SessionEvent) -> bool,
{
    inner: BusSubscriber<'a>,
    filter: F,
}

impl<'a, F> SessionSubscriber<'a, F>
where
    F: Fn(&SessionEvent) -> bool,
{
    /// Wait for next event matching the filter
    pub async fn next_event(&mut self) -> SessionEvent {
        loop {
            let event = match self.inner.next_message().await {
                WaitResult::Lagged(count) => {
                    log::debug!("Session subscriber lagged by {} events", count);
                    continue;
                }
                WaitResult::Message(event) => event,
            };
            if (self.filter)(&event) {
                return event;
            }
        }
    }

    /// Try to get next matching event without blocking
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let event = match self.inner.try_next_message()? {
                WaitResult::Lagged(_) => continue,
                WaitResult::Message(event) => event,
            };
            if (self.filter)(&event) {
                return Some(event);
            }
        }
    }
}
