//! Step clock: one tick per interval while a brew is active.

use embassy_time::{Duration, Ticker};
use log::debug;

pub struct StepClock {
    interval: Duration,
    running: bool,
    ticker: Option<Ticker>,
    ticks: u64,
}

impl StepClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: false,
            ticker: None,
            ticks: 0,
        }
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        debug!("⏱️ Step clock started ({}ms interval)", self.interval.as_millis());
        self.running = true;
    }

    /// Drops the ticker, so no tick can be delivered until `start` is called again
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        debug!("⏱️ Step clock stopped after {} ticks", self.ticks);
        self.running = false;
        self.ticker = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next tick. Never resolves while the clock is stopped.
    pub async fn next_tick(&mut self) {
        if !self.running {
            core::future::pending::<()>().await;
        }

        let interval = self.interval;
        let ticker = self.ticker.get_or_insert_with(|| Ticker::every(interval));
        ticker.next().await;
        self.ticks += 1;
    }
}
