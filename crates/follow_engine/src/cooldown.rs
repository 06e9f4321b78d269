use std::time::Duration;

use follow_core::{CooldownEvent, CooldownSettings, CooldownState, DelayRange, RateSignalMonitor};
use tokio::time::{sleep, Instant};

use crate::{EngineEvent, Humanizer, ProgressSink};

/// Owns the run's cooldown state. `handle` is the only writer.
#[derive(Debug)]
pub struct CooldownController {
    settings: CooldownSettings,
    state: CooldownState,
    humanizer: Humanizer,
    cycles: u64,
}

impl CooldownController {
    pub fn new(settings: CooldownSettings, humanizer: Humanizer) -> Self {
        Self {
            settings,
            state: CooldownState::Normal,
            humanizer,
            cycles: 0,
        }
    }

    pub fn state(&self) -> CooldownState {
        self.state
    }

    /// Completed Detected -> Waiting -> Normal cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Block for a randomized cooldown when `detected`; return immediately otherwise.
    ///
    /// Whatever triggered the detection is stale afterwards and must be
    /// re-issued by the caller.
    pub async fn handle(&mut self, detected: bool, sink: &dyn ProgressSink) {
        if !detected {
            return;
        }
        self.state = self.state.apply(CooldownEvent::Detected);

        let duration = self.humanizer.sample(DelayRange {
            min: self.settings.min,
            max: self.settings.max,
        });
        let until = Instant::now() + duration;
        self.state = self.state.apply(CooldownEvent::Scheduled {
            until: until.into_std(),
        });
        sink.emit(EngineEvent::CooldownEntered { duration });

        let tick = self.settings.tick.max(Duration::from_millis(1));
        loop {
            let now = Instant::now();
            if now >= until {
                break;
            }
            let remaining = until - now;
            sink.emit(EngineEvent::CooldownProgress { remaining });
            sleep(remaining.min(tick)).await;
        }

        self.state = self.state.apply(CooldownEvent::Elapsed {
            now: Instant::now().into_std(),
        });
        self.cycles += 1;
        sink.emit(EngineEvent::CooldownExited);
    }
}

/// Rate-signal scanning, cooldown and humanized pauses shared by the
/// harvester and the executor of one run.
#[derive(Debug)]
pub struct Throttle {
    pub monitor: RateSignalMonitor,
    pub cooldown: CooldownController,
    pub humanizer: Humanizer,
}

impl Throttle {
    pub fn new(
        monitor: RateSignalMonitor,
        settings: CooldownSettings,
        mut humanizer: Humanizer,
    ) -> Self {
        let cooldown = CooldownController::new(settings, humanizer.fork());
        Self {
            monitor,
            cooldown,
            humanizer,
        }
    }

    /// Scan `content`; on a hit, sit out the cooldown. Returns whether it did.
    pub async fn check(&mut self, content: &str, sink: &dyn ProgressSink) -> bool {
        let detected = match self.monitor.matched(content) {
            Some(marker) => {
                sink.emit(EngineEvent::RateSignal {
                    marker: marker.to_string(),
                });
                true
            }
            None => false,
        };
        self.cooldown.handle(detected, sink).await;
        detected
    }

    pub async fn pause(&mut self, range: DelayRange) -> Duration {
        self.humanizer.pause(range).await
    }
}
