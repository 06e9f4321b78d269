use std::sync::mpsc;

use engine_logging::{engine_debug, engine_info, engine_warn};
use follow_core::{Completeness, PaceKind, RoundVerdict};

use crate::EngineEvent;

/// Observability channel injected into every engine component.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Forwards each event to every inner sink, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ProgressSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ProgressSink for FanoutSink {
    fn emit(&self, event: EngineEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

/// Renders events through the `engine_*` logging macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::RateSignal { marker } => {
                engine_warn!("Rate-limit marker detected: {:?}", marker);
            }
            EngineEvent::CooldownEntered { duration } => {
                engine_warn!(
                    "Rate limit detected; pausing for {:.1} minutes",
                    duration.as_secs_f64() / 60.0
                );
            }
            EngineEvent::CooldownProgress { remaining } => {
                engine_info!("Resuming in ~{} minute(s)", remaining.as_secs().div_ceil(60));
            }
            EngineEvent::CooldownExited => engine_info!("Cooldown over; resuming"),
            EngineEvent::QuotaWait {
                wait,
                admitted_in_window,
            } => {
                engine_info!(
                    "Hourly cap reached after {} action(s); waiting {} min",
                    admitted_in_window,
                    wait.as_secs().div_ceil(60)
                );
            }
            EngineEvent::QuotaProgress { remaining } => {
                engine_info!(
                    "{} min remaining before the quota window rolls",
                    remaining.as_secs().div_ceil(60)
                );
            }
            EngineEvent::HarvestStarted { direction, attempt } => {
                engine_info!("Harvesting {} (attempt {})", direction, attempt);
            }
            EngineEvent::HarvestExpected {
                direction,
                expected,
            } => match expected {
                Some(count) => engine_info!("Expected {} count: {}", direction, count),
                None => engine_warn!("Could not read the expected {} count", direction),
            },
            EngineEvent::HarvestRound {
                direction,
                round,
                verdict,
                collected,
            } => match verdict {
                RoundVerdict::Converged => engine_info!(
                    "{} list stable after {} rounds ({} collected)",
                    direction,
                    round,
                    collected
                ),
                _ => engine_debug!(
                    "{} round {}: {:?}, {} collected",
                    direction,
                    round,
                    verdict,
                    collected
                ),
            },
            EngineEvent::HarvestAttemptFailed {
                direction,
                attempt,
                reason,
            } => {
                engine_warn!("{} attempt {} failed: {}", direction, attempt, reason);
            }
            EngineEvent::HarvestRetry {
                direction,
                attempt,
                completeness,
            } => {
                engine_warn!(
                    "{} attempt {} incomplete ({}); retrying",
                    direction,
                    attempt,
                    describe(completeness)
                );
            }
            EngineEvent::HarvestFinished {
                direction,
                collected,
                completeness,
            } => {
                if completeness.is_incomplete() {
                    engine_warn!(
                        "Using best {} result: {} accounts ({})",
                        direction,
                        collected,
                        describe(completeness)
                    );
                } else {
                    engine_info!(
                        "Harvested {} {} accounts ({})",
                        collected,
                        direction,
                        describe(completeness)
                    );
                }
            }
            EngineEvent::TargetStarted {
                index,
                total,
                target,
            } => engine_info!("[{}/{}] Processing @{}", index, total, target),
            EngineEvent::TargetFinished {
                target,
                outcome,
                dry_run,
            } => {
                if dry_run {
                    engine_info!("  [dry run] @{}: {}", target, outcome);
                } else {
                    engine_info!("  @{}: {}", target, outcome);
                }
            }
            EngineEvent::InteractionRetry {
                target,
                attempt,
                reason,
            } => {
                engine_warn!("  @{} interaction attempt {} failed: {}", target, attempt, reason);
            }
            EngineEvent::Pacing {
                kind: PaceKind::Brief,
                delay,
            } => engine_debug!("Brief pause: {:.1}s", delay.as_secs_f64()),
            EngineEvent::Pacing { kind, delay } => {
                engine_info!("Pacing {:?}: waiting {:.0}s", kind, delay.as_secs_f64());
            }
        }
    }
}

fn describe(completeness: Completeness) -> String {
    match completeness {
        Completeness::Verified { scraped, expected } => format!("{scraped}/{expected} verified"),
        Completeness::Incomplete { scraped, expected } => {
            format!("{scraped}/{expected} below threshold")
        }
        Completeness::Unverified { scraped } => format!("{scraped}, no counter"),
    }
}
