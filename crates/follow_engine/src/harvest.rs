use engine_logging::{engine_debug, engine_warn};
use follow_core::{
    Completeness, Direction, HarvestAttempt, HarvestSettings, Identifier, RelationSet,
    RoundVerdict,
};

use crate::{DriverError, EngineError, EngineEvent, ProgressSink, RelationSource, Throttle};

/// Extracts a complete relation set from an incrementally loaded list.
///
/// Completeness is judged twice: scroll stability ends a pass, and the
/// summary counter decides whether the pass is trusted or retried.
#[derive(Debug, Clone, Default)]
pub struct ListHarvester {
    settings: HarvestSettings,
}

enum PassFailure {
    /// The view could not be opened; the attempt yields nothing.
    Unavailable(DriverError),
    Fatal(EngineError),
}

impl From<DriverError> for PassFailure {
    fn from(err: DriverError) -> Self {
        if err.is_unauthenticated() {
            PassFailure::Fatal(EngineError::session_expired(&err))
        } else {
            PassFailure::Unavailable(err)
        }
    }
}

impl ListHarvester {
    pub fn new(settings: HarvestSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Harvest `handle`'s `direction` list.
    ///
    /// Never fails on a count mismatch: after the retries the largest set
    /// seen is returned. Fails only when no attempt could open the view or
    /// the session is gone.
    pub async fn harvest(
        &self,
        source: &mut dyn RelationSource,
        handle: &Identifier,
        direction: Direction,
        throttle: &mut Throttle,
        sink: &dyn ProgressSink,
    ) -> Result<RelationSet, EngineError> {
        let attempts = self.settings.max_retries + 1;
        let mut best: Option<(RelationSet, Completeness)> = None;

        for attempt in 1..=attempts {
            sink.emit(EngineEvent::HarvestStarted { direction, attempt });

            match self.run_pass(source, handle, direction, throttle, sink).await {
                Ok(pass) => {
                    let completeness = pass.completeness(self.settings.completeness_ratio);
                    let set = pass.into_set();
                    if !completeness.is_incomplete() {
                        sink.emit(EngineEvent::HarvestFinished {
                            direction,
                            collected: set.len(),
                            completeness,
                        });
                        return Ok(set);
                    }
                    if attempt < attempts {
                        sink.emit(EngineEvent::HarvestRetry {
                            direction,
                            attempt,
                            completeness,
                        });
                    }
                    if best.as_ref().is_none_or(|(b, _)| set.len() > b.len()) {
                        best = Some((set, completeness));
                    }
                }
                Err(PassFailure::Unavailable(err)) => {
                    sink.emit(EngineEvent::HarvestAttemptFailed {
                        direction,
                        attempt,
                        reason: err.to_string(),
                    });
                }
                Err(PassFailure::Fatal(err)) => return Err(err),
            }

            if attempt < attempts {
                throttle.pause(self.settings.retry_delay).await;
            }
        }

        match best {
            Some((set, completeness)) => {
                sink.emit(EngineEvent::HarvestFinished {
                    direction,
                    collected: set.len(),
                    completeness,
                });
                Ok(set)
            }
            None => Err(EngineError::ContainerNotFound {
                direction,
                attempts,
            }),
        }
    }

    async fn run_pass(
        &self,
        source: &mut dyn RelationSource,
        handle: &Identifier,
        direction: Direction,
        throttle: &mut Throttle,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestAttempt, PassFailure> {
        source.open(handle, direction).await?;

        // The counter may be hidden once the list takes over the view.
        let expected = source.expected_count().await;
        sink.emit(EngineEvent::HarvestExpected {
            direction,
            expected,
        });
        throttle.pause(self.settings.settle_delay).await;

        let mut attempt = HarvestAttempt::new(expected);
        for round in 1..=self.settings.max_rounds {
            if let Err(err) = source.advance().await {
                if err.is_unauthenticated() {
                    return Err(err.into());
                }
                engine_warn!("{} round {}: advance failed: {}", direction, round, err);
            }
            throttle.pause(self.settings.round_delay).await;

            let content = read_or_default(source.content().await)?;
            if throttle.check(&content, sink).await {
                attempt.skip_round();
                continue;
            }

            let extent = match source.extent().await {
                Ok(extent) => extent,
                Err(err) if err.is_unauthenticated() => return Err(err.into()),
                Err(err) => {
                    engine_warn!("{} round {}: lost the list extent: {}", direction, round, err);
                    break;
                }
            };
            let verdict = attempt.observe(extent, self.settings.stale_threshold);
            absorb(&mut attempt, source).await?;

            sink.emit(EngineEvent::HarvestRound {
                direction,
                round,
                verdict,
                collected: attempt.len(),
            });
            if verdict == RoundVerdict::Converged {
                break;
            }
        }

        absorb(&mut attempt, source).await?;
        Ok(attempt)
    }
}

async fn absorb(
    attempt: &mut HarvestAttempt,
    source: &mut dyn RelationSource,
) -> Result<(), PassFailure> {
    match source.extract().await {
        Ok(handles) => {
            let added = attempt.absorb(Identifier::collect_valid(handles));
            engine_debug!("extracted {} new handles", added);
            Ok(())
        }
        Err(err) if err.is_unauthenticated() => Err(err.into()),
        Err(err) => {
            engine_warn!("extraction failed: {}", err);
            Ok(())
        }
    }
}

fn read_or_default(result: Result<String, DriverError>) -> Result<String, PassFailure> {
    match result {
        Ok(content) => Ok(content),
        Err(err) if err.is_unauthenticated() => Err(err.into()),
        Err(_) => Ok(String::new()),
    }
}
