use std::sync::Arc;

use engine_logging::{engine_info, engine_warn};
use follow_core::{
    classify, Classification, Identifier, OutcomeLog, PaceKind, PaceSettings, QuotaSettings,
    RunSummary, TargetList, TargetOutcome,
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    DriverError, EngineError, EngineEvent, ProgressSink, QuotaGate, RecordStore, SeverStep,
    TargetDriver, TargetPage, Throttle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub pace: PaceSettings,
    pub quota: QuotaSettings,
    /// Tries per sever interaction step before the target is an error.
    pub sever_attempts: u32,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            pace: PaceSettings::default(),
            quota: QuotaSettings::default(),
            sever_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Interaction {
    Begin,
    Confirm,
}

/// Walks the target list in order, severing each eligible relation under
/// human pacing, the quota gate and the cooldown protocol.
pub struct MutationExecutor {
    settings: ExecutorSettings,
    quota: QuotaGate,
    outcomes: OutcomeLog,
    summary: RunSummary,
    store: Option<Arc<dyn RecordStore>>,
    cancel: CancellationToken,
}

impl MutationExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        Self {
            quota: QuotaGate::new(settings.quota),
            settings,
            outcomes: OutcomeLog::new(),
            summary: RunSummary::default(),
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Journal outcomes to `store` after every target.
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Outcomes of an earlier partial run; settled targets are not revisited.
    pub fn with_prior_outcomes(mut self, prior: OutcomeLog) -> Self {
        self.outcomes = prior;
        self
    }

    /// Stop between targets, or during a pacing or quota wait, once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn outcomes(&self) -> &OutcomeLog {
        &self.outcomes
    }

    /// Counts for the current (or last) run, including a partial one.
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Process `targets` in order.
    ///
    /// Per-target failures become `TargetOutcome::Error`; only a lost
    /// session aborts. Then `summary()` still reports what was done and
    /// counts the target in hand and everything after it as remaining.
    pub async fn run(
        &mut self,
        driver: &mut dyn TargetDriver,
        targets: &TargetList,
        dry_run: bool,
        throttle: &mut Throttle,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, EngineError> {
        self.summary = RunSummary::default();
        let total = targets.len();
        engine_info!("Starting session: {} target(s) queued", total);

        for (index, target) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.interrupt(&targets.as_slice()[index..]);
                break;
            }
            if self.outcomes.is_settled(target) {
                self.summary.resumed += 1;
                continue;
            }
            if !dry_run && !self.quota.wait_for_slot(sink, &self.cancel).await {
                self.interrupt(&targets.as_slice()[index..]);
                break;
            }

            sink.emit(EngineEvent::TargetStarted {
                index: index + 1,
                total,
                target: target.clone(),
            });
            let outcome = match self.process(driver, target, dry_run, throttle, sink).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.interrupt(&targets.as_slice()[index..]);
                    return Err(err);
                }
            };
            self.finish(target, outcome, dry_run, sink);

            let rest = &targets.as_slice()[index + 1..];
            if self.has_unsettled(rest)
                && !self
                    .pace(PaceKind::after(outcome, dry_run), throttle, sink)
                    .await
            {
                self.interrupt(rest);
                break;
            }
        }

        engine_info!(
            "Session complete: mutated {}, private {}, not related {}, errors {}, remaining {}",
            self.summary.mutated,
            self.summary.skipped_private,
            self.summary.skipped_unrelated,
            self.summary.errors,
            self.summary.remaining
        );
        Ok(self.summary)
    }

    async fn process(
        &mut self,
        driver: &mut dyn TargetDriver,
        target: &Identifier,
        dry_run: bool,
        throttle: &mut Throttle,
        sink: &dyn ProgressSink,
    ) -> Result<TargetOutcome, EngineError> {
        let page = match self.visit(driver, target, throttle, sink).await {
            Ok(page) => page,
            Err(err) if err.is_unauthenticated() => return Err(EngineError::session_expired(&err)),
            Err(err) => {
                engine_warn!("  could not load @{}: {}", target, err);
                return Ok(TargetOutcome::Error);
            }
        };

        match classify(&page.profile) {
            Classification::Private => return Ok(TargetOutcome::SkippedPrivate),
            Classification::AlreadyUnrelated => {
                return Ok(TargetOutcome::SkippedAlreadyNotRelated)
            }
            Classification::Eligible => {}
        }
        if dry_run {
            return Ok(TargetOutcome::Mutated);
        }

        let outcome = match self.sever(driver, target, throttle, sink).await {
            Ok(()) => TargetOutcome::Mutated,
            Err(err) if err.is_unauthenticated() => return Err(EngineError::session_expired(&err)),
            Err(err) => {
                engine_warn!("  could not unfollow @{}: {}", target, err);
                TargetOutcome::Error
            }
        };

        // The request already went out; a detection here only pauses.
        let content = driver.current_content().await.unwrap_or_default();
        throttle.check(&content, sink).await;
        Ok(outcome)
    }

    /// Load the target; if the page is a rate-limit page, cool down and load it once more.
    async fn visit(
        &self,
        driver: &mut dyn TargetDriver,
        target: &Identifier,
        throttle: &mut Throttle,
        sink: &dyn ProgressSink,
    ) -> Result<TargetPage, DriverError> {
        driver.visit(target).await?;
        throttle.pause(self.settings.pace.visit_settle).await;
        let page = driver.inspect(target).await?;
        if !throttle.check(&page.content, sink).await {
            return Ok(page);
        }

        driver.visit(target).await?;
        throttle.pause(self.settings.pace.visit_settle).await;
        driver.inspect(target).await
    }

    async fn sever(
        &self,
        driver: &mut dyn TargetDriver,
        target: &Identifier,
        throttle: &mut Throttle,
        sink: &dyn ProgressSink,
    ) -> Result<(), DriverError> {
        let step = self
            .interact(driver, target, Interaction::Begin, throttle, sink)
            .await?;
        if step == SeverStep::NeedsConfirmation {
            throttle.pause(self.settings.pace.confirm_step).await;
            self.interact(driver, target, Interaction::Confirm, throttle, sink)
                .await?;
        }
        Ok(())
    }

    /// One interaction step with bounded retries of the step itself.
    async fn interact(
        &self,
        driver: &mut dyn TargetDriver,
        target: &Identifier,
        interaction: Interaction,
        throttle: &mut Throttle,
        sink: &dyn ProgressSink,
    ) -> Result<SeverStep, DriverError> {
        let attempts = self.settings.sever_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = match interaction {
                Interaction::Begin => driver.begin_sever(target).await,
                Interaction::Confirm => driver.confirm_sever(target).await.map(|()| SeverStep::Done),
            };
            match result {
                Ok(step) => return Ok(step),
                Err(err) if err.is_unauthenticated() || attempt >= attempts => return Err(err),
                Err(err) => {
                    sink.emit(EngineEvent::InteractionRetry {
                        target: target.clone(),
                        attempt,
                        reason: err.to_string(),
                    });
                    attempt += 1;
                    throttle.pause(self.settings.pace.confirm_step).await;
                }
            }
        }
    }

    fn finish(
        &mut self,
        target: &Identifier,
        outcome: TargetOutcome,
        dry_run: bool,
        sink: &dyn ProgressSink,
    ) {
        self.outcomes.record(target.clone(), outcome);
        self.summary.record(outcome);
        if let Some(store) = &self.store {
            if let Err(err) = store.save_outcomes(&self.outcomes) {
                engine_warn!("Failed to journal outcome for @{}: {}", target, err);
            }
        }
        sink.emit(EngineEvent::TargetFinished {
            target: target.clone(),
            outcome,
            dry_run,
        });
    }

    /// Returns `false` when cancelled mid-pause.
    async fn pace(&self, kind: PaceKind, throttle: &mut Throttle, sink: &dyn ProgressSink) -> bool {
        let delay = throttle.humanizer.sample(self.settings.pace.range_for(kind));
        sink.emit(EngineEvent::Pacing { kind, delay });
        tokio::select! {
            _ = sleep(delay) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    fn has_unsettled(&self, rest: &[Identifier]) -> bool {
        rest.iter().any(|id| !self.outcomes.is_settled(id))
    }

    /// Mark the run as cut short with `rest` not reached.
    fn interrupt(&mut self, rest: &[Identifier]) {
        self.summary.interrupted = true;
        self.summary.remaining = rest
            .iter()
            .filter(|id| !self.outcomes.is_settled(id))
            .count();
        engine_warn!(
            "Interrupted; {} target(s) left unprocessed",
            self.summary.remaining
        );
    }
}
