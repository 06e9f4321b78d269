use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use follow_core::{
    resolve, CooldownSettings, DelayRange, Identifier, OutcomeLog, PaceKind, PaceSettings,
    QuotaSettings, RateSignalMonitor, RunSummary, TargetList, TargetOutcome, TargetProfile,
};
use follow_engine::{
    DriverError, EngineError, EngineEvent, ExecutorSettings, FailureKind, FileStore, Humanizer,
    MutationExecutor, ProgressSink, RecordStore, SeverStep, StorePaths, TargetDriver, TargetPage,
    Throttle,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
    cancel_after: Option<(Identifier, CancellationToken)>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        if let (EngineEvent::TargetFinished { target, .. }, Some((stop_at, token))) =
            (&event, &self.cancel_after)
        {
            if target == stop_at {
                token.cancel();
            }
        }
        self.events.lock().unwrap().push(event);
    }
}

const ELIGIBLE: TargetProfile = TargetProfile {
    private: Some(false),
    related: Some(true),
};

#[derive(Default)]
struct ScriptedDriver {
    profiles: HashMap<String, TargetProfile>,
    /// Visits per target that still show a rate-limit page.
    throttled_visits: HashMap<String, u32>,
    failing_begins: HashMap<String, u32>,
    needs_confirmation: bool,
    logged_out_at: Option<String>,
    after_sever: String,
    calls: Vec<String>,
    content: String,
}

impl ScriptedDriver {
    fn calls_for(&self, prefix: &str) -> Vec<String> {
        self.calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl TargetDriver for ScriptedDriver {
    async fn visit(&mut self, target: &Identifier) -> Result<(), DriverError> {
        self.calls.push(format!("visit:{target}"));
        if self.logged_out_at.as_deref() == Some(target.as_str()) {
            return Err(DriverError::new(FailureKind::Unauthenticated, "redirected to login"));
        }
        self.content = match self.throttled_visits.get_mut(target.as_str()) {
            Some(left) if *left > 0 => {
                *left -= 1;
                "Action Blocked. Try again later.".to_string()
            }
            _ => format!("profile of {target}"),
        };
        Ok(())
    }

    async fn inspect(&mut self, target: &Identifier) -> Result<TargetPage, DriverError> {
        self.calls.push(format!("inspect:{target}"));
        Ok(TargetPage {
            content: self.content.clone(),
            profile: self
                .profiles
                .get(target.as_str())
                .copied()
                .unwrap_or(ELIGIBLE),
        })
    }

    async fn begin_sever(&mut self, target: &Identifier) -> Result<SeverStep, DriverError> {
        self.calls.push(format!("begin:{target}"));
        if let Some(left) = self.failing_begins.get_mut(target.as_str()) {
            if *left > 0 {
                *left -= 1;
                return Err(DriverError::new(FailureKind::InteractionFailed, "button not found"));
            }
        }
        self.content = self.after_sever.clone();
        if self.needs_confirmation {
            Ok(SeverStep::NeedsConfirmation)
        } else {
            Ok(SeverStep::Done)
        }
    }

    async fn confirm_sever(&mut self, target: &Identifier) -> Result<(), DriverError> {
        self.calls.push(format!("confirm:{target}"));
        Ok(())
    }

    async fn current_content(&mut self) -> Result<String, DriverError> {
        Ok(self.content.clone())
    }
}

fn ids(handles: &[&str]) -> TargetList {
    TargetList::from_identifiers(handles.iter().map(|h| Identifier::parse(h).unwrap()))
}

fn id(handle: &str) -> Identifier {
    Identifier::parse(handle).unwrap()
}

fn throttle() -> Throttle {
    engine_logging::initialize_for_tests();
    Throttle::new(
        RateSignalMonitor::default(),
        CooldownSettings::default(),
        Humanizer::seeded(11),
    )
}

fn pacing(events: &[EngineEvent]) -> Vec<(PaceKind, Duration)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Pacing { kind, delay } => Some((*kind, *delay)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn dry_run_counts_eligible_targets_without_interacting() {
    let following = Identifier::collect_valid(["a", "b", "c", "d"]);
    let whitelist = Identifier::collect_valid(["b"]);
    let targets = resolve(&following, &whitelist, None);
    assert_eq!(targets, ids(&["a", "c", "d"]));

    // A zero cap would block forever if dry runs were billed.
    let settings = ExecutorSettings {
        quota: QuotaSettings {
            cap: 0,
            ..QuotaSettings::default()
        },
        ..ExecutorSettings::default()
    };
    let mut driver = ScriptedDriver::default();
    let mut executor = MutationExecutor::new(settings);

    let summary = executor
        .run(&mut driver, &targets, true, &mut throttle(), &TestSink::default())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            mutated: 3,
            ..RunSummary::default()
        }
    );
    assert!(driver.calls_for("begin:").is_empty());
    assert!(driver.calls_for("confirm:").is_empty());
}

#[tokio::test(start_paused = true)]
async fn private_target_is_skipped_with_a_brief_pause() {
    let mut driver = ScriptedDriver::default();
    driver.profiles.insert(
        "e".into(),
        TargetProfile {
            private: Some(true),
            related: Some(true),
        },
    );
    let sink = TestSink::default();
    let mut executor = MutationExecutor::new(ExecutorSettings::default());

    let summary = executor
        .run(&mut driver, &ids(&["e", "f"]), false, &mut throttle(), &sink)
        .await
        .unwrap();

    assert_eq!(summary.skipped_private, 1);
    assert_eq!(summary.mutated, 1);
    assert_eq!(driver.calls_for("begin:"), vec!["begin:f".to_string()]);
    assert_eq!(executor.outcomes().get(&id("e")), Some(TargetOutcome::SkippedPrivate));

    let paces = pacing(&sink.take());
    assert_eq!(paces.len(), 1, "no pause after the last target");
    let (kind, delay) = paces[0];
    assert_eq!(kind, PaceKind::Brief);
    assert!(delay < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn already_unfollowed_target_is_not_touched() {
    let mut driver = ScriptedDriver::default();
    driver.profiles.insert(
        "g".into(),
        TargetProfile {
            private: Some(false),
            related: Some(false),
        },
    );
    let mut executor = MutationExecutor::new(ExecutorSettings::default());

    let summary = executor
        .run(&mut driver, &ids(&["g"]), false, &mut throttle(), &TestSink::default())
        .await
        .unwrap();

    assert_eq!(summary.skipped_unrelated, 1);
    assert!(driver.calls_for("begin:").is_empty());
}

#[tokio::test(start_paused = true)]
async fn mutation_paces_for_minutes_and_confirms_two_step_dialogs() {
    let mut driver = ScriptedDriver {
        needs_confirmation: true,
        ..ScriptedDriver::default()
    };
    let sink = TestSink::default();
    let mut executor = MutationExecutor::new(ExecutorSettings::default());

    let summary = executor
        .run(&mut driver, &ids(&["a", "b"]), false, &mut throttle(), &sink)
        .await
        .unwrap();

    assert_eq!(summary.mutated, 2);
    assert_eq!(
        driver.calls_for("confirm:"),
        vec!["confirm:a".to_string(), "confirm:b".to_string()]
    );
    let paces = pacing(&sink.take());
    assert_eq!(paces.len(), 1);
    assert_eq!(paces[0].0, PaceKind::AfterMutation);
    assert!(PaceSettings::default().after_mutation.contains(paces[0].1));
}

#[tokio::test(start_paused = true)]
async fn failing_interaction_is_retried_then_recorded_as_error() {
    let mut driver = ScriptedDriver::default();
    driver.failing_begins.insert("a".into(), u32::MAX);
    let sink = TestSink::default();
    let mut executor = MutationExecutor::new(ExecutorSettings::default());

    let summary = executor
        .run(&mut driver, &ids(&["a", "b"]), false, &mut throttle(), &sink)
        .await
        .unwrap();

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.mutated, 1);
    assert_eq!(driver.calls_for("begin:a").len(), 3);
    assert_eq!(driver.calls_for("visit:a").len(), 1, "the visit itself is not repeated");

    let events = sink.take();
    let retries = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::InteractionRetry { .. }))
        .count();
    assert_eq!(retries, 2);
    let paces = pacing(&events);
    assert_eq!(paces[0].0, PaceKind::AfterError);
    assert!(DelayRange::from_secs(60, 120).contains(paces[0].1));
}

#[tokio::test(start_paused = true)]
async fn transient_interaction_failure_recovers() {
    let mut driver = ScriptedDriver::default();
    driver.failing_begins.insert("a".into(), 1);
    let mut executor = MutationExecutor::new(ExecutorSettings::default());

    let summary = executor
        .run(&mut driver, &ids(&["a"]), false, &mut throttle(), &TestSink::default())
        .await
        .unwrap();

    assert_eq!(summary.mutated, 1);
    assert_eq!(driver.calls_for("begin:a").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn quota_gate_holds_the_third_action_until_the_window_rolls() {
    let settings = ExecutorSettings {
        quota: QuotaSettings {
            cap: 2,
            ..QuotaSettings::default()
        },
        ..ExecutorSettings::default()
    };
    let mut driver = ScriptedDriver::default();
    let sink = TestSink::default();
    let mut executor = MutationExecutor::new(settings);
    let started = tokio::time::Instant::now();

    let summary = executor
        .run(&mut driver, &ids(&["a", "b", "c"]), false, &mut throttle(), &sink)
        .await
        .unwrap();

    assert_eq!(summary.mutated, 3);
    assert!(started.elapsed() >= Duration::from_secs(3600));
    let waits = sink
        .take()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::QuotaWait { .. }))
        .count();
    assert_eq!(waits, 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_visit_cools_down_and_reloads_once() {
    let mut driver = ScriptedDriver::default();
    driver.throttled_visits.insert("a".into(), 1);
    let mut throttle = throttle();
    let mut executor = MutationExecutor::new(ExecutorSettings::default());

    let summary = executor
        .run(&mut driver, &ids(&["a"]), false, &mut throttle, &TestSink::default())
        .await
        .unwrap();

    assert_eq!(summary.mutated, 1);
    assert_eq!(driver.calls_for("visit:a").len(), 2);
    assert_eq!(throttle.cooldown.cycles(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_signal_after_the_action_still_counts_the_mutation() {
    let mut driver = ScriptedDriver {
        after_sever: "Please slow down.".to_string(),
        ..ScriptedDriver::default()
    };
    let mut throttle = throttle();
    let mut executor = MutationExecutor::new(ExecutorSettings::default());

    let summary = executor
        .run(&mut driver, &ids(&["a"]), false, &mut throttle, &TestSink::default())
        .await
        .unwrap();

    assert_eq!(summary.mutated, 1);
    assert_eq!(throttle.cooldown.cycles(), 1);
    assert_eq!(driver.calls_for("begin:a").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_session_aborts_and_keeps_the_partial_summary() {
    let mut driver = ScriptedDriver {
        logged_out_at: Some("c".to_string()),
        ..ScriptedDriver::default()
    };
    let mut executor = MutationExecutor::new(ExecutorSettings::default());

    let targets = ids(&["a", "b", "c", "d", "e"]);

    let err = executor
        .run(&mut driver, &targets, false, &mut throttle(), &TestSink::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::SessionExpired(_)));
    let summary = executor.summary();
    assert_eq!(summary.mutated, 2);
    assert!(summary.interrupted);
    assert_eq!(summary.remaining, 3);
    assert_eq!(summary.processed() + summary.remaining, targets.len());
    assert_eq!(executor.outcomes().get(&id("c")), None);
    assert!(driver.calls_for("visit:d").is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_before_the_run_visits_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let mut driver = ScriptedDriver::default();
    let mut executor =
        MutationExecutor::new(ExecutorSettings::default()).with_cancellation(token);

    let summary = executor
        .run(&mut driver, &ids(&["a", "b", "c"]), false, &mut throttle(), &TestSink::default())
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.remaining, 3);
    assert!(driver.calls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_pacing_pause() {
    let token = CancellationToken::new();
    let sink = TestSink {
        cancel_after: Some((id("b"), token.clone())),
        ..TestSink::default()
    };
    let mut driver = ScriptedDriver::default();
    let mut executor =
        MutationExecutor::new(ExecutorSettings::default()).with_cancellation(token);
    let started = tokio::time::Instant::now();

    let summary = executor
        .run(&mut driver, &ids(&["a", "b", "c"]), false, &mut throttle(), &sink)
        .await
        .unwrap();

    assert_eq!(summary.mutated, 2);
    assert!(summary.interrupted);
    assert_eq!(summary.remaining, 1);
    assert!(driver.calls_for("visit:c").is_empty());
    // Only the pause after `a` ran to completion.
    assert!(started.elapsed() < Duration::from_secs(2 * 170));
}

#[tokio::test(start_paused = true)]
async fn resume_skips_settled_targets_and_retries_errors() {
    let prior: OutcomeLog = [
        (id("a"), TargetOutcome::Mutated),
        (id("b"), TargetOutcome::Error),
    ]
    .into_iter()
    .collect();
    let mut driver = ScriptedDriver::default();
    let mut executor =
        MutationExecutor::new(ExecutorSettings::default()).with_prior_outcomes(prior);

    let summary = executor
        .run(&mut driver, &ids(&["a", "b", "c"]), false, &mut throttle(), &TestSink::default())
        .await
        .unwrap();

    assert_eq!(summary.resumed, 1);
    assert_eq!(summary.mutated, 2);
    assert!(driver.calls_for("visit:a").is_empty());
    assert_eq!(executor.outcomes().get(&id("b")), Some(TargetOutcome::Mutated));
}

#[tokio::test(start_paused = true)]
async fn outcomes_are_journaled_after_every_target() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(StorePaths {
        data_dir: temp.path().to_path_buf(),
        whitelist: temp.path().join("whitelist.json"),
    }));
    let mut driver = ScriptedDriver::default();
    driver.profiles.insert(
        "b".into(),
        TargetProfile {
            private: Some(true),
            related: None,
        },
    );
    let mut executor = MutationExecutor::new(ExecutorSettings::default()).with_store(store.clone());

    executor
        .run(&mut driver, &ids(&["a", "b"]), false, &mut throttle(), &TestSink::default())
        .await
        .unwrap();

    let journal = store.load_outcomes().unwrap();
    assert_eq!(&journal, executor.outcomes());
    assert_eq!(journal.get(&id("b")), Some(TargetOutcome::SkippedPrivate));
}

#[tokio::test(start_paused = true)]
async fn no_pause_when_only_settled_targets_follow() {
    let prior: OutcomeLog = [
        (id("b"), TargetOutcome::Mutated),
        (id("c"), TargetOutcome::SkippedPrivate),
    ]
    .into_iter()
    .collect();
    let sink = TestSink::default();
    let mut driver = ScriptedDriver::default();
    let mut executor =
        MutationExecutor::new(ExecutorSettings::default()).with_prior_outcomes(prior);
    let started = tokio::time::Instant::now();

    let summary = executor
        .run(&mut driver, &ids(&["a", "b", "c"]), false, &mut throttle(), &sink)
        .await
        .unwrap();

    assert_eq!(summary.mutated, 1);
    assert_eq!(summary.resumed, 2);
    assert!(pacing(&sink.take()).is_empty());
    assert!(started.elapsed() < Duration::from_secs(170));
}
