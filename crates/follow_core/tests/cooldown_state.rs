use std::time::{Duration, Instant};

use follow_core::{CooldownEvent, CooldownState};

#[test]
fn full_cycle_returns_to_normal() {
    let now = Instant::now();
    let until = now + Duration::from_secs(600);

    let state = CooldownState::Normal.apply(CooldownEvent::Detected);
    assert_eq!(state, CooldownState::Detected);
    let state = state.apply(CooldownEvent::Scheduled { until });
    assert_eq!(state, CooldownState::Waiting { until });
    let state = state.apply(CooldownEvent::Elapsed { now: until });
    assert!(state.is_normal());
}

#[test]
fn waiting_ignores_early_ticks_and_new_detections() {
    let now = Instant::now();
    let until = now + Duration::from_secs(600);
    let waiting = CooldownState::Waiting { until };

    assert_eq!(waiting.apply(CooldownEvent::Detected), waiting);
    assert_eq!(
        waiting.apply(CooldownEvent::Elapsed {
            now: now + Duration::from_secs(599)
        }),
        waiting
    );
    assert_eq!(
        waiting.remaining(now + Duration::from_secs(590)),
        Some(Duration::from_secs(10))
    );
}

#[test]
fn normal_ignores_schedule_without_detection() {
    let until = Instant::now();
    assert_eq!(
        CooldownState::Normal.apply(CooldownEvent::Scheduled { until }),
        CooldownState::Normal
    );
}
