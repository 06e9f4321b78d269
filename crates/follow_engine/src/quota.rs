use std::time::Duration;

use follow_core::{QuotaSettings, QuotaWindow};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::{EngineEvent, ProgressSink};

/// Hard hourly ceiling on state-changing actions.
#[derive(Debug)]
pub struct QuotaGate {
    window: QuotaWindow,
    tick: Duration,
}

impl QuotaGate {
    pub fn new(settings: QuotaSettings) -> Self {
        Self {
            window: QuotaWindow::new(settings, Instant::now().into_std()),
            tick: Duration::from_secs(60),
        }
    }

    /// Interval between progress events while waiting.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// `0` when admitted, otherwise seconds to wait before asking again.
    pub fn admit(&mut self) -> u64 {
        self.window.admit_at(Instant::now().into_std())
    }

    pub fn admitted_in_window(&self) -> u32 {
        self.window.count()
    }

    /// Sleep until admitted. Returns `false` if `cancel` fired first.
    pub async fn wait_for_slot(
        &mut self,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> bool {
        loop {
            let wait = self.admit();
            if wait == 0 {
                return true;
            }
            let wait = Duration::from_secs(wait);
            sink.emit(EngineEvent::QuotaWait {
                wait,
                admitted_in_window: self.window.count(),
            });

            let deadline = Instant::now() + wait;
            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let remaining = deadline - now;
                sink.emit(EngineEvent::QuotaProgress { remaining });
                tokio::select! {
                    _ = sleep(remaining.min(self.tick)) => {}
                    _ = cancel.cancelled() => return false,
                }
            }
        }
    }
}
