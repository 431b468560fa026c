//! Per-session countdown. Each session gets its own ticker task that reports
//! `Tick { generation }` over a channel; the controller applies only ticks whose
//! generation matches the active session.

use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{interval_at, Duration, Instant, MissedTickBehavior},
};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

/// Handle to a running ticker. Dropping it aborts the task.
#[derive(Debug)]
pub struct Countdown {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Spawns a task sending `ticks` ticks, one per `period`, the first one a full
    /// `period` from now. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(
        generation: u64,
        period: Duration,
        ticks: u64,
        sender: UnboundedSender<Tick>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for _ in 0..ticks {
                interval.tick().await;

                if sender.send(Tick { generation }).is_err() {
                    trace!("countdown {} receiver dropped", generation);
                    return;
                }
            }

            trace!("countdown {} finished", generation);
        });

        Self { generation, handle }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
