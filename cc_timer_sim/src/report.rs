use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use cc_timer_common::{Channel, ChannelMode, LogicalTimer, TimerStatus};
use log::info;
use serde::Serialize;

/// One callback invocation, stamped with simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dispatched {
    pub at_us: u64,
    pub timer: LogicalTimer,
    pub channel: Channel,
    pub channel_mode: ChannelMode,
}

/// Collects dispatched events. Shared with the callback, so everything goes
/// through `&self`.
#[derive(Debug, Default)]
pub struct EventLog {
    now_us: AtomicU64,
    events: Mutex<Vec<Dispatched>>,
}

impl EventLog {
    pub fn advance(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::Relaxed);
    }

    pub fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Relaxed)
    }

    pub fn record(&self, timer: LogicalTimer, channel: Channel, channel_mode: ChannelMode) {
        let event = Dispatched {
            at_us: self.now_us(),
            timer,
            channel,
            channel_mode,
        };
        info!("{:?} fired: {:?} {:?} at {} us", timer, channel, channel_mode, event.at_us);
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    pub fn take(&self) -> Vec<Dispatched> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

/// Summary printed at the end of a run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub timer: LogicalTimer,
    pub status: TimerStatus,
    pub period_us: u32,
    pub compare_count: u16,
    pub simulated_us: u64,
    pub dispatched: usize,
    pub events: Vec<Dispatched>,
}

impl Report {
    pub fn new(
        status: TimerStatus,
        timer: LogicalTimer,
        period_us: u32,
        simulated_us: u64,
        events: Vec<Dispatched>,
    ) -> Self {
        Self {
            timer,
            compare_count: status.clock.compare_count(period_us),
            status,
            period_us,
            simulated_us,
            dispatched: events.len(),
            events,
        }
    }
}
