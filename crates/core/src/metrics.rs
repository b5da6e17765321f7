use crate::control::TickOutcome;
use crate::{LoopObserver, Register};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug)]
pub struct LoopMetrics {
    tick_count: AtomicU64,
    action_count: AtomicU64,
    suppressed_count: AtomicU64,
    led_write_count: AtomicU64,
    start_time: Mutex<Instant>,
}

/// Point-in-time copy of [`LoopMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub actions: u64,
    pub suppressed: u64,
    pub led_writes: u64,
}

impl Default for LoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self {
            tick_count: AtomicU64::new(0),
            action_count: AtomicU64::new(0),
            suppressed_count: AtomicU64::new(0),
            led_write_count: AtomicU64::new(0),
            start_time: Mutex::new(Instant::now()),
        }
    }

    pub fn get_ticks(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }

    pub fn get_actions(&self) -> u64 {
        self.action_count.load(Ordering::SeqCst)
    }

    pub fn get_suppressed(&self) -> u64 {
        self.suppressed_count.load(Ordering::SeqCst)
    }

    pub fn get_led_writes(&self) -> u64 {
        self.led_write_count.load(Ordering::SeqCst)
    }

    pub fn get_polls_per_second(&self) -> f64 {
        let elapsed = match self.start_time.lock() {
            Ok(start) => start.elapsed().as_secs_f64(),
            Err(_) => 0.0,
        };
        if elapsed > 0.0 {
            self.get_ticks() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.get_ticks(),
            actions: self.get_actions(),
            suppressed: self.get_suppressed(),
            led_writes: self.get_led_writes(),
        }
    }
}

impl LoopObserver for LoopMetrics {
    fn on_loop_start(&self) {
        if let Ok(mut start) = self.start_time.lock() {
            *start = Instant::now();
        }
    }

    fn on_tick(&self, _tick: u64, outcome: &TickOutcome) {
        self.tick_count.fetch_add(1, Ordering::SeqCst);
        match outcome {
            TickOutcome::Suppressed(_) => {
                self.suppressed_count.fetch_add(1, Ordering::SeqCst);
            }
            // The stopping tick acted on a multi-press.
            TickOutcome::Acted(_) | TickOutcome::Stopped => {
                self.action_count.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn on_leds_written(&self, _value: Register) {
        self.led_write_count.fetch_add(1, Ordering::SeqCst);
    }
}
