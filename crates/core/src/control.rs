use crate::bus::BoardBus;
use crate::counter::{Count, WrappedCounter};
use crate::input::{classify, ButtonEvent};
use crate::{ControlError, ControlResult, LoopObserver, Register, Stimulus, StopReason};
use pushlab_config::BoardDescriptor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Observable state of the loop between ticks. Acting happens inside a
/// single [`ControlLoop::step`] and is never observed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    Stopped,
}

/// Why a poll produced no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// A multi-press has not been fully released yet.
    WaitForRelease,
    /// Same classified input as the previous acted-on poll.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Suppressed(Suppression),
    Acted(ButtonEvent),
    Stopped,
}

/// Returns the rule that blocks acting on `current`, if any.
pub fn suppression(previous: ButtonEvent, current: ButtonEvent) -> Option<Suppression> {
    if previous == ButtonEvent::Multiple && current != ButtonEvent::None {
        Some(Suppression::WaitForRelease)
    } else if current == previous {
        Some(Suppression::Unchanged)
    } else {
        None
    }
}

/// Polls the buttons, drives the LED counter and writes it back every tick.
#[derive(Debug)]
pub struct ControlLoop {
    pub bus: BoardBus,
    counter: WrappedCounter,
    previous: ButtonEvent,
    state: LoopState,
    refresh_period: Duration,
    exit_sentinel: Register,
    ticks: u64,
    stimulus: Option<Box<dyn Stimulus>>,
    pub observers: Vec<Arc<dyn LoopObserver>>,
}

impl ControlLoop {
    pub fn new(bus: BoardBus, counter: WrappedCounter) -> Self {
        Self {
            bus,
            counter,
            previous: ButtonEvent::None,
            state: LoopState::Polling,
            refresh_period: Duration::from_millis(1),
            exit_sentinel: 0,
            ticks: 0,
            stimulus: None,
            observers: Vec::new(),
        }
    }

    /// Loop over `bus` with the LED count, refresh period and exit sentinel
    /// taken from `board`.
    pub fn from_config(bus: BoardBus, board: &BoardDescriptor) -> Self {
        Self::new(bus, WrappedCounter::for_leds(board.led_count))
            .with_refresh_period(board.refresh_period())
            .with_exit_sentinel(board.exit_sentinel)
    }

    pub fn with_refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    pub fn with_exit_sentinel(mut self, sentinel: Register) -> Self {
        self.exit_sentinel = sentinel;
        self
    }

    /// Starts the counter at `value`, reduced into the counter's range.
    pub fn with_counter_value(mut self, value: Count) -> Self {
        self.counter = WrappedCounter::with_value(self.counter.max(), value);
        self
    }

    pub fn with_previous_event(mut self, event: ButtonEvent) -> Self {
        self.previous = event;
        self
    }

    pub fn with_stimulus(mut self, stimulus: Box<dyn Stimulus>) -> Self {
        self.stimulus = Some(stimulus);
        self
    }

    pub fn counter(&self) -> &WrappedCounter {
        &self.counter
    }

    pub fn previous_event(&self) -> ButtonEvent {
        self.previous
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == LoopState::Stopped
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn refresh_period(&self) -> Duration {
        self.refresh_period
    }

    /// Runs one poll cycle without sleeping.
    ///
    /// Once stopped, further steps touch no hardware and return
    /// [`TickOutcome::Stopped`].
    pub fn step(&mut self) -> ControlResult<TickOutcome> {
        if self.is_stopped() {
            return Ok(TickOutcome::Stopped);
        }

        let tick = self.ticks;
        self.ticks += 1;

        if let Some(stimulus) = self.stimulus.as_mut() {
            stimulus.before_poll(tick, &mut self.bus)?;
        }

        let current = classify(self.bus.read_buttons()?);

        let outcome = match suppression(self.previous, current) {
            Some(rule) => {
                trace!("Tick {}: {} suppressed ({:?})", tick, current, rule);
                TickOutcome::Suppressed(rule)
            }
            None => self.act(current)?,
        };

        for observer in &self.observers {
            observer.on_tick(tick, &outcome);
        }

        Ok(outcome)
    }

    fn act(&mut self, event: ButtonEvent) -> ControlResult<TickOutcome> {
        match event {
            ButtonEvent::None => {}
            ButtonEvent::Button0 => {
                self.counter.increment();
            }
            ButtonEvent::Button1 => {
                self.counter.decrement();
            }
            ButtonEvent::Button2 => {
                self.counter.transform(|count| count >> 1);
            }
            ButtonEvent::Button3 => {
                self.counter.transform(|count| count << 1);
            }
            ButtonEvent::Multiple => {
                let switches = self.bus.read_switches()?;
                if Count::from(switches) > self.counter.max() {
                    warn!(
                        "Switch state {:#x} exceeds LED range {:#x}, wrapping",
                        switches,
                        self.counter.max()
                    );
                }
                self.counter.transform(|_| Count::from(switches));

                if switches == self.exit_sentinel {
                    info!("Exit switch pattern {:#x} observed", switches);
                    self.state = LoopState::Stopped;
                }
            }
        }

        // Counters built by hand may be wider than the LED register.
        let value = self.counter.value();
        let leds = Register::try_from(value).map_err(|_| ControlError::LedOverflow { value })?;
        self.bus.write_leds(leds)?;
        for observer in &self.observers {
            observer.on_leds_written(leds);
        }
        debug!("{} -> LEDs {:#x}", event, leds);

        self.previous = event;

        if self.is_stopped() {
            Ok(TickOutcome::Stopped)
        } else {
            Ok(TickOutcome::Acted(event))
        }
    }

    /// Polls until the exit sentinel stops the loop, or until `max_ticks`
    /// polls have run. Each poll is followed by a blocking sleep of the
    /// refresh period.
    pub fn run(&mut self, max_ticks: Option<u64>) -> ControlResult<StopReason> {
        for observer in &self.observers {
            observer.on_loop_start();
        }
        info!(
            "Control loop started (max {:#x}, refresh {:?})",
            self.counter.max(),
            self.refresh_period
        );

        let mut polled = 0u64;
        let reason = loop {
            if self.is_stopped() {
                break StopReason::Sentinel;
            }
            if max_ticks.is_some_and(|limit| polled >= limit) {
                break StopReason::MaxTicks;
            }

            self.step()?;
            polled += 1;
            std::thread::sleep(self.refresh_period);
        };

        info!(
            "Control loop stopped after {} ticks: {:?}, LEDs {:#x}",
            self.ticks,
            reason,
            self.counter.value()
        );
        for observer in &self.observers {
            observer.on_loop_stop(reason);
        }

        Ok(reason)
    }
}
