pub mod bus;
pub mod control;
pub mod counter;
pub mod input;
pub mod memory;
pub mod metrics;
pub mod sim;

pub use control::{ControlLoop, LoopState, Suppression, TickOutcome};
pub use counter::{Count, WrappedCounter};
pub use input::{classify, ButtonEvent, Buttons};
pub use memory::MemoryWindow;
pub use pushlab_config::StopReason;


/// A 32-bit device register value in native byte order.
pub type Register = u32;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Register access at {offset:#x} ({size} bytes) exceeds window span {span:#x}")]
    OutOfRange {
        offset: usize,
        size: usize,
        span: usize,
    },
    #[error("Misaligned register access at {offset:#x}")]
    MisalignedAccess { offset: usize },
    #[error("Counter value {value:#x} does not fit in the LED register")]
    LedOverflow { value: u64 },
    #[error("Failed to map {span:#x} bytes of physical memory at {base:#x}")]
    MappingFailure {
        base: u64,
        span: usize,
        #[source]
        source: std::io::Error,
    },
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Trait for observing the control loop in a modular way.
pub trait LoopObserver: std::fmt::Debug + Send + Sync {
    fn on_loop_start(&self) {}
    fn on_loop_stop(&self, _reason: StopReason) {}
    fn on_tick(&self, _tick: u64, _outcome: &TickOutcome) {}
    fn on_leds_written(&self, _value: Register) {}
}

/// Source of input register values, consulted before every poll.
///
/// Hardware needs no stimulus; simulations use one to play back button and
/// switch activity.
pub trait Stimulus: std::fmt::Debug {
    fn before_poll(&mut self, tick: u64, bus: &mut bus::BoardBus) -> ControlResult<()>;
}
