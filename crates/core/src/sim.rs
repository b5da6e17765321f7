//! Scripted input playback for running the control loop without a board.

use crate::bus::BoardBus;
use crate::input::Buttons;
use crate::{ControlResult, Register, Stimulus};
use pushlab_config::{Scenario, ScenarioStep};

/// Plays back scenario steps, one held sample per poll. After the last step
/// all buttons read as released and the switches keep their last position.
#[derive(Debug, Clone)]
pub struct ScriptedStimulus {
    steps: Vec<ScenarioStep>,
    index: usize,
    held: u64,
    switches: Register,
}

impl ScriptedStimulus {
    pub fn new(steps: Vec<ScenarioStep>, initial_switches: Register) -> Self {
        Self {
            steps,
            index: 0,
            held: 0,
            switches: initial_switches,
        }
    }

    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self::new(scenario.steps.clone(), scenario.initial.switches)
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.steps.len()
    }

    /// Raw button register value for the next poll.
    fn next_sample(&mut self) -> Register {
        let Some(step) = self.steps.get(self.index) else {
            return 0;
        };

        if let Some(switches) = step.switches {
            self.switches = switches;
        }
        // Raw values go out unmasked so bits above the button width reach the bus.
        let buttons = step
            .raw
            .unwrap_or_else(|| Buttons::from_indices(&step.buttons).bits());

        self.held += 1;
        if self.held >= step.ticks {
            self.index += 1;
            self.held = 0;
        }
        buttons
    }
}

impl Stimulus for ScriptedStimulus {
    fn before_poll(&mut self, tick: u64, bus: &mut BoardBus) -> ControlResult<()> {
        let buttons = self.next_sample();
        tracing::trace!(
            "Tick {}: driving buttons {:#x}, switches {:#x}",
            tick,
            buttons,
            self.switches
        );
        bus.drive_switches(self.switches)?;
        bus.drive_raw_buttons(buttons)
    }
}
