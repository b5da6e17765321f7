use crate::input::Buttons;
use crate::memory::MemoryWindow;
use crate::{ControlResult, Register};
use pushlab_config::{BoardDescriptor, RegisterOffsets};

/// Typed access to the board's LED, switch and button registers.
#[derive(Debug)]
pub struct BoardBus {
    window: MemoryWindow,
    registers: RegisterOffsets,
    switch_mask: Register,
}

impl BoardBus {
    pub fn new(window: MemoryWindow, registers: RegisterOffsets, switch_mask: Register) -> Self {
        Self {
            window,
            registers,
            switch_mask,
        }
    }

    /// Simulated registers laid out as described by `board`.
    pub fn simulated(board: &BoardDescriptor) -> anyhow::Result<Self> {
        let span = board.span_bytes()?;
        let window = MemoryWindow::simulated(board.window.base, span);
        Ok(Self::new(window, board.registers, board.switch_mask))
    }

    /// Maps the board's physical register window.
    #[cfg(unix)]
    pub fn mapped(board: &BoardDescriptor) -> anyhow::Result<Self> {
        let span = board.span_bytes()?;
        let window = MemoryWindow::map_physical(board.window.base, span)?;
        Ok(Self::new(window, board.registers, board.switch_mask))
    }

    pub fn window(&self) -> &MemoryWindow {
        &self.window
    }

    pub fn into_window(self) -> MemoryWindow {
        self.window
    }

    pub fn read_buttons(&self) -> ControlResult<Buttons> {
        let raw = self.window.read(self.registers.buttons)?;
        Ok(Buttons::from_register(raw))
    }

    /// Switch positions, masked to the switches present on the board.
    pub fn read_switches(&self) -> ControlResult<Register> {
        Ok(self.window.read(self.registers.switches)? & self.switch_mask)
    }

    pub fn read_leds(&self) -> ControlResult<Register> {
        self.window.read(self.registers.leds)
    }

    pub fn write_leds(&mut self, value: Register) -> ControlResult<()> {
        self.window.write(self.registers.leds, value)
    }

    // Input registers are read-only on hardware; storing to them only makes
    // sense against a simulated window.

    pub fn drive_buttons(&mut self, buttons: Buttons) -> ControlResult<()> {
        self.drive_raw_buttons(buttons.bits())
    }

    pub fn drive_raw_buttons(&mut self, raw: Register) -> ControlResult<()> {
        self.window.write(self.registers.buttons, raw)
    }

    pub fn drive_switches(&mut self, value: Register) -> ControlResult<()> {
        self.window.write(self.registers.switches, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ControlError;

    #[test]
    fn test_de1_soc_layout() {
        let board = BoardDescriptor::de1_soc();
        let mut bus = BoardBus::simulated(&board).unwrap();
        assert_eq!(bus.window().span(), 0x5000);

        bus.drive_buttons(Buttons::BUTTON2).unwrap();
        bus.drive_switches(0xFFFF_FFFF).unwrap();
        bus.write_leds(0x2AA).unwrap();

        assert_eq!(bus.read_buttons().unwrap(), Buttons::BUTTON2);
        assert_eq!(bus.read_switches().unwrap(), 0x3FF);
        assert_eq!(bus.read_leds().unwrap(), 0x2AA);

        let window = bus.into_window();
        assert_eq!(window.read(0x50).unwrap(), 0x4);
        assert_eq!(window.read(0x40).unwrap(), 0xFFFF_FFFF);
        assert_eq!(window.read(0x00).unwrap(), 0x2AA);
    }

    #[test]
    fn test_bad_offset_is_fatal() {
        let registers = RegisterOffsets {
            leds: 0x0,
            switches: 0x4,
            buttons: 0x100,
        };
        let bus = BoardBus::new(MemoryWindow::simulated(0, 0x10), registers, 0x3FF);
        assert!(matches!(
            bus.read_buttons(),
            Err(ControlError::OutOfRange { offset: 0x100, .. })
        ));
    }
}
