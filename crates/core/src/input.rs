use crate::Register;
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

bitflags! {
    /// Decoded push-button register: a set bit means the button is held down.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Buttons: u32 {
        const BUTTON0 = 1 << 0;
        const BUTTON1 = 1 << 1;
        const BUTTON2 = 1 << 2;
        const BUTTON3 = 1 << 3;
    }
}

impl Buttons {
    /// Decodes a raw register value; bits above the button width are ignored.
    pub fn from_register(raw: Register) -> Self {
        Self::from_bits_truncate(raw)
    }

    /// Builds a pressed set from button indices. Unknown indices are ignored.
    pub fn from_indices(indices: &[u8]) -> Self {
        let raw = indices
            .iter()
            .fold(0u32, |acc, &i| acc | 1u32.checked_shl(u32::from(i)).unwrap_or(0));
        Self::from_bits_truncate(raw)
    }
}

/// Classified state of all buttons for a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonEvent {
    None,
    Button0,
    Button1,
    Button2,
    Button3,
    Multiple,
}

impl ButtonEvent {
    pub fn from_raw(raw: Register) -> Self {
        classify(Buttons::from_register(raw))
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ButtonEvent::None => "none",
            ButtonEvent::Button0 => "button0",
            ButtonEvent::Button1 => "button1",
            ButtonEvent::Button2 => "button2",
            ButtonEvent::Button3 => "button3",
            ButtonEvent::Multiple => "multiple",
        };
        f.write_str(name)
    }
}

/// Maps the pressed set to an event. Only an exact single press yields a
/// button variant; simultaneous presses are never resolved to one of them.
pub fn classify(buttons: Buttons) -> ButtonEvent {
    match buttons.bits().count_ones() {
        0 => ButtonEvent::None,
        1 => {
            if buttons == Buttons::BUTTON0 {
                ButtonEvent::Button0
            } else if buttons == Buttons::BUTTON1 {
                ButtonEvent::Button1
            } else if buttons == Buttons::BUTTON2 {
                ButtonEvent::Button2
            } else {
                ButtonEvent::Button3
            }
        }
        _ => ButtonEvent::Multiple,
    }
}
