use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Number of push buttons wired to the button register.
pub const BUTTON_COUNT: u8 = 4;

/// Width of every device register in bytes.
pub const REGISTER_SIZE: usize = std::mem::size_of::<u32>();

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WindowRange {
    pub base: u64,
    pub span: String, // e.g. "20KiB"
}

/// Byte offsets of the device registers, relative to the window base.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOffsets {
    pub leds: usize,
    pub switches: usize,
    pub buttons: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardDescriptor {
    pub name: String,
    pub window: WindowRange,
    pub registers: RegisterOffsets,
    #[serde(default = "default_led_count")]
    pub led_count: u32,
    #[serde(default = "default_switch_mask")]
    pub switch_mask: u32,
    #[serde(default = "default_refresh_period_ms")]
    pub refresh_period_ms: u64,
    #[serde(default)]
    pub exit_sentinel: u32,
}

fn default_led_count() -> u32 {
    10
}

fn default_switch_mask() -> u32 {
    0x3FF
}

fn default_refresh_period_ms() -> u64 {
    1
}

impl Default for BoardDescriptor {
    fn default() -> Self {
        Self::de1_soc()
    }
}

impl BoardDescriptor {
    /// Lightweight HPS-to-FPGA bridge of the DE1-SoC board.
    pub fn de1_soc() -> Self {
        Self {
            name: "de1-soc".to_string(),
            window: WindowRange {
                base: 0xFF20_0000,
                span: "20KiB".to_string(),
            },
            registers: RegisterOffsets {
                leds: 0x00,
                switches: 0x40,
                buttons: 0x50,
            },
            led_count: default_led_count(),
            switch_mask: default_switch_mask(),
            refresh_period_ms: default_refresh_period_ms(),
            exit_sentinel: 0,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open board descriptor at {:?}", path.as_ref()))?;
        let board: Self =
            serde_yaml::from_reader(f).context("Failed to parse Board Descriptor")?;
        board.validate()?;
        Ok(board)
    }

    pub fn span_bytes(&self) -> Result<usize> {
        let span = parse_size(&self.window.span)
            .with_context(|| format!("Invalid window span '{}'", self.window.span))?;
        usize::try_from(span).context("Window span does not fit in the address space")
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_period_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let span = self.span_bytes()?;
        if span == 0 {
            anyhow::bail!("Window span must be greater than zero");
        }

        let regs = [
            ("leds", self.registers.leds),
            ("switches", self.registers.switches),
            ("buttons", self.registers.buttons),
        ];
        for (name, offset) in regs {
            if offset % REGISTER_SIZE != 0 {
                anyhow::bail!("Register '{}' offset {:#x} is not 4-byte aligned", name, offset);
            }
            if offset.checked_add(REGISTER_SIZE).map_or(true, |end| end > span) {
                anyhow::bail!(
                    "Register '{}' offset {:#x} lies outside the {:#x}-byte window",
                    name,
                    offset,
                    span
                );
            }
        }

        if self.led_count == 0 || self.led_count > 32 {
            anyhow::bail!("'led_count' must be between 1 and 32, got {}", self.led_count);
        }

        if self.refresh_period_ms == 0 {
            anyhow::bail!("'refresh_period_ms' must be greater than zero");
        }

        // Switch reads are masked before the sentinel compare.
        if self.exit_sentinel & !self.switch_mask != 0 {
            anyhow::bail!(
                "'exit_sentinel' {:#x} has bits outside 'switch_mask' {:#x}",
                self.exit_sentinel,
                self.switch_mask
            );
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Sentinel,
    MaxTicks,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioLimits {
    pub max_ticks: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ScenarioInitial {
    #[serde(default)]
    pub counter: u64,
    #[serde(default)]
    pub switches: u32,
}

/// One held input sample. `buttons` lists the pressed button indices;
/// `raw` instead stores an exact button register value.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioStep {
    #[serde(default)]
    pub buttons: Vec<u8>,
    #[serde(default)]
    pub raw: Option<u32>,
    #[serde(default)]
    pub switches: Option<u32>,
    #[serde(default = "default_step_ticks")]
    pub ticks: u64,
}

fn default_step_ticks() -> u64 {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LedsAssertion {
    pub expected_leds: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioAssertion {
    Leds(LedsAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub schema_version: String,
    #[serde(default)]
    pub board: Option<String>,
    pub limits: ScenarioLimits,
    #[serde(default)]
    pub initial: ScenarioInitial,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open scenario at {:?}", path.as_ref()))?;
        let scenario: Self =
            serde_yaml::from_reader(f).context("Failed to parse Scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.limits.max_ticks == 0 {
            anyhow::bail!("Limit 'max_ticks' must be greater than zero");
        }

        for (i, step) in self.steps.iter().enumerate() {
            if step.ticks == 0 {
                anyhow::bail!("Step {} must hold for at least one tick", i);
            }
            if step.raw.is_some() && !step.buttons.is_empty() {
                anyhow::bail!("Step {} sets both 'raw' and 'buttons'", i);
            }
            if let Some(b) = step.buttons.iter().find(|b| **b >= BUTTON_COUNT) {
                anyhow::bail!(
                    "Step {} references button {}, valid buttons are 0..{}",
                    i,
                    b,
                    BUTTON_COUNT
                );
            }
        }

        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
