//! Per-output light state machine.
//!
//! Every physical output owns one [`LightFunction`], a 1-byte packed state:
//!
//! | Bits | Field | Meaning |
//! |------|-------|---------|
//! | 0-3 | `sign` | [`LightSign`]: inactive, fixed or a blink cadence |
//! | 4 | lit | set = changing towards ON (`off == false`) |
//! | 5 | running | set = terminal state not reached (`end == false`) |
//!
//! The inverted lit/running bits make the all-zero byte the safe default:
//! inactive, towards OFF, terminal.
//!
//! Aspect patterns in the [`catalog`](crate::catalog) use the same encoding
//! (bits 0-4), so a pattern byte turns into a light command directly.
//!
//! # Example
//!
//! ```rust
//! use rs_signals::light::{LightFunction, LightSign, LightBank};
//!
//! assert_eq!(LightFunction::from_bits(0), LightFunction::default());
//!
//! let mut bank = LightBank::new();
//! bank.assign(3, LightFunction::command(LightSign::Blinking54, false));
//! assert!(bank.is_lit(3));
//!
//! // Half a 54/min period later the light has toggled
//! bank.advance(556);
//! assert!(!bank.is_lit(3));
//! assert!(!bank.get(3).is_finished());
//! ```

use crate::layout::{NUM_OUTPUTS, OUTPUT_BYTES};

/// Packed on/off state of all outputs, output `n` at bit `n % 8` of byte `n / 8`.
pub type OutputFrame = [u8; OUTPUT_BYTES];

const SIGN_MASK: u8 = 0x0f;
const LIT_BIT: u8 = 0x10;
const RUNNING_BIT: u8 = 0x20;

// ============================================================================
// Light Signs
// ============================================================================

/// Sign shown by a single light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum LightSign {
    /// Not used by the current aspect.
    #[default]
    Inactive = 0,
    /// Steady on or off.
    Fixed = 1,
    /// 54 flashes per minute.
    Blinking54 = 2,
    /// 108 flashes per minute.
    Blinking108 = 3,
    /// 45 flashes per minute.
    Blinking45 = 4,
    /// 22 flashes per minute.
    Blinking22 = 5,
}

const _: () = assert!(LightSign::COUNT <= 16, "Too many signs, must fit in 4 bits");

impl LightSign {
    /// Number of signs.
    pub const COUNT: usize = 6;

    /// The blinking signs, in cadence slot order.
    pub const BLINKING: [LightSign; 4] = [
        LightSign::Blinking54,
        LightSign::Blinking108,
        LightSign::Blinking45,
        LightSign::Blinking22,
    ];

    /// Decode the low nibble of a packed byte. Unknown values are inactive.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & SIGN_MASK {
            1 => LightSign::Fixed,
            2 => LightSign::Blinking54,
            3 => LightSign::Blinking108,
            4 => LightSign::Blinking45,
            5 => LightSign::Blinking22,
            _ => LightSign::Inactive,
        }
    }

    /// Returns true for the blink cadences.
    pub const fn is_blinking(self) -> bool {
        self.half_period_ms().is_some()
    }

    /// Index of the shared blink phase a blinking sign follows.
    pub const fn cadence_slot(self) -> Option<usize> {
        match self {
            LightSign::Blinking54 => Some(0),
            LightSign::Blinking108 => Some(1),
            LightSign::Blinking45 => Some(2),
            LightSign::Blinking22 => Some(3),
            LightSign::Inactive | LightSign::Fixed => None,
        }
    }

    /// Time between toggles of a blinking sign.
    pub const fn half_period_ms(self) -> Option<u64> {
        match self {
            LightSign::Blinking54 => Some(60_000 / 54 / 2),
            LightSign::Blinking108 => Some(60_000 / 108 / 2),
            LightSign::Blinking45 => Some(60_000 / 45 / 2),
            LightSign::Blinking22 => Some(60_000 / 22 / 2),
            LightSign::Inactive | LightSign::Fixed => None,
        }
    }
}

/// Aspect pattern entry: steady on.
pub const LON: u8 = LightSign::Fixed as u8 | LIT_BIT;
/// Aspect pattern entry: steady off.
pub const LOFF: u8 = LightSign::Fixed as u8;

/// Aspect pattern entry for a blinking sign, starting lit.
pub const fn blink(sign: LightSign) -> u8 {
    sign as u8 | LIT_BIT
}

// ============================================================================
// Light Function
// ============================================================================

/// State of one light output.
///
/// # Default
///
/// `{ sign: Inactive, off: true, end: true }`, which is also what the
/// all-zero byte decodes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LightFunction {
    sign: LightSign,
    off: bool,
    end: bool,
}

impl Default for LightFunction {
    fn default() -> Self {
        Self {
            sign: LightSign::Inactive,
            off: true,
            end: true,
        }
    }
}

impl LightFunction {
    /// A light starting to move towards `off`, terminal state not reached.
    pub const fn new(sign: LightSign, off: bool) -> Self {
        Self {
            sign,
            off,
            end: false,
        }
    }

    /// The state a light takes when an aspect assigns it `sign`.
    ///
    /// Fixed lights are terminal at once, inactive lights fall back to the
    /// default, blinking lights start running.
    pub const fn command(sign: LightSign, off: bool) -> Self {
        match sign {
            LightSign::Inactive => Self {
                sign,
                off: true,
                end: true,
            },
            LightSign::Fixed => Self {
                sign,
                off,
                end: true,
            },
            _ => Self::new(sign, off),
        }
    }

    /// Light command for an aspect pattern entry.
    pub const fn from_pattern(entry: u8) -> Self {
        Self::command(LightSign::from_bits(entry), entry & LIT_BIT == 0)
    }

    /// Unpack a state byte.
    pub const fn from_bits(data: u8) -> Self {
        Self {
            sign: LightSign::from_bits(data),
            off: data & LIT_BIT == 0,
            end: data & RUNNING_BIT == 0,
        }
    }

    /// Pack into one byte.
    pub const fn to_bits(self) -> u8 {
        let mut data = self.sign as u8;
        if !self.off {
            data |= LIT_BIT;
        }
        if !self.end {
            data |= RUNNING_BIT;
        }
        data
    }

    /// The sign shown.
    #[inline]
    pub const fn sign(&self) -> LightSign {
        self.sign
    }

    /// True once the light reached its terminal state.
    #[inline]
    pub const fn is_finished(&self) -> bool {
        self.end
    }

    /// True if the light is changing towards ON.
    #[inline]
    pub const fn towards_on(&self) -> bool {
        !self.off
    }

    /// True if the light is changing towards OFF.
    #[inline]
    pub const fn towards_off(&self) -> bool {
        self.off
    }

    /// True if the output should be driven.
    #[inline]
    pub const fn is_lit(&self) -> bool {
        !matches!(self.sign, LightSign::Inactive) && !self.off
    }

    fn toggle(&mut self) {
        self.off = !self.off;
    }
}

// ============================================================================
// Light Bank
// ============================================================================

/// Light states of all physical outputs plus the shared blink clocks.
///
/// All lights with the same cadence blink in phase: each cadence has one
/// phase bit derived from the tick time, and every light of that cadence
/// toggles when the phase flips. A blinking light assigned while its
/// cadence is in the odd phase starts toggled, so it joins the lights
/// already blinking.
#[derive(Clone, Debug)]
pub struct LightBank {
    lights: [LightFunction; NUM_OUTPUTS],
    overrides: OutputFrame,
    phases: [bool; 4],
}

impl Default for LightBank {
    fn default() -> Self {
        Self::new()
    }
}

impl LightBank {
    /// All outputs inactive, no overrides.
    pub fn new() -> Self {
        Self {
            lights: [LightFunction::default(); NUM_OUTPUTS],
            overrides: [0; OUTPUT_BYTES],
            phases: [false; 4],
        }
    }

    /// State of an output. Outputs past the bank read as the default.
    pub fn get(&self, output: usize) -> LightFunction {
        self.lights.get(output).copied().unwrap_or_default()
    }

    /// Replace the state of an output. Returns false if there is no such output.
    ///
    /// Blinking lights are aligned to the current phase of their cadence.
    pub fn assign(&mut self, output: usize, mut light: LightFunction) -> bool {
        if let Some(slot) = light.sign.cadence_slot() {
            if self.phases[slot] {
                light.toggle();
            }
        }
        match self.lights.get_mut(output) {
            Some(slot) => {
                *slot = light;
                true
            }
            None => false,
        }
    }

    /// Reset every light to the default, keeping overrides.
    pub fn reset(&mut self) {
        self.lights = [LightFunction::default(); NUM_OUTPUTS];
    }

    /// Advance the blink cadences to `now_ms`.
    ///
    /// Returns the number of lights that toggled.
    pub fn advance(&mut self, now_ms: u64) -> usize {
        let mut toggled = 0;
        for sign in LightSign::BLINKING {
            let (Some(slot), Some(half)) = (sign.cadence_slot(), sign.half_period_ms()) else {
                continue;
            };
            let phase = (now_ms / half) % 2 == 1;
            if phase == self.phases[slot] {
                continue;
            }
            self.phases[slot] = phase;
            for light in self.lights.iter_mut().filter(|l| l.sign == sign) {
                light.toggle();
                toggled += 1;
            }
        }
        toggled
    }

    /// Force an output lit regardless of its state (lamp test).
    pub fn set_override(&mut self, output: usize, on: bool) -> bool {
        if output >= NUM_OUTPUTS {
            return false;
        }
        let mask = 1 << (output % 8);
        if on {
            self.overrides[output / 8] |= mask;
        } else {
            self.overrides[output / 8] &= !mask;
        }
        true
    }

    /// Returns true if an override forces the output lit.
    pub fn is_overridden(&self, output: usize) -> bool {
        output < NUM_OUTPUTS && self.overrides[output / 8] & (1 << (output % 8)) != 0
    }

    /// Drop all overrides.
    pub fn clear_overrides(&mut self) {
        self.overrides = [0; OUTPUT_BYTES];
    }

    /// True if the output should be driven now, overrides included.
    pub fn is_lit(&self, output: usize) -> bool {
        self.is_overridden(output) || self.get(output).is_lit()
    }

    /// Pack all outputs into a frame for the output driver.
    pub fn frame(&self) -> OutputFrame {
        let mut frame = self.overrides;
        for (output, light) in self.lights.iter().enumerate() {
            if light.is_lit() {
                frame[output / 8] |= 1 << (output % 8);
            }
        }
        frame
    }
}
