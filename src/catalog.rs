//! Compiled-in catalog of signal sets and mast prototypes.
//!
//! A *signal set* is a family of aspects with a fixed light role order
//! (for the ČSD family: green, upper yellow, red, white, lower yellow).
//! Each aspect is a pattern of one byte per light role, encoded the same
//! way as a packed [`LightFunction`](crate::light::LightFunction).
//!
//! A *mast type* is a prototype built on a signal set: how many codes it
//! recognizes, which light roles it carries, where those lights are wired by
//! default and how codes translate into aspects.
//!
//! # Example
//!
//! ```rust
//! use rs_signals::catalog::{self, csd, MastType, SignalSet};
//!
//! let def = catalog::lookup(MastType::Incoming5 as u8);
//! assert_eq!(def.signal_set, SignalSet::CsdBasic);
//! assert_eq!(def.code2aspect[1], csd::CLEAR);
//!
//! // Corrupted indices fall back to the empty prototype
//! assert_eq!(catalog::lookup(200).light_count, 0);
//! ```

use crate::layout::{MAX_ASPECTS, MAX_OUTPUTS_PER_MAST};
use crate::light::{blink, LightSign, LOFF, LON};

/// Bit 7 of a mast type byte: the low bits index the mast type catalog.
pub const USES_CODES: u8 = 0x80;
/// Bits 5-6 of a mast type byte: the control style.
pub const CONTROL_STYLE_MASK: u8 = 0x60;
/// Low 5 bits of a mast type byte: signal set id or catalog index.
pub const TYPE_INDEX_MASK: u8 = 0x1f;

/// Upper bound for signal set ids representable in a mast type byte.
pub const MAX_SIGNAL_SETS: usize = 16;
/// Upper bound for catalog entries representable in a mast type byte.
pub const MAX_MAST_TYPES: usize = 32;

/// Pattern of light signs for one aspect, indexed by light role.
pub type AspectPattern = [u8; MAX_OUTPUTS_PER_MAST];

// ============================================================================
// Signal Sets
// ============================================================================

/// Signal sets known to the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum SignalSet {
    /// No aspects; every light of the mast stays inactive.
    Disabled = 0,
    /// ČSD basic signal set.
    #[default]
    CsdBasic = 1,
    /// ČSD intermediate signal set.
    CsdIntermediate = 2,
    /// ČSD embedded signal set.
    CsdEmbedded = 3,
    /// SŽDC basic signal set.
    SzdcBasic = 4,
    /// ČSD mechanical (semaphore) signal set.
    CsdMechanical = 5,
}

const _: () = assert!(SignalSet::COUNT <= MAX_SIGNAL_SETS, "Too many signal sets");

impl SignalSet {
    /// Number of defined signal sets.
    pub const COUNT: usize = 6;

    /// Signal set for a clamped index (see [`to_signal_set_index`]).
    pub const fn from_index(index: u8) -> Self {
        match index {
            1 => SignalSet::CsdBasic,
            2 => SignalSet::CsdIntermediate,
            3 => SignalSet::CsdEmbedded,
            4 => SignalSet::SzdcBasic,
            5 => SignalSet::CsdMechanical,
            _ => SignalSet::Disabled,
        }
    }

    /// Number of aspects defined by the set.
    pub const fn aspect_count(self) -> u8 {
        match self {
            SignalSet::Disabled => 0,
            SignalSet::CsdBasic | SignalSet::CsdIntermediate | SignalSet::CsdEmbedded => {
                CSD_ASPECT_COUNT as u8
            }
            SignalSet::SzdcBasic => (CSD_ASPECT_COUNT + SZDC_EXTRA_ASPECT_COUNT) as u8,
            SignalSet::CsdMechanical => MECHANICAL_ASPECT_COUNT as u8,
        }
    }

    /// Light pattern for an aspect, or `None` if the set does not define it.
    pub fn aspect_pattern(self, aspect: u8) -> Option<&'static AspectPattern> {
        let index = aspect as usize;
        match self {
            SignalSet::Disabled => None,
            SignalSet::CsdBasic | SignalSet::CsdIntermediate | SignalSet::CsdEmbedded => {
                CSD_ASPECTS.get(index)
            }
            SignalSet::SzdcBasic => CSD_ASPECTS
                .get(index)
                .or_else(|| SZDC_EXTRA_ASPECTS.get(index.checked_sub(CSD_ASPECT_COUNT)?)),
            SignalSet::CsdMechanical => MECHANICAL_ASPECTS.get(index),
        }
    }
}

/// Clamp a raw mast type byte into a valid signal set index.
///
/// Control style bits are stripped; ids past the defined sets map to 0
/// ([`SignalSet::Disabled`]).
pub const fn to_signal_set_index(raw: u8) -> u8 {
    let index = raw & TYPE_INDEX_MASK;
    if index as usize >= SignalSet::COUNT {
        0
    } else {
        index
    }
}

// ============================================================================
// Aspect Tables
// ============================================================================

/// Aspects of the ČSD family signal sets.
pub mod csd {
    /// Stůj - stop.
    pub const STOP: u8 = 0;
    /// Volno - clear.
    pub const CLEAR: u8 = 1;
    /// Výstraha - caution, next signal at stop.
    pub const CAUTION: u8 = 2;
    /// Očekávej 40 - expect 40 km/h.
    pub const EXPECT_40: u8 = 3;
    /// Rychlost 40 a volno.
    pub const SPEED_40_CLEAR: u8 = 4;
    /// Rychlost 40 a výstraha.
    pub const SPEED_40_CAUTION: u8 = 5;
    /// Rychlost 40 a očekávej 40.
    pub const SPEED_40_EXPECT_40: u8 = 6;
    /// Přivolávací návěst - call-on.
    pub const CALL_ON: u8 = 7;
    /// Posun dovolen - shunting allowed.
    pub const SHUNT_ALLOWED: u8 = 8;
    /// Posun zakázán - shunting forbidden.
    pub const SHUNT_FORBIDDEN: u8 = 9;
    /// Očekávej 60.
    pub const EXPECT_60: u8 = 10;
    /// Očekávej 80.
    pub const EXPECT_80: u8 = 11;
    /// Očekávej 100.
    pub const EXPECT_100: u8 = 12;
    /// Rychlost 40 a očekávej 60.
    pub const SPEED_40_EXPECT_60: u8 = 13;
    /// Rychlost 40 a očekávej 80.
    pub const SPEED_40_EXPECT_80: u8 = 14;
    /// All lights dark.
    pub const DARK: u8 = 15;

    /// SŽDC only: repeated caution.
    pub const CAUTION_REPEATED: u8 = 16;
    /// SŽDC only: slow call-on.
    pub const CALL_ON_SLOW: u8 = 17;
}

/// Aspects of the mechanical signal set.
pub mod mechanical {
    /// Both arms down.
    pub const STOP: u8 = 0;
    /// Upper arm raised.
    pub const CLEAR: u8 = 1;
    /// Both arms raised.
    pub const SPEED_40: u8 = 2;
}

const B54: u8 = blink(LightSign::Blinking54);
const B108: u8 = blink(LightSign::Blinking108);
const B45: u8 = blink(LightSign::Blinking45);
const B22: u8 = blink(LightSign::Blinking22);

const CSD_ASPECT_COUNT: usize = 16;
const SZDC_EXTRA_ASPECT_COUNT: usize = 2;
const MECHANICAL_ASPECT_COUNT: usize = 3;

// Light roles: green, upper yellow, red, white, lower yellow.
static CSD_ASPECTS: [AspectPattern; CSD_ASPECT_COUNT] = [
    [LOFF, LOFF, LON, LOFF, LOFF, 0, 0, 0, 0, 0],
    [LON, LOFF, LOFF, LOFF, LOFF, 0, 0, 0, 0, 0],
    [LOFF, LON, LOFF, LOFF, LOFF, 0, 0, 0, 0, 0],
    [LOFF, B54, LOFF, LOFF, LOFF, 0, 0, 0, 0, 0],
    [LON, LOFF, LOFF, LOFF, LON, 0, 0, 0, 0, 0],
    [LOFF, LON, LOFF, LOFF, LON, 0, 0, 0, 0, 0],
    [LOFF, B54, LOFF, LOFF, LON, 0, 0, 0, 0, 0],
    [LOFF, LOFF, LON, B54, LOFF, 0, 0, 0, 0, 0],
    [LOFF, LOFF, LOFF, LON, LOFF, 0, 0, 0, 0, 0],
    [LOFF, LOFF, LON, LOFF, LOFF, 0, 0, 0, 0, 0],
    [LOFF, B108, LOFF, LOFF, LOFF, 0, 0, 0, 0, 0],
    [B54, LOFF, LOFF, LOFF, LOFF, 0, 0, 0, 0, 0],
    [B108, LOFF, LOFF, LOFF, LOFF, 0, 0, 0, 0, 0],
    [LOFF, B108, LOFF, LOFF, LON, 0, 0, 0, 0, 0],
    [B54, LOFF, LOFF, LOFF, LON, 0, 0, 0, 0, 0],
    [LOFF, LOFF, LOFF, LOFF, LOFF, 0, 0, 0, 0, 0],
];

static SZDC_EXTRA_ASPECTS: [AspectPattern; SZDC_EXTRA_ASPECT_COUNT] = [
    [LOFF, LON, LOFF, B45, LOFF, 0, 0, 0, 0, 0],
    [LOFF, LOFF, LON, B22, LOFF, 0, 0, 0, 0, 0],
];

// Roles: upper arm, lower arm.
static MECHANICAL_ASPECTS: [AspectPattern; MECHANICAL_ASPECT_COUNT] = [
    [LOFF, LOFF, 0, 0, 0, 0, 0, 0, 0, 0],
    [LON, LOFF, 0, 0, 0, 0, 0, 0, 0, 0],
    [LON, LON, 0, 0, 0, 0, 0, 0, 0, 0],
];

const _: () = assert!(
    CSD_ASPECT_COUNT + SZDC_EXTRA_ASPECT_COUNT <= MAX_ASPECTS,
    "Too many aspects"
);

// ============================================================================
// Mast Types
// ============================================================================

/// Mast prototypes in the catalog, by index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MastType {
    /// Empty prototype, also the fallback for corrupted indices.
    None = 0,
    /// Incoming (entry) signal, five lights.
    Incoming5 = 1,
    /// Departure signal with shunting light, four lights.
    Departure4 = 2,
    /// Departure signal, three lights.
    Departure3 = 3,
    /// Shunting signal, two lights.
    Shunting2 = 4,
}

/// A mast prototype.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MastTypeDefinition {
    /// Number of distinct codes. Implies the number of addresses used.
    pub code_count: u8,
    /// Number of physical outputs the prototype occupies.
    pub light_count: u8,
    /// Signal set providing the aspects.
    pub signal_set: SignalSet,
    /// Code shown after power-up.
    pub default_code: u8,
    /// Default wiring per light role: 1-based offset from the mast's first
    /// output, 0 = the mast does not carry that light.
    pub outputs: [u8; MAX_OUTPUTS_PER_MAST],
    /// Code to aspect translation.
    pub code2aspect: [u8; MAX_ASPECTS],
}

const fn codes<const N: usize>(list: [u8; N]) -> [u8; MAX_ASPECTS] {
    let mut table = [0; MAX_ASPECTS];
    let mut i = 0;
    while i < N {
        table[i] = list[i];
        i += 1;
    }
    table
}

/// Number of entries in [`MAST_TYPE_DEFINITIONS`].
pub const MAST_TYPE_DEFINITION_COUNT: usize = 5;

/// The catalog, indexed by [`MastType`].
pub static MAST_TYPE_DEFINITIONS: [MastTypeDefinition; MAST_TYPE_DEFINITION_COUNT] = [
    MastTypeDefinition {
        code_count: 1,
        light_count: 0,
        signal_set: SignalSet::Disabled,
        default_code: 0,
        outputs: [0; MAX_OUTPUTS_PER_MAST],
        code2aspect: [0; MAX_ASPECTS],
    },
    MastTypeDefinition {
        code_count: 8,
        light_count: 5,
        signal_set: SignalSet::CsdBasic,
        default_code: 0,
        outputs: [1, 2, 3, 4, 5, 0, 0, 0, 0, 0],
        code2aspect: codes([
            csd::STOP,
            csd::CLEAR,
            csd::CAUTION,
            csd::EXPECT_40,
            csd::SPEED_40_CLEAR,
            csd::SPEED_40_CAUTION,
            csd::SPEED_40_EXPECT_40,
            csd::CALL_ON,
        ]),
    },
    MastTypeDefinition {
        code_count: 6,
        light_count: 4,
        signal_set: SignalSet::CsdBasic,
        default_code: 0,
        outputs: [1, 2, 3, 4, 0, 0, 0, 0, 0, 0],
        code2aspect: codes([
            csd::STOP,
            csd::CLEAR,
            csd::CAUTION,
            csd::EXPECT_40,
            csd::SHUNT_ALLOWED,
            csd::CALL_ON,
        ]),
    },
    MastTypeDefinition {
        code_count: 4,
        light_count: 3,
        signal_set: SignalSet::CsdBasic,
        default_code: 0,
        outputs: [1, 2, 3, 0, 0, 0, 0, 0, 0, 0],
        code2aspect: codes([csd::STOP, csd::CLEAR, csd::CAUTION, csd::EXPECT_40]),
    },
    MastTypeDefinition {
        code_count: 2,
        light_count: 2,
        signal_set: SignalSet::CsdBasic,
        default_code: 0,
        outputs: [0, 0, 1, 2, 0, 0, 0, 0, 0, 0],
        code2aspect: codes([csd::SHUNT_FORBIDDEN, csd::SHUNT_ALLOWED]),
    },
];

const _: () = assert!(MAST_TYPE_DEFINITION_COUNT <= MAX_MAST_TYPES, "Too many mast types");

/// Look up a mast prototype. Out-of-range indices yield entry 0.
pub fn lookup(index: u8) -> &'static MastTypeDefinition {
    MAST_TYPE_DEFINITIONS
        .get(index as usize)
        .unwrap_or(&MAST_TYPE_DEFINITIONS[0])
}

/// Clamp a raw mast type byte into a valid catalog index (else 0).
pub const fn to_template_index(raw: u8) -> u8 {
    let index = raw & TYPE_INDEX_MASK;
    if index as usize >= MAST_TYPE_DEFINITION_COUNT {
        0
    } else {
        index
    }
}
