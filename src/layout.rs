//! Configuration variable (CV) layout.
//!
//! The decoder keeps its whole configuration in a flat byte array of
//! [`CV_SPACE`] CVs. The layout is fixed:
//!
//! | CVs | Content |
//! |-----|---------|
//! | 1-127 | Global settings (see [`crate::config`]) |
//! | [`START_CV_OUTPUT`]..=[`END_CV_OUTPUT`] | One [`MastSettings`] record per mast |
//! | [`START_CV_OUTPUT_BASE`]..=[`END_CV_OUTPUT_BASE`] | Output base per mast |
//! | [`START_CV_ASPECT_TABLE`]..=[`END_CV_ASPECT_TABLE`] | Code to aspect table per mast |
//!
//! The blocks are disjoint and fit the CV space; both facts are checked at
//! compile time. Changing [`MAX_OUTPUTS_PER_MAST`] shifts every mast record
//! and breaks existing decoder configurations.
//!
//! # Example
//!
//! ```rust
//! use rs_signals::catalog::{self, MastType};
//! use rs_signals::hal::RamCvStore;
//! use rs_signals::layout::{self, MastSettings};
//!
//! let mut cvs = RamCvStore::new();
//! let def = catalog::lookup(MastType::Departure3 as u8);
//! layout::save_template_outputs_to_cvs_from(&mut cvs, def, 0, 10).unwrap();
//!
//! // Lights land on outputs 11, 12 and 13 (1-based)
//! let settings = MastSettings::read(&cvs, 0);
//! assert_eq!(&settings.outputs[..4], &[11, 12, 13, 0]);
//! assert_eq!(layout::get_mast_output(&cvs, 0, 0), Some(10));
//! ```

use crate::addressing::{codes_for_addresses, required_addr_count, ControlStyle};
use crate::catalog::{self, MastTypeDefinition, MastType, USES_CODES};
use crate::config::{DecoderConfig, VALUE_NUM_SIGNAL_NUMBER};
use crate::traits::CvStore;

// ============================================================================
// Dimensions
// ============================================================================

/// Maximum lights on one mast. Affects the CV layout.
pub const MAX_OUTPUTS_PER_MAST: usize = 10;

/// Maximum aspects (and codes) per mast.
pub const MAX_ASPECTS: usize = 32;

/// Number of physical outputs. Does not affect the CV layout.
pub const NUM_OUTPUTS: usize = 80;

/// Number of signal masts one decoder drives.
pub const NUM_SIGNAL_MAST: usize = 16;

/// Bytes needed to hold one bit per output.
pub const OUTPUT_BYTES: usize = NUM_OUTPUTS.div_ceil(8);

/// Size of one mast record.
pub const SEGMENT_SIZE: usize = MAX_OUTPUTS_PER_MAST + 3;

/// "Output not assigned" marker in persisted output slots.
pub const ONA: u8 = 0;

// ============================================================================
// CV Addresses
// ============================================================================

/// Number of CVs reserved for the decoder.
pub const CV_SPACE: u16 = 1024;

/// Decoder output address, low 8 bits.
pub const CV_ADDRESS_LOW: u16 = 1;
/// Auxiliary activation; holds the factory-default marker.
pub const CV_AUXILIARY_ACTIVATION: u16 = 2;
/// Decoder output address, high 3 bits.
pub const CV_ADDRESS_HIGH: u16 = 9;
/// Decoder key; configuration writes need it to match the lock.
pub const CV_DECODER_KEY: u16 = 15;
/// Decoder lock, 0 = unlocked.
pub const CV_DECODER_LOCK: u16 = 16;
/// Reset type. Reserved, the decoder never interprets it.
pub const CV_RESET_TYPE: u16 = 33;
/// Roco (1) or Lenz (0) address interpretation.
pub const CV_ROCO_ADDRESS: u16 = 34;
/// Fade rate of the output driver, 0-7.
pub const CV_FADE_RATE: u16 = 39;
/// Number of masts in use.
pub const CV_NUM_SIGNAL_NUMBER: u16 = 40;
/// Aspect lag in units of 128 ms.
pub const CV_ASPECT_LAG: u16 = 41;
/// First of four product id CVs.
pub const CV_PROD_ID_1: u16 = 47;

/// First CV of the mast records.
pub const START_CV_OUTPUT: u16 = 128;
/// Last CV of the mast records.
pub const END_CV_OUTPUT: u16 = START_CV_OUTPUT + (SEGMENT_SIZE * NUM_SIGNAL_MAST) as u16 - 1;

/// First CV of the output base table.
pub const START_CV_OUTPUT_BASE: u16 = 352;
/// Last CV of the output base table.
pub const END_CV_OUTPUT_BASE: u16 = START_CV_OUTPUT_BASE + NUM_SIGNAL_MAST as u16 - 1;

/// First CV of the aspect tables.
pub const START_CV_ASPECT_TABLE: u16 = 512;
/// Last CV of the aspect tables.
pub const END_CV_ASPECT_TABLE: u16 =
    START_CV_ASPECT_TABLE + (NUM_SIGNAL_MAST * MAX_ASPECTS) as u16 - 1;

const _: () = assert!(CV_PROD_ID_1 + 3 < START_CV_OUTPUT, "Global CVs overlap mast records");
const _: () = assert!(
    END_CV_OUTPUT < START_CV_OUTPUT_BASE,
    "Too many outputs per masts, CV overlap"
);
const _: () = assert!(
    END_CV_OUTPUT_BASE < START_CV_ASPECT_TABLE,
    "Output base table overlaps aspect table"
);
const _: () = assert!(
    END_CV_ASPECT_TABLE < CV_SPACE,
    "Too many mast aspects, out of memory"
);
const _: () = assert!(MAX_OUTPUTS_PER_MAST <= 16, "Too many signals");
const _: () = assert!(MAX_ASPECTS <= 32, "Too many aspects, do not fit in 5 bits");
const _: () = assert!(NUM_OUTPUTS <= u8::MAX as usize, "Output numbers must fit a CV");

/// First CV of a mast record.
pub const fn mast_record_cv(mast: usize) -> u16 {
    START_CV_OUTPUT + (mast * SEGMENT_SIZE) as u16
}

/// CV of a mast's output base.
pub const fn output_base_cv(mast: usize) -> u16 {
    START_CV_OUTPUT_BASE + mast as u16
}

/// CV of a mast's aspect table entry for `code`.
pub const fn aspect_table_cv(mast: usize, code: usize) -> u16 {
    START_CV_ASPECT_TABLE + (mast * MAX_ASPECTS + code) as u16
}

// ============================================================================
// Mast Settings
// ============================================================================

/// One persisted mast record.
///
/// The field order is the CV order; the record is exactly [`SEGMENT_SIZE`]
/// bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct MastSettings {
    /// Output of each light, 1-based. [`ONA`] = the mast has no such light.
    pub outputs: [u8; MAX_OUTPUTS_PER_MAST],
    /// Low 5 bits: catalog index if [`USES_CODES`] is set, signal set id
    /// otherwise. Bits 5-6: [`ControlStyle`].
    pub signal_set_or_mast_type: u8,
    /// Default code (uses codes) or aspect.
    pub default_code_or_aspect: u8,
    /// Number of addresses. 0 = derive from mast type and control style.
    pub addresses: u8,
}

const _: () = assert!(
    core::mem::size_of::<MastSettings>() == SEGMENT_SIZE,
    "MastSettings != SEGMENT_SIZE"
);

impl MastSettings {
    /// Decode a record from its bytes.
    pub fn from_bytes(bytes: &[u8; SEGMENT_SIZE]) -> Self {
        let mut outputs = [ONA; MAX_OUTPUTS_PER_MAST];
        outputs.copy_from_slice(&bytes[..MAX_OUTPUTS_PER_MAST]);
        Self {
            outputs,
            signal_set_or_mast_type: bytes[MAX_OUTPUTS_PER_MAST],
            default_code_or_aspect: bytes[MAX_OUTPUTS_PER_MAST + 1],
            addresses: bytes[MAX_OUTPUTS_PER_MAST + 2],
        }
    }

    /// Encode into CV order.
    pub fn to_bytes(&self) -> [u8; SEGMENT_SIZE] {
        let mut bytes = [0; SEGMENT_SIZE];
        bytes[..MAX_OUTPUTS_PER_MAST].copy_from_slice(&self.outputs);
        bytes[MAX_OUTPUTS_PER_MAST] = self.signal_set_or_mast_type;
        bytes[MAX_OUTPUTS_PER_MAST + 1] = self.default_code_or_aspect;
        bytes[MAX_OUTPUTS_PER_MAST + 2] = self.addresses;
        bytes
    }

    /// Read a mast record. Masts past the table read as an empty record.
    pub fn read<S: CvStore>(cvs: &S, mast: usize) -> Self {
        if mast >= NUM_SIGNAL_MAST {
            return Self::default();
        }
        let start = mast_record_cv(mast);
        let mut bytes = [0; SEGMENT_SIZE];
        for (cv, byte) in (start..).zip(bytes.iter_mut()) {
            *byte = cvs.read_cv(cv);
        }
        Self::from_bytes(&bytes)
    }

    /// Write a mast record. Masts past the table are ignored.
    pub fn write<S: CvStore>(&self, cvs: &mut S, mast: usize) -> Result<(), S::Error> {
        if mast >= NUM_SIGNAL_MAST {
            log::warn!("Mast record {} outside the CV layout, not written", mast);
            return Ok(());
        }
        cvs.write_cvs(mast_record_cv(mast), &self.to_bytes())
    }

    /// True if the type byte indexes the mast type catalog.
    pub fn uses_codes(&self) -> bool {
        self.signal_set_or_mast_type & USES_CODES != 0
    }

    /// How the mast decodes addresses.
    pub fn control_style(&self) -> ControlStyle {
        ControlStyle::from_type_byte(self.signal_set_or_mast_type)
    }

    /// Number of light slots up to the last assigned one.
    pub fn signal_count(&self) -> u8 {
        self.outputs
            .iter()
            .rposition(|&output| output != ONA)
            .map_or(0, |slot| slot as u8 + 1)
    }
}

// ============================================================================
// Address and Code Counts
// ============================================================================

/// Minimum number of addresses that distinguish `codes` codes under the
/// control style encoded in `mast_type`.
pub fn find_required_addr_count(codes: u8, mast_type: u8) -> u8 {
    required_addr_count(codes, ControlStyle::from_type_byte(mast_type))
}

/// Number of codes `addresses` addresses can express under the control style
/// encoded in `mast_type`.
pub fn find_number_of_signals(addresses: u8, mast_type: u8) -> u8 {
    codes_for_addresses(addresses, ControlStyle::from_type_byte(mast_type))
}

// ============================================================================
// Output Resolution
// ============================================================================

/// Resolve a persisted 1-based output number to a physical output index.
///
/// Returns `None` for [`ONA`] and for numbers past the last output.
pub const fn number_to_phys_output(n: u8) -> Option<u8> {
    if n == ONA || n as usize > NUM_OUTPUTS {
        None
    } else {
        Some(n - 1)
    }
}

/// Physical output of a mast light, read from the CVs.
pub fn get_mast_output<S: CvStore>(cvs: &S, mast: usize, light: usize) -> Option<u8> {
    if mast >= NUM_SIGNAL_MAST || light >= MAX_OUTPUTS_PER_MAST {
        return None;
    }
    number_to_phys_output(cvs.read_cv(mast_record_cv(mast) + light as u16))
}

/// First physical output after every output used by masts below `mast`.
pub fn find_min_light_index<S: CvStore>(cvs: &S, mast: usize) -> u8 {
    (0..mast.min(NUM_SIGNAL_MAST))
        .flat_map(|m| MastSettings::read(cvs, m).outputs)
        .filter(|&n| number_to_phys_output(n).is_some())
        .max()
        .unwrap_or(0)
}

/// Two masts driving the same physical output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputAlias {
    /// The shared physical output.
    pub output: u8,
    /// Mast that claims the output first.
    pub first_mast: usize,
    /// Mast that claims it again.
    pub second_mast: usize,
}

/// Find the first physical output claimed twice among the first `mast_count` masts.
pub fn find_output_alias<S: CvStore>(cvs: &S, mast_count: usize) -> Option<OutputAlias> {
    let mut owners: [Option<usize>; NUM_OUTPUTS] = [None; NUM_OUTPUTS];
    for mast in 0..mast_count.min(NUM_SIGNAL_MAST) {
        let settings = MastSettings::read(cvs, mast);
        for output in settings.outputs.iter().filter_map(|&n| number_to_phys_output(n)) {
            match owners[output as usize] {
                Some(first_mast) => {
                    return Some(OutputAlias {
                        output,
                        first_mast,
                        second_mast: mast,
                    })
                }
                None => owners[output as usize] = Some(mast),
            }
        }
    }
    None
}

// ============================================================================
// Templates
// ============================================================================

fn template_outputs(def: &MastTypeDefinition, from: u8) -> [u8; MAX_OUTPUTS_PER_MAST] {
    let mut outputs = [ONA; MAX_OUTPUTS_PER_MAST];
    for (slot, &relative) in outputs.iter_mut().zip(def.outputs.iter()) {
        if relative == ONA {
            continue;
        }
        let n = u16::from(from) + u16::from(relative);
        if n as usize <= NUM_OUTPUTS {
            *slot = n as u8;
        }
    }
    outputs
}

fn write_outputs<S: CvStore>(
    cvs: &mut S,
    mast: usize,
    outputs: &[u8; MAX_OUTPUTS_PER_MAST],
    from: u8,
) -> Result<(), S::Error> {
    if mast >= NUM_SIGNAL_MAST {
        return Ok(());
    }
    cvs.write_cvs(mast_record_cv(mast), outputs)?;
    let base = if (from as usize) < NUM_OUTPUTS { from + 1 } else { ONA };
    cvs.write_cv(output_base_cv(mast), base)
}

/// Wire a mast's lights from a prototype, starting at physical output `from`.
///
/// Lights that would land past the last output stay unassigned. The output
/// base of the mast is set to `from`.
pub fn save_template_outputs_to_cvs_from<S: CvStore>(
    cvs: &mut S,
    def: &MastTypeDefinition,
    mast: usize,
    from: u8,
) -> Result<(), S::Error> {
    let outputs = template_outputs(def, from);
    write_outputs(cvs, mast, &outputs, from)
}

/// Wire a mast's lights from a prototype at the mast's output base.
///
/// The base is the persisted output base, or with `stable` the base that
/// lines the prototype up with the mast's existing lights, or else the
/// first output after the masts below it. With `stable`, lights the prototype carries keep an output
/// that is already configured.
pub fn save_template_outputs_to_cvs<S: CvStore>(
    cvs: &mut S,
    def: &MastTypeDefinition,
    mast: usize,
    stable: bool,
) -> Result<(), S::Error> {
    let current = MastSettings::read(cvs, mast);
    let persisted_base = number_to_phys_output(cvs.read_cv(output_base_cv(mast)));
    // Base that lines the prototype up with lights the mast already has
    let existing_base = current
        .outputs
        .iter()
        .zip(def.outputs.iter())
        .filter(|(n, rel)| **rel != ONA && number_to_phys_output(**n).is_some())
        .map(|(&n, &rel)| n.saturating_sub(rel))
        .min();

    let from = match (persisted_base, existing_base) {
        (Some(base), _) => base,
        (None, Some(base)) if stable => base,
        _ => find_min_light_index(cvs, mast),
    };

    let mut outputs = template_outputs(def, from);
    if stable {
        for (slot, &existing) in outputs.iter_mut().zip(current.outputs.iter()) {
            if *slot != ONA && number_to_phys_output(existing).is_some() {
                *slot = existing;
            }
        }
    }
    write_outputs(cvs, mast, &outputs, from)
}

/// Initialize a mast's aspect table.
///
/// Catalog-backed masts get the prototype's code table; other masts get
/// the identity mapping.
pub fn save_template_aspects_to_cvs<S: CvStore>(
    cvs: &mut S,
    mast: usize,
    signal_set_or_mast_type: u8,
) -> Result<(), S::Error> {
    if mast >= NUM_SIGNAL_MAST {
        return Ok(());
    }
    let mut table = [0u8; MAX_ASPECTS];
    if signal_set_or_mast_type & USES_CODES != 0 {
        let def = catalog::lookup(catalog::to_template_index(signal_set_or_mast_type));
        table = def.code2aspect;
    } else {
        for (code, aspect) in table.iter_mut().enumerate() {
            *aspect = code as u8;
        }
    }
    cvs.write_cvs(aspect_table_cv(mast, 0), &table)
}

// ============================================================================
// Factory Defaults
// ============================================================================

/// Marker stored in [`CV_AUXILIARY_ACTIVATION`] once defaults are written.
///
/// Changing the value makes every decoder restore its defaults on the next start.
pub const VALUE_AUXILIARY_ACTIVATION: u8 = 4;

/// True if the CVs were never initialized (or a new marker was flashed).
pub fn needs_factory_reset<S: CvStore>(cvs: &S) -> bool {
    cvs.read_cv(CV_AUXILIARY_ACTIVATION) != VALUE_AUXILIARY_ACTIVATION
}

/// Write the factory configuration.
///
/// Global CVs get their defaults, every mast record and table is cleared,
/// and the first [`VALUE_NUM_SIGNAL_NUMBER`] masts become bitwise-controlled
/// [`MastType::Incoming5`] masts wired one after another.
pub fn write_factory_defaults<S: CvStore>(cvs: &mut S) -> Result<(), S::Error> {
    log::info!("Writing factory default CVs");
    DecoderConfig::default().store(cvs)?;

    let empty = [0u8; MAX_ASPECTS];
    for mast in 0..NUM_SIGNAL_MAST {
        MastSettings::default().write(cvs, mast)?;
        cvs.write_cv(output_base_cv(mast), ONA)?;
        cvs.write_cvs(aspect_table_cv(mast, 0), &empty)?;
    }

    let mast_type = USES_CODES | ControlStyle::Bitwise.bits() | MastType::Incoming5 as u8;
    let def = catalog::lookup(MastType::Incoming5 as u8);
    for mast in 0..VALUE_NUM_SIGNAL_NUMBER as usize {
        let settings = MastSettings {
            signal_set_or_mast_type: mast_type,
            default_code_or_aspect: def.default_code,
            ..MastSettings::default()
        };
        settings.write(cvs, mast)?;
        save_template_outputs_to_cvs(cvs, def, mast, false)?;
        save_template_aspects_to_cvs(cvs, mast, mast_type)?;
    }

    cvs.write_cv(CV_AUXILIARY_ACTIVATION, VALUE_AUXILIARY_ACTIVATION)
}
