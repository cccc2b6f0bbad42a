//! Per-mast aspect debounce.
//!
//! Command stations often send a burst of accessory commands when a route is
//! set, and bitwise-controlled masts need several commands to form one code.
//! A mast therefore does not switch on every command: [`SignalMastData::set_code`]
//! only records a *pending* code, and the code settles once no further
//! command arrived for longer than the [`AspectLag`].
//!
//! ```text
//! ┌──────┐  set_code   ┌─────────┐  elapsed > lag  ┌───────┐
//! │ Idle │ ──────────> │ Pending │ ──────────────> │ Ready │
//! └──────┘             └─────────┘                 └───────┘
//!     ^                  │  ^  set_code               │
//!     │                  └──┘  (restart timer)        │
//!     └─────────────────── processed() ───────────────┘
//! ```
//!
//! Time stamps are kept as the low 16 bits of the clock, so the state machine
//! survives clock wraparound as long as the lag stays below ~65 s.
//!
//! # Example
//!
//! ```rust
//! use rs_signals::mast::{AspectLag, SignalMastData};
//!
//! let lag = AspectLag::from_ms(128);
//! let mut mast = SignalMastData::default();
//!
//! mast.set_code(3, 100);
//! assert!(!mast.is_ready_for_process(228, lag));
//! assert!(mast.is_ready_for_process(229, lag));
//! assert_eq!(mast.processed(), 3);
//! ```

use crate::addressing::{ControlStyle, MAX_ADDRESSES_PER_MAST};
use crate::catalog::{self, SignalSet, TYPE_INDEX_MASK};
use crate::layout::{self, aspect_table_cv, MastSettings, MAX_ASPECTS};
use crate::traits::CvStore;

/// Time a code must stay unchanged before it settles.
///
/// Persisted in units of [`AspectLag::UNIT_MS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AspectLag(u16);

impl AspectLag {
    /// Milliseconds per persisted lag unit.
    pub const UNIT_MS: u16 = 128;

    /// Lag from its persisted value.
    pub const fn from_units(units: u8) -> Self {
        Self(units as u16 * Self::UNIT_MS)
    }

    /// Lag in milliseconds, capped at the longest persistable lag.
    pub const fn from_ms(ms: u16) -> Self {
        let max = u8::MAX as u16 * Self::UNIT_MS;
        if ms > max {
            Self(max)
        } else {
            Self(ms)
        }
    }

    /// Lag in milliseconds.
    pub const fn as_ms(self) -> u16 {
        self.0
    }

    /// Persisted value, rounded up to whole units and capped at 255.
    pub const fn units(self) -> u8 {
        let units = self.0.div_ceil(Self::UNIT_MS);
        if units > u8::MAX as u16 {
            u8::MAX
        } else {
            units as u8
        }
    }
}

impl Default for AspectLag {
    fn default() -> Self {
        Self::from_units(1)
    }
}

/// Runtime state of one signal mast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignalMastData {
    changed: bool,
    set: SignalSet,
    address_count: u8,
    signal_count: u8,
    uses_codes: bool,
    style: ControlStyle,
    code_count: u8,
    current_aspect: u8,
    current_code: u8,
    last_code: u8,
    last_time: u16,
    default_aspect: u8,
    default_code: u8,
}

impl SignalMastData {
    /// Load a mast from its CV record.
    ///
    /// Corrupt values are clamped: unknown catalog or signal set indices
    /// fall back to index 0, an out-of-range default falls back to the
    /// prototype default (catalog masts) or aspect 0. A mast without codes
    /// always starts at 0.
    pub fn from_settings<S: CvStore>(cvs: &S, mast: usize) -> Self {
        let settings = MastSettings::read(cvs, mast);
        let type_byte = settings.signal_set_or_mast_type;
        let uses_codes = settings.uses_codes();
        let style = settings.control_style();

        let (set, code_count, prototype_default) = if uses_codes {
            let index = catalog::to_template_index(type_byte);
            if index != type_byte & TYPE_INDEX_MASK {
                log::warn!("Mast {}: unknown mast type {:#04x}", mast, type_byte);
            }
            let def = catalog::lookup(index);
            (def.signal_set, def.code_count, def.default_code)
        } else {
            let index = catalog::to_signal_set_index(type_byte & TYPE_INDEX_MASK);
            if index != type_byte & TYPE_INDEX_MASK {
                log::warn!("Mast {}: unknown signal set {:#04x}", mast, type_byte);
            }
            let set = SignalSet::from_index(index);
            (set, set.aspect_count(), 0)
        };

        let mut default_code = settings.default_code_or_aspect;
        if default_code != 0 && default_code >= code_count {
            let fallback = if code_count > 0 { prototype_default } else { 0 };
            log::warn!(
                "Mast {}: default {} out of range, using {}",
                mast,
                default_code,
                fallback
            );
            default_code = fallback;
        }

        let address_count = match settings.addresses {
            0 => layout::find_required_addr_count(code_count, type_byte),
            n => n.min(MAX_ADDRESSES_PER_MAST),
        };

        let mut data = Self {
            set,
            address_count,
            signal_count: settings.signal_count(),
            uses_codes,
            style,
            code_count,
            current_code: default_code,
            default_code,
            ..Self::default()
        };
        data.default_aspect = data.translate(cvs, mast, default_code);
        data.current_aspect = data.default_aspect;
        data
    }

    /// Translate a code into an aspect.
    ///
    /// Catalog masts look the code up in their CV aspect table; other masts
    /// use the code as the aspect.
    pub fn translate<S: CvStore>(&self, cvs: &S, mast: usize, code: u8) -> u8 {
        if !self.uses_codes {
            return code;
        }
        if usize::from(code) >= MAX_ASPECTS || mast >= layout::NUM_SIGNAL_MAST {
            return 0;
        }
        cvs.read_cv(aspect_table_cv(mast, usize::from(code)))
    }

    // ========================================================================
    // Debounce
    // ========================================================================

    /// Record a new pending code, restarting the settle timer.
    ///
    /// A later call before the code settles replaces it.
    pub fn set_code(&mut self, code: u8, now_ms: u64) {
        self.last_code = code;
        self.last_time = now_ms as u16;
        self.changed = true;
    }

    /// Milliseconds since the last [`set_code`](Self::set_code), modulo 2^16.
    pub fn elapsed(&self, now_ms: u64) -> u16 {
        (now_ms as u16).wrapping_sub(self.last_time)
    }

    /// True if a pending code has been stable for longer than `lag`.
    ///
    /// A time difference that stays negative after one wrap correction
    /// means the clock is inconsistent; the pending code is discarded.
    pub fn is_ready_for_process(&mut self, now_ms: u64, lag: AspectLag) -> bool {
        if !self.changed {
            return false;
        }
        let mut diff = i32::from(now_ms as u16) - i32::from(self.last_time);
        if diff < 0 {
            diff += 0x1_0000;
        }
        if diff < 0 {
            log::warn!("Clock inconsistency, discarding pending code {}", self.last_code);
            self.processed();
            return false;
        }
        diff > i32::from(lag.as_ms())
    }

    /// Leave the pending state, returning the pending code.
    pub fn processed(&mut self) -> u8 {
        let code = self.last_code;
        self.changed = false;
        self.last_code = 0;
        self.last_time = 0;
        code
    }

    /// True while a code waits to settle.
    pub fn is_pending(&self) -> bool {
        self.changed
    }

    /// The pending code, if any.
    pub fn pending_code(&self) -> Option<u8> {
        self.changed.then_some(self.last_code)
    }

    /// Code bitwise commands build on: the pending code, or the committed
    /// one when idle.
    pub fn base_code(&self) -> u8 {
        if self.changed {
            self.last_code
        } else {
            self.current_code
        }
    }

    /// True if the mast knows `code`.
    pub fn accepts_code(&self, code: u8) -> bool {
        code < self.code_count
    }

    pub(crate) fn commit(&mut self, code: u8, aspect: u8) {
        self.current_code = code;
        self.current_aspect = aspect;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Signal set the aspects come from.
    pub fn signal_set(&self) -> SignalSet {
        self.set
    }

    /// Addresses the mast occupies.
    pub fn address_count(&self) -> u8 {
        self.address_count
    }

    /// Light slots up to the last assigned one.
    pub fn signal_count(&self) -> u8 {
        self.signal_count
    }

    /// True if codes translate through the aspect table.
    pub fn uses_codes(&self) -> bool {
        self.uses_codes
    }

    /// How the mast decodes commands.
    pub fn control_style(&self) -> ControlStyle {
        self.style
    }

    /// Number of codes the mast recognizes.
    pub fn code_count(&self) -> u8 {
        self.code_count
    }

    /// The aspect shown.
    pub fn current_aspect(&self) -> u8 {
        self.current_aspect
    }

    /// The code the shown aspect came from.
    pub fn current_code(&self) -> u8 {
        self.current_code
    }

    /// Aspect shown after power-up.
    pub fn default_aspect(&self) -> u8 {
        self.default_aspect
    }

    /// Code shown after power-up.
    pub fn default_code(&self) -> u8 {
        self.default_code
    }

    /// Snapshot for display.
    pub fn state(&self, mast: usize) -> MastState {
        MastState {
            mast,
            signal_set: self.set,
            control_style: self.style,
            aspect: self.current_aspect,
            code: self.current_code,
            pending: self.pending_code(),
            address_count: self.address_count,
            signal_count: self.signal_count,
        }
    }
}

/// Snapshot of a mast for display or logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MastState {
    /// Mast index.
    pub mast: usize,
    /// Signal set of the mast.
    pub signal_set: SignalSet,
    /// Control style.
    pub control_style: ControlStyle,
    /// Aspect shown.
    pub aspect: u8,
    /// Code the aspect came from.
    pub code: u8,
    /// Code waiting to settle.
    pub pending: Option<u8>,
    /// Addresses occupied.
    pub address_count: u8,
    /// Light slots in use.
    pub signal_count: u8,
}
