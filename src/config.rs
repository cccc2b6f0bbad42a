//! Global decoder configuration.
//!
//! The global settings live in the low CVs (see [`crate::layout`]). They are
//! loaded into a [`DecoderConfig`] once at start and after every
//! configuration write; the runtime path never reads them from the store.
//!
//! # Example
//!
//! ```rust
//! use rs_signals::config::DecoderConfig;
//! use rs_signals::hal::RamCvStore;
//!
//! let mut cvs = RamCvStore::new();
//! DecoderConfig::default()
//!     .with_first_address(300)
//!     .with_roco_addressing(true)
//!     .store(&mut cvs)
//!     .unwrap();
//!
//! let config = DecoderConfig::from_cvs(&cvs);
//! assert_eq!(config.first_address, 300);
//! assert!(config.roco_addressing);
//! ```

use crate::addressing::MAX_ADDRESS;
use crate::layout::{
    CV_ADDRESS_HIGH, CV_ADDRESS_LOW, CV_ASPECT_LAG, CV_DECODER_KEY, CV_DECODER_LOCK,
    CV_FADE_RATE, CV_NUM_SIGNAL_NUMBER, CV_PROD_ID_1, CV_ROCO_ADDRESS, NUM_SIGNAL_MAST,
};
use crate::mast::AspectLag;
use crate::traits::CvStore;

// ============================================================================
// Factory Values
// ============================================================================

/// Default first output address.
pub const VALUE_ADDRESS: u16 = 100;
/// Default decoder key.
pub const VALUE_DECODER_KEY: u8 = 0;
/// Default decoder lock (unlocked).
pub const VALUE_DECODER_LOCK: u8 = 0;
/// Default fade rate.
pub const VALUE_FADE_RATE: u8 = 5;
/// Highest fade rate.
pub const MAX_FADE_RATE: u8 = 7;
/// Default number of masts.
pub const VALUE_NUM_SIGNAL_NUMBER: u8 = 8;
/// Default aspect lag, in 128 ms units.
pub const VALUE_ASPECT_LAG: u8 = 1;
/// Default product id.
pub const VALUE_PROD_ID: [u8; 4] = [2, 1, 1, 1];

// ============================================================================
// Decoder Config
// ============================================================================

/// Global decoder settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderConfig {
    /// Address of the first mast (11 bits)
    pub first_address: u16,
    /// Roco command stations number accessories 4 lower than Lenz ones
    pub roco_addressing: bool,
    /// Fade rate handed to the output driver (0-7)
    pub fade_rate: u8,
    /// Key matched against `decoder_lock`
    pub decoder_key: u8,
    /// Lock value, 0 leaves the decoder unlocked
    pub decoder_lock: u8,
    /// Number of masts in use
    pub mast_count: u8,
    /// Settle time for codes
    pub aspect_lag: AspectLag,
    /// Product id bytes
    pub product_id: [u8; 4],
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            first_address: VALUE_ADDRESS,
            roco_addressing: false,
            fade_rate: VALUE_FADE_RATE,
            decoder_key: VALUE_DECODER_KEY,
            decoder_lock: VALUE_DECODER_LOCK,
            mast_count: VALUE_NUM_SIGNAL_NUMBER,
            aspect_lag: AspectLag::from_units(VALUE_ASPECT_LAG),
            product_id: VALUE_PROD_ID,
        }
    }
}

impl DecoderConfig {
    /// Set the first address (masked to 11 bits)
    pub fn with_first_address(mut self, address: u16) -> Self {
        self.first_address = address & MAX_ADDRESS;
        self
    }

    /// Set Roco address interpretation
    pub fn with_roco_addressing(mut self, roco: bool) -> Self {
        self.roco_addressing = roco;
        self
    }

    /// Set the fade rate (clamped to 0-7)
    pub fn with_fade_rate(mut self, rate: u8) -> Self {
        self.fade_rate = rate.min(MAX_FADE_RATE);
        self
    }

    /// Set the decoder key
    pub fn with_decoder_key(mut self, key: u8) -> Self {
        self.decoder_key = key;
        self
    }

    /// Set the decoder lock (0 = unlocked)
    pub fn with_decoder_lock(mut self, lock: u8) -> Self {
        self.decoder_lock = lock;
        self
    }

    /// True if configuration writes are refused.
    ///
    /// A non-zero lock needs the same value in the key.
    pub fn is_locked(&self) -> bool {
        self.decoder_lock != 0 && self.decoder_key != self.decoder_lock
    }

    /// Set the number of masts (clamped to the mast table)
    pub fn with_mast_count(mut self, count: u8) -> Self {
        self.mast_count = count.min(NUM_SIGNAL_MAST as u8);
        self
    }

    /// Set the aspect lag
    pub fn with_aspect_lag(mut self, lag: AspectLag) -> Self {
        self.aspect_lag = lag;
        self
    }

    /// Load from the global CVs, clamping out-of-range values.
    pub fn from_cvs<S: CvStore>(cvs: &S) -> Self {
        let low = u16::from(cvs.read_cv(CV_ADDRESS_LOW));
        let high = u16::from(cvs.read_cv(CV_ADDRESS_HIGH) & 0x07);

        let mut fade_rate = cvs.read_cv(CV_FADE_RATE);
        if fade_rate > MAX_FADE_RATE {
            log::warn!("Fade rate {} out of range, clamped", fade_rate);
            fade_rate = MAX_FADE_RATE;
        }

        let mut mast_count = cvs.read_cv(CV_NUM_SIGNAL_NUMBER);
        if usize::from(mast_count) > NUM_SIGNAL_MAST {
            log::warn!("Mast count {} out of range, clamped", mast_count);
            mast_count = NUM_SIGNAL_MAST as u8;
        }

        let mut product_id = [0; 4];
        for (cv, byte) in (CV_PROD_ID_1..).zip(product_id.iter_mut()) {
            *byte = cvs.read_cv(cv);
        }

        Self {
            first_address: (high << 8) | low,
            roco_addressing: cvs.read_cv(CV_ROCO_ADDRESS) != 0,
            fade_rate,
            decoder_key: cvs.read_cv(CV_DECODER_KEY),
            decoder_lock: cvs.read_cv(CV_DECODER_LOCK),
            mast_count,
            aspect_lag: AspectLag::from_units(cvs.read_cv(CV_ASPECT_LAG)),
            product_id,
        }
    }

    /// Write to the global CVs.
    pub fn store<S: CvStore>(&self, cvs: &mut S) -> Result<(), S::Error> {
        let address = self.first_address & MAX_ADDRESS;
        cvs.write_cv(CV_ADDRESS_LOW, (address & 0xff) as u8)?;
        cvs.write_cv(CV_ADDRESS_HIGH, (address >> 8) as u8)?;
        cvs.write_cv(CV_ROCO_ADDRESS, u8::from(self.roco_addressing))?;
        cvs.write_cv(CV_FADE_RATE, self.fade_rate.min(MAX_FADE_RATE))?;
        cvs.write_cv(CV_DECODER_KEY, self.decoder_key)?;
        cvs.write_cv(CV_DECODER_LOCK, self.decoder_lock)?;
        cvs.write_cv(
            CV_NUM_SIGNAL_NUMBER,
            self.mast_count.min(NUM_SIGNAL_MAST as u8),
        )?;
        cvs.write_cv(CV_ASPECT_LAG, self.aspect_lag.units())?;
        cvs.write_cvs(CV_PROD_ID_1, &self.product_id)
    }
}
