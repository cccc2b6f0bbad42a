//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the hardware traits, enabling
//! development and testing on desktop without a decoder board.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`RamCvStore`] | [`CvStore`] | CV image in RAM |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockOutputs`] | [`OutputDriver`] | Records pushed output frames |
//!
//! # Example
//!
//! ```rust
//! use rs_signals::SignalDecoder;
//! use rs_signals::hal::{MockClock, MockOutputs, RamCvStore};
//! use rs_signals::traits::Clock;
//!
//! let mut decoder = SignalDecoder::new(RamCvStore::new());
//! decoder.start().unwrap();
//!
//! let mut clock = MockClock::new();
//! let mut outputs = MockOutputs::new();
//! for _ in 0..10 {
//!     clock.advance(20);
//!     decoder.tick(clock.now_ms());
//!     decoder.drive(&mut outputs).unwrap();
//! }
//! assert_eq!(outputs.frames.len(), 10);
//! ```
//!
//! [`CvStore`]: crate::traits::CvStore
//! [`Clock`]: crate::traits::Clock
//! [`OutputDriver`]: crate::traits::OutputDriver

use alloc::vec::Vec;

use crate::error::CvOutOfRange;
use crate::layout::CV_SPACE;
use crate::light::OutputFrame;
use crate::traits::{Clock, CvStore, OutputDriver};

// ============================================================================
// CV Storage
// ============================================================================

/// CV store backed by a RAM image of the whole CV space.
///
/// Starts blank (all zero), like erased EEPROM.
///
/// # Example
///
/// ```rust
/// use rs_signals::hal::RamCvStore;
/// use rs_signals::traits::CvStore;
///
/// let mut cvs = RamCvStore::new();
/// cvs.write_cv(1, 42).unwrap();
/// assert_eq!(cvs.read_cv(1), 42);
/// assert_eq!(cvs.write_count, 1);
///
/// assert!(cvs.write_cv(1024, 0).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct RamCvStore {
    bytes: [u8; CV_SPACE as usize],
    /// Number of successful writes.
    pub write_count: usize,
}

impl RamCvStore {
    /// Creates a blank store.
    pub fn new() -> Self {
        Self {
            bytes: [0; CV_SPACE as usize],
            write_count: 0,
        }
    }

    /// Creates a store from a CV image. Bytes past the CV space are dropped.
    pub fn from_image(image: &[u8]) -> Self {
        let mut store = Self::new();
        let len = image.len().min(store.bytes.len());
        store.bytes[..len].copy_from_slice(&image[..len]);
        store
    }

    /// The whole CV image.
    pub fn image(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for RamCvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CvStore for RamCvStore {
    type Error = CvOutOfRange;

    fn read_cv(&self, cv: u16) -> u8 {
        self.bytes.get(usize::from(cv)).copied().unwrap_or(0)
    }

    fn write_cv(&mut self, cv: u16, value: u8) -> Result<(), CvOutOfRange> {
        let slot = self.bytes.get_mut(usize::from(cv)).ok_or(CvOutOfRange(cv))?;
        *slot = value;
        self.write_count += 1;
        Ok(())
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Mock clock for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use rs_signals::hal::MockClock;
/// use rs_signals::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(65_500);
/// clock.advance(56);
/// assert_eq!(clock.now_ms(), 65_556);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Mock output driver that records every frame it receives.
#[derive(Debug, Default)]
pub struct MockOutputs {
    /// Frames in the order they were written.
    pub frames: Vec<OutputFrame>,
    /// Fade rate most recently set.
    pub fade_rate: Option<u8>,
    /// Fail every write when set.
    pub fail: bool,
}

impl MockOutputs {
    /// Creates a driver with no recorded frames.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent frame.
    pub fn last_frame(&self) -> Option<&OutputFrame> {
        self.frames.last()
    }

    /// True if the most recent frame drives `output`.
    pub fn is_lit(&self, output: usize) -> bool {
        self.last_frame()
            .and_then(|frame| frame.get(output / 8))
            .is_some_and(|byte| byte & (1 << (output % 8)) != 0)
    }
}

impl OutputDriver for MockOutputs {
    type Error = ();

    fn write_outputs(&mut self, frame: &OutputFrame) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.frames.push(*frame);
        Ok(())
    }

    fn set_fade_rate(&mut self, rate: u8) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.fade_rate = Some(rate);
        Ok(())
    }
}
