//! Hardware abstraction traits for configuration storage, output driving and time.
//!
//! These traits are the seams between the decoder core and the board it runs
//! on. The core never touches EEPROM, GPIO or timers directly.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`CvStore`] | Persisted configuration bytes (CVs) |
//! | [`OutputDriver`] | Physical light outputs (shift registers, GPIO) |
//! | [`Clock`] | Time source for `no_std` environments |
//!
//! # Implementation
//!
//! For testing and desktop development, use the implementations from
//! [`crate::hal::mock`]. With the `shift-register` feature,
//! `hal::ShiftRegisterOutputs` drives chained 74HC595 registers through
//! `embedded-hal` pins.
//!
//! # Example
//!
//! ```rust
//! use rs_signals::traits::CvStore;
//! use rs_signals::hal::RamCvStore;
//!
//! let mut cvs = RamCvStore::new();
//! cvs.write_cv(41, 3).unwrap();
//! assert_eq!(cvs.read_cv(41), 3);
//!
//! // Reads outside the CV space never fail
//! assert_eq!(cvs.read_cv(5000), 0);
//! ```

use crate::light::OutputFrame;

/// Persisted configuration variable storage.
///
/// CVs are single bytes addressed by a 16-bit CV number. On hardware this
/// is usually EEPROM or flash; the decoder core only needs byte access.
///
/// # Implementation Notes
///
/// - `read_cv` must not fail: return 0 for CVs the store does not hold.
///   Every reader in the core treats 0 as "unassigned" or "derive".
/// - `write_cv` may fail (worn EEPROM, CV outside the store).
pub trait CvStore {
    /// Error type for write operations.
    type Error;

    /// Read one CV. Unknown CVs read as 0.
    fn read_cv(&self, cv: u16) -> u8;

    /// Write one CV.
    fn write_cv(&mut self, cv: u16, value: u8) -> Result<(), Self::Error>;

    /// Write a run of consecutive CVs starting at `start`.
    fn write_cvs(&mut self, start: u16, values: &[u8]) -> Result<(), Self::Error> {
        for (cv, &value) in (start..).zip(values) {
            self.write_cv(cv, value)?;
        }
        Ok(())
    }
}

/// Physical output driver.
///
/// The decoder packs the on/off state of every output into an
/// [`OutputFrame`] (output 0 is bit 0 of byte 0) and hands it to the driver
/// once per driver tick. Fading and electrical timing are the driver's
/// business; the decoder passes the configured fade rate with every frame
/// through [`set_fade_rate`](OutputDriver::set_fade_rate).
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_signals::traits::OutputDriver;
/// use rs_signals::OutputFrame;
///
/// struct Leds { /* GPIO handles */ }
///
/// impl OutputDriver for Leds {
///     type Error = ();
///
///     fn write_outputs(&mut self, frame: &OutputFrame) -> Result<(), ()> {
///         // Set pins from frame bits...
///         Ok(())
///     }
/// }
/// ```
pub trait OutputDriver {
    /// Error type for output operations.
    type Error;

    /// Push a complete output frame to the hardware.
    fn write_outputs(&mut self, frame: &OutputFrame) -> Result<(), Self::Error>;

    /// Fade rate for changing outputs, 0 (instant) to 7 (slowest).
    ///
    /// Drivers that switch outputs hard keep the default, which ignores it.
    fn set_fade_rate(&mut self, rate: u8) -> Result<(), Self::Error> {
        let _ = rate;
        Ok(())
    }

    /// Convenience method to switch every output off.
    fn all_off(&mut self) -> Result<(), Self::Error> {
        self.write_outputs(&OutputFrame::default())
    }
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds. The decoder only keeps the low
/// 16 bits of it for debounce stamps, so the epoch does not matter.
///
/// # Example
///
/// ```rust
/// use rs_signals::traits::Clock;
/// use rs_signals::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}
