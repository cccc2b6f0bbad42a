//! Error types.
//!
//! The runtime path (commands, ticks, queries) never fails; only
//! configuration writes and storage access return errors.

use core::fmt;

/// A CV number outside the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CvOutOfRange(pub u16);

impl fmt::Display for CvOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CV {} out of range", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CvOutOfRange {}

/// Rejected configuration write.
///
/// `E` is the error type of the [`CvStore`](crate::traits::CvStore).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError<E> {
    /// No such mast.
    InvalidMast(usize),
    /// Output number past the last output.
    InvalidOutput(u8),
    /// Aspect or code the mast cannot show.
    InvalidAspect(u8),
    /// Type byte naming no mast prototype or signal set.
    InvalidMastType(u8),
    /// Light slot past the mast's slots.
    InvalidLight(usize),
    /// Another mast already drives the output.
    OutputInUse {
        /// The 1-based output number.
        output: u8,
        /// Mast owning it.
        mast: usize,
    },
    /// The decoder key does not match the decoder lock.
    Locked,
    /// The store rejected a write.
    Storage(E),
}

impl<E: fmt::Display> fmt::Display for ConfigError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMast(mast) => write!(f, "invalid mast {}", mast),
            Self::InvalidOutput(output) => write!(f, "invalid output {}", output),
            Self::InvalidAspect(aspect) => write!(f, "invalid aspect {}", aspect),
            Self::InvalidMastType(mast_type) => write!(f, "invalid mast type {:#04x}", mast_type),
            Self::InvalidLight(light) => write!(f, "invalid light slot {}", light),
            Self::OutputInUse { output, mast } => {
                write!(f, "output {} already used by mast {}", output, mast)
            }
            Self::Locked => write!(f, "decoder locked"),
            Self::Storage(e) => write!(f, "CV storage error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug + fmt::Display> std::error::Error for ConfigError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        use alloc::string::ToString;

        assert_eq!(CvOutOfRange(2000).to_string(), "CV 2000 out of range");
        let err: ConfigError<CvOutOfRange> = ConfigError::OutputInUse { output: 7, mast: 2 };
        assert_eq!(err.to_string(), "output 7 already used by mast 2");
        let err: ConfigError<CvOutOfRange> = ConfigError::InvalidMastType(0x9e);
        assert_eq!(err.to_string(), "invalid mast type 0x9e");
        let err: ConfigError<CvOutOfRange> = ConfigError::Locked;
        assert_eq!(err.to_string(), "decoder locked");
        let err: ConfigError<CvOutOfRange> = ConfigError::Storage(CvOutOfRange(1024));
        assert_eq!(err.to_string(), "CV storage error: CV 1024 out of range");
    }
}
