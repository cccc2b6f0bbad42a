//! Trait definitions for hardware abstraction.
//!
//! This module defines the abstractions that allow rs-signals to:
//! - Run on different hardware (AVR/ESP boards, desktop simulation)
//! - Keep configuration in EEPROM, flash or RAM
//! - Drive outputs through shift registers or plain GPIO
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`CvStore`]: Persisted configuration variables
//! - [`OutputDriver`]: Physical light outputs
//! - [`Clock`]: Time source for `no_std` environments

pub mod hardware;

pub use hardware::*;
