//! # rs-signals
//!
//! Core of a DCC accessory decoder that drives the lights of up to 16
//! railway signal masts.
//!
//! ## Features
//!
//! - **Compact CV layout**: Per-mast records, output bases and aspect tables
//!   in 1024 CVs, with overlap checked at compile time
//! - **Signal sets**: ČSD/SŽDC light signals and semaphores with configurable
//!   code to aspect tables
//! - **Debounce**: Bursts of accessory commands settle into one aspect after
//!   a configurable lag
//! - **Blinking lights**: 1-byte light states with four blink cadences
//! - **Control styles**: Bitwise, turnout and extended-packet addressing
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - CV storage, output and clock abstractions
//! - `catalog` - Compiled-in signal sets and mast prototypes
//! - `layout` - CV layout, template writers and factory defaults
//! - `addressing` - Address and code arithmetic
//! - `mast` - Per-mast debounce state machine
//! - `light` - Per-output light state machine
//! - `decoder` - Main context object that ties everything together
//! - `hal` - Concrete implementations (RAM store and mocks, shift registers)
//!
//! ## Example
//!
//! ```rust
//! use rs_signals::{SignalDecoder, hal::RamCvStore};
//! use rs_signals::catalog::csd;
//!
//! // Blank store: start() writes the factory defaults
//! let mut decoder = SignalDecoder::new(RamCvStore::new());
//! decoder.start().unwrap();
//!
//! // Set bit 0 of the first mast's code
//! decoder.on_address_command(100, 1, 0);
//!
//! // Update in your main loop
//! decoder.tick(200);
//! assert_eq!(decoder.mast(0).unwrap().current_aspect(), csd::CLEAR);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Address and code arithmetic for the control styles.
pub mod addressing;
/// Compiled-in signal sets and mast prototypes.
pub mod catalog;
/// Global decoder configuration.
pub mod config;
/// Main decoder that coordinates masts, lights and configuration.
pub mod decoder;
/// Error types for configuration writes and storage.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// CV layout, template writers and factory defaults.
pub mod layout;
/// Per-output light state machine.
pub mod light;
/// Per-mast aspect debounce.
pub mod mast;
/// Core traits for hardware abstraction.
pub mod traits;

// Re-exports for convenience
pub use addressing::{AddressMap, AddressTarget, ControlStyle};
pub use catalog::{MastType, MastTypeDefinition, SignalSet};
pub use config::DecoderConfig;
pub use decoder::{CodeWrite, SettledAspect, SignalDecoder, TickReport};
pub use error::{ConfigError, CvOutOfRange};
pub use layout::MastSettings;
pub use light::{LightBank, LightFunction, LightSign, OutputFrame};
pub use mast::{AspectLag, MastState, SignalMastData};
pub use traits::{Clock, CvStore, OutputDriver};
