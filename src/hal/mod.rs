//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: RAM CV store and test doubles for desktop development
//! - `shift_register`: 74HC595 output chain over `embedded-hal` pins
//!   (requires `shift-register` feature)

pub mod mock;

#[cfg(feature = "shift-register")]
pub mod shift_register;

pub use mock::*;

#[cfg(feature = "shift-register")]
pub use shift_register::ShiftRegisterOutputs;
