//! Address and code arithmetic.
//!
//! Every mast listens on a run of consecutive accessory addresses. How the
//! addresses and the received value combine into a *code* depends on the
//! mast's [`ControlStyle`]:
//!
//! | Style | Addresses for `n` codes | Code from (offset `k`, value `d`) |
//! |-------|-------------------------|-----------------------------------|
//! | [`Bitwise`](ControlStyle::Bitwise) | `ceil(log2 n)` | bit `k` := `d` |
//! | [`TurnoutNoDirection`](ControlStyle::TurnoutNoDirection) | `n` | `k` |
//! | [`ExtendedPacket`](ControlStyle::ExtendedPacket) | 1 | `d` |
//! | [`Turnout`](ControlStyle::Turnout) | `ceil(n / 2)` | `2k + d` |
//!
//! # Example
//!
//! ```rust
//! use rs_signals::addressing::{code_from_command, required_addr_count, ControlStyle};
//!
//! assert_eq!(required_addr_count(8, ControlStyle::Bitwise), 3);
//! assert_eq!(required_addr_count(8, ControlStyle::Turnout), 4);
//!
//! // Second address of a turnout-controlled mast, "thrown"
//! assert_eq!(code_from_command(ControlStyle::Turnout, 1, 1, 0), Some(3));
//! ```

use heapless::Vec;

use crate::catalog::CONTROL_STYLE_MASK;
use crate::layout::{MAX_ASPECTS, NUM_SIGNAL_MAST};

/// Most addresses a single mast may occupy.
pub const MAX_ADDRESSES_PER_MAST: u8 = MAX_ASPECTS as u8;

/// Last valid accessory output address (11 bits).
pub const MAX_ADDRESS: u16 = 0x07ff;

/// Offset Roco command stations add to accessory addresses.
pub const ROCO_ADDRESS_SHIFT: u16 = 4;

/// How a mast turns addressed commands into codes. Bits 5-6 of the mast
/// type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum ControlStyle {
    /// Each address carries one bit of the code.
    #[default]
    Bitwise = 0x00,
    /// Each address selects one code; the direction is ignored.
    TurnoutNoDirection = 0x20,
    /// One address; the extended packet value is the code.
    ExtendedPacket = 0x40,
    /// Each address selects two codes, one per direction.
    Turnout = 0x60,
}

impl ControlStyle {
    /// Extract the style from a mast type byte.
    pub const fn from_type_byte(byte: u8) -> Self {
        match byte & CONTROL_STYLE_MASK {
            0x00 => Self::Bitwise,
            0x20 => Self::TurnoutNoDirection,
            0x40 => Self::ExtendedPacket,
            _ => Self::Turnout,
        }
    }

    /// The style's bits, positioned for a mast type byte.
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Minimum number of addresses that distinguish `codes` codes.
///
/// Never less than 1, so that every mast can be addressed.
pub fn required_addr_count(codes: u8, style: ControlStyle) -> u8 {
    let codes = codes.max(1);
    match style {
        ControlStyle::Bitwise => {
            let mut bits = 1;
            while (1u16 << bits) < u16::from(codes) {
                bits += 1;
            }
            bits
        }
        ControlStyle::TurnoutNoDirection => codes.min(MAX_ADDRESSES_PER_MAST),
        ControlStyle::Turnout => codes.div_ceil(2),
        ControlStyle::ExtendedPacket => 1,
    }
}

/// Number of codes `addresses` addresses can express, capped at
/// [`MAX_ASPECTS`].
pub fn codes_for_addresses(addresses: u8, style: ControlStyle) -> u8 {
    if addresses == 0 {
        return 0;
    }
    let cap = MAX_ASPECTS as u16;
    let codes = match style {
        ControlStyle::Bitwise => {
            if addresses >= 6 {
                cap
            } else {
                1u16 << addresses
            }
        }
        ControlStyle::TurnoutNoDirection => u16::from(addresses),
        ControlStyle::Turnout => u16::from(addresses) * 2,
        ControlStyle::ExtendedPacket => cap,
    };
    codes.min(cap) as u8
}

/// Combine a command on the mast's `offset`-th address with `value` into a
/// code.
///
/// `base` is the code bitwise commands modify. Returns `None` when the
/// result cannot be a code.
pub fn code_from_command(style: ControlStyle, offset: u8, value: u8, base: u8) -> Option<u8> {
    let code = match style {
        ControlStyle::Bitwise => {
            if offset >= 5 {
                return None;
            }
            let bit = 1u8 << offset;
            if value != 0 {
                base | bit
            } else {
                base & !bit
            }
        }
        ControlStyle::TurnoutNoDirection => offset,
        ControlStyle::Turnout => offset.checked_mul(2)?.checked_add(value.min(1))?,
        ControlStyle::ExtendedPacket => {
            if offset != 0 {
                return None;
            }
            value
        }
    };
    (usize::from(code) < MAX_ASPECTS).then_some(code)
}

/// Apply the Roco address shift.
pub fn normalize_address(address: u16, roco: bool) -> u16 {
    if roco {
        address.saturating_add(ROCO_ADDRESS_SHIFT)
    } else {
        address
    }
}

/// Mast and address offset an accessory address resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressTarget {
    /// Mast index.
    pub mast: usize,
    /// Offset of the address within the mast's run.
    pub offset: u8,
}

/// Addresses occupied by each mast.
///
/// Masts occupy consecutive address runs starting at the decoder's first
/// output address, in mast order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressMap {
    first: u16,
    runs: Vec<(u16, u8), NUM_SIGNAL_MAST>,
}

impl AddressMap {
    /// Lay out masts with the given address counts from `first`.
    ///
    /// Masts past [`NUM_SIGNAL_MAST`] are ignored.
    pub fn new(first: u16, counts: &[u8]) -> Self {
        let mut runs = Vec::new();
        let mut next = first;
        for &count in counts.iter().take(NUM_SIGNAL_MAST) {
            // Capacity equals the `take` above
            let _ = runs.push((next, count));
            next = next.saturating_add(u16::from(count));
        }
        Self { first, runs }
    }

    /// First address of the decoder.
    pub fn first_address(&self) -> u16 {
        self.first
    }

    /// Number of masts in the map.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True if no mast is mapped.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Find the mast listening on `address`.
    pub fn resolve(&self, address: u16) -> Option<AddressTarget> {
        self.runs
            .iter()
            .enumerate()
            .find_map(|(mast, &(start, count))| {
                let offset = address.checked_sub(start)?;
                (offset < u16::from(count)).then_some(AddressTarget {
                    mast,
                    offset: offset as u8,
                })
            })
    }

    /// First address and address count of a mast.
    pub fn mast_address(&self, mast: usize) -> Option<(u16, u8)> {
        self.runs.get(mast).copied()
    }

    /// One past the last address in use.
    pub fn end_address(&self) -> u16 {
        self.runs
            .last()
            .map_or(self.first, |&(start, count)| start.saturating_add(u16::from(count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: [ControlStyle; 4] = [
        ControlStyle::Bitwise,
        ControlStyle::TurnoutNoDirection,
        ControlStyle::ExtendedPacket,
        ControlStyle::Turnout,
    ];

    // =========================================================================
    // Control Style Tests
    // =========================================================================

    #[test]
    fn style_from_type_byte() {
        assert_eq!(ControlStyle::from_type_byte(0x81), ControlStyle::Bitwise);
        assert_eq!(ControlStyle::from_type_byte(0xa1), ControlStyle::TurnoutNoDirection);
        assert_eq!(ControlStyle::from_type_byte(0x41), ControlStyle::ExtendedPacket);
        assert_eq!(ControlStyle::from_type_byte(0x7f), ControlStyle::Turnout);
        for style in STYLES {
            assert_eq!(ControlStyle::from_type_byte(style.bits() | 0x9f), style);
        }
    }

    // =========================================================================
    // Count Tests
    // =========================================================================

    #[test]
    fn addresses_always_cover_codes() {
        for style in STYLES {
            for codes in 1..MAX_ASPECTS as u8 {
                let addresses = required_addr_count(codes, style);
                assert!(addresses >= 1);
                assert!(
                    codes_for_addresses(addresses, style) >= codes,
                    "{:?}: {} codes in {} addresses",
                    style,
                    codes,
                    addresses
                );
            }
        }
    }

    #[test]
    fn bitwise_counts() {
        assert_eq!(required_addr_count(1, ControlStyle::Bitwise), 1);
        assert_eq!(required_addr_count(2, ControlStyle::Bitwise), 1);
        assert_eq!(required_addr_count(3, ControlStyle::Bitwise), 2);
        assert_eq!(required_addr_count(8, ControlStyle::Bitwise), 3);
        assert_eq!(required_addr_count(9, ControlStyle::Bitwise), 4);
        assert_eq!(required_addr_count(31, ControlStyle::Bitwise), 5);
        assert_eq!(codes_for_addresses(3, ControlStyle::Bitwise), 8);
        assert_eq!(codes_for_addresses(7, ControlStyle::Bitwise), 32);
    }

    #[test]
    fn zero_codes_still_need_an_address() {
        for style in STYLES {
            assert_eq!(required_addr_count(0, style), 1);
            assert_eq!(codes_for_addresses(0, style), 0);
        }
    }

    #[test]
    fn turnout_counts() {
        assert_eq!(required_addr_count(5, ControlStyle::Turnout), 3);
        assert_eq!(required_addr_count(6, ControlStyle::Turnout), 3);
        assert_eq!(codes_for_addresses(3, ControlStyle::Turnout), 6);
        assert_eq!(codes_for_addresses(20, ControlStyle::Turnout), 32);
        assert_eq!(required_addr_count(31, ControlStyle::TurnoutNoDirection), 31);
    }

    // =========================================================================
    // Code Tests
    // =========================================================================

    #[test]
    fn bitwise_codes_accumulate() {
        let code = code_from_command(ControlStyle::Bitwise, 0, 1, 0).unwrap();
        let code = code_from_command(ControlStyle::Bitwise, 1, 1, code).unwrap();
        assert_eq!(code, 3);
        let code = code_from_command(ControlStyle::Bitwise, 0, 0, code).unwrap();
        assert_eq!(code, 2);
        assert_eq!(code_from_command(ControlStyle::Bitwise, 5, 1, 0), None);
    }

    #[test]
    fn direct_codes() {
        assert_eq!(code_from_command(ControlStyle::TurnoutNoDirection, 4, 0, 9), Some(4));
        assert_eq!(code_from_command(ControlStyle::TurnoutNoDirection, 4, 1, 9), Some(4));
        assert_eq!(code_from_command(ControlStyle::Turnout, 2, 0, 0), Some(4));
        assert_eq!(code_from_command(ControlStyle::Turnout, 16, 0, 0), None);
        assert_eq!(code_from_command(ControlStyle::ExtendedPacket, 0, 17, 0), Some(17));
        assert_eq!(code_from_command(ControlStyle::ExtendedPacket, 0, 32, 0), None);
        assert_eq!(code_from_command(ControlStyle::ExtendedPacket, 1, 3, 0), None);
    }

    #[test]
    fn roco_shift() {
        assert_eq!(normalize_address(100, false), 100);
        assert_eq!(normalize_address(100, true), 104);
        assert_eq!(normalize_address(u16::MAX, true), u16::MAX);
    }

    // =========================================================================
    // Address Map Tests
    // =========================================================================

    #[test]
    fn map_resolves_consecutive_runs() {
        let map = AddressMap::new(100, &[3, 1, 4]);

        assert_eq!(map.resolve(99), None);
        assert_eq!(map.resolve(100), Some(AddressTarget { mast: 0, offset: 0 }));
        assert_eq!(map.resolve(102), Some(AddressTarget { mast: 0, offset: 2 }));
        assert_eq!(map.resolve(103), Some(AddressTarget { mast: 1, offset: 0 }));
        assert_eq!(map.resolve(107), Some(AddressTarget { mast: 2, offset: 3 }));
        assert_eq!(map.resolve(108), None);
        assert_eq!(map.mast_address(2), Some((104, 4)));
        assert_eq!(map.end_address(), 108);
    }

    #[test]
    fn map_skips_masts_without_addresses() {
        let map = AddressMap::new(10, &[2, 0, 1]);
        assert_eq!(map.resolve(12), Some(AddressTarget { mast: 2, offset: 0 }));
        assert_eq!(map.mast_address(1), Some((12, 0)));
    }

    #[test]
    fn map_caps_mast_count() {
        let counts = [1u8; NUM_SIGNAL_MAST + 4];
        let map = AddressMap::new(0, &counts);
        assert_eq!(map.len(), NUM_SIGNAL_MAST);
        assert_eq!(map.resolve(NUM_SIGNAL_MAST as u16), None);
    }
}
