#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! Atomic types of the Java Card VM.
//!
//! A machine word is a signed 16-bit `short`; every operand-stack slot and
//! every local-variable slot holds exactly one word. A 32-bit `int` occupies
//! two adjacent slots, high word first.

mod reference;

pub use reference::{ArrayKind, JRef, RefKind};

/// A Java Card `byte`: signed 8-bit.
pub type JByte = i8;

/// A Java Card `short`: signed 16-bit.
pub type JShort = i16;

/// A Java Card `int`: signed 32-bit. Occupies two machine words.
pub type JInt = i32;

/// A machine word. All stack and local slots are one word.
pub type JWord = i16;

/// Offset of an entry in a package's constant pool.
pub type CpOffset = u16;

/// A virtual-method, interface-method, or field token.
pub type Token = u8;

/// Maximum number of installed packages. Must stay below 256 so a package
/// fits the 7-bit external package token space with room to spare.
pub const MAX_PACKAGES: u8 = 64;

/// Handle of an installed CAP package.
///
/// A `PackageId` resolves to a read-only CAP image through the package
/// registry; it is never a pointer into another package's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageId(u8);

impl PackageId {
    /// Create a package handle, rejecting ids outside the registry bound.
    pub const fn new(id: u8) -> Option<Self> {
        if id < MAX_PACKAGES {
            Some(Self(id))
        } else {
            None
        }
    }

    /// The raw registry index.
    pub const fn to_u8(self) -> u8 {
        self.0
    }
}

/// Identifier of an installed applet; owns one firewall context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppletId(u8);

impl AppletId {
    /// Create an applet identifier.
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// The raw identifier.
    pub const fn to_u8(self) -> u8 {
        self.0
    }
}

/// Byte offset of a class or interface descriptor within the info area of a
/// package's Class component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassIndex(u16);

impl ClassIndex {
    /// Wrap a raw info-area offset.
    pub const fn new(offset: u16) -> Self {
        Self(offset)
    }

    /// The raw info-area offset.
    pub const fn to_u16(self) -> u16 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_id_is_bounded() {
        assert!(PackageId::new(0).is_some());
        assert!(PackageId::new(MAX_PACKAGES - 1).is_some());
        assert!(PackageId::new(MAX_PACKAGES).is_none());
        assert!(PackageId::new(u8::MAX).is_none());
    }

    #[test]
    fn class_index_round_trip() {
        let idx = ClassIndex::new(0x1234);
        assert_eq!(idx.to_u16(), 0x1234);
    }
}
