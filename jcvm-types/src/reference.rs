//! Tagged 16-bit object references.

use crate::JWord;

/// What a non-null reference designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// A class instance.
    Instance,
    /// An array of primitive values.
    PrimitiveArray,
    /// An array of references.
    ReferenceArray,
}

/// Element type of an array object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrayKind {
    /// One byte per element, values 0 or 1.
    Boolean,
    /// One byte per element.
    Byte,
    /// Two bytes per element.
    Short,
    /// Four bytes per element.
    Int,
    /// One reference word per element.
    Reference,
}

impl ArrayKind {
    /// Storage width of one element, in bytes.
    pub const fn element_size(self) -> usize {
        match self {
            ArrayKind::Boolean | ArrayKind::Byte => 1,
            ArrayKind::Short | ArrayKind::Reference => 2,
            ArrayKind::Int => 4,
        }
    }
}

/// A tagged 16-bit object reference.
///
/// This is the only representation of an object the bytecode ever sees: a
/// handle, not a pointer. The all-zero value is the null sentinel and is
/// distinct from every valid encoding because heap handles start at 1.
///
/// Bit layout:
///
/// ```text
/// 15      14      13      12..0
/// array   refs    persist handle
/// ```
///
/// `refs` is only meaningful for arrays and distinguishes arrays of
/// references from arrays of primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JRef(u16);

impl JRef {
    /// The null reference.
    pub const NULL: JRef = JRef(0);

    const ARRAY: u16 = 0x8000;
    const REF_ELEMENTS: u16 = 0x4000;
    const PERSISTENT: u16 = 0x2000;
    const HANDLE_MASK: u16 = 0x1FFF;

    /// Largest encodable heap handle.
    pub const MAX_HANDLE: u16 = Self::HANDLE_MASK;

    /// A transient instance reference. `handle` must be non-zero and fit the
    /// handle field.
    pub const fn instance(handle: u16) -> Self {
        Self(handle & Self::HANDLE_MASK)
    }

    /// A transient array reference.
    pub const fn array(handle: u16, of_references: bool) -> Self {
        let mut bits = Self::ARRAY | (handle & Self::HANDLE_MASK);
        if of_references {
            bits |= Self::REF_ELEMENTS;
        }
        Self(bits)
    }

    /// The same reference with the persistent storage tag set.
    pub const fn persistent(self) -> Self {
        Self(self.0 | Self::PERSISTENT)
    }

    /// Reconstruct a reference from its raw stack-word representation.
    pub const fn from_word(word: JWord) -> Self {
        Self(word as u16)
    }

    /// The stack-word representation.
    pub const fn to_word(self) -> JWord {
        self.0 as JWord
    }

    /// The raw bit pattern.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether this is the null sentinel.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Whether this reference designates an array.
    pub const fn is_array(self) -> bool {
        self.0 & Self::ARRAY != 0
    }

    /// Whether this reference designates an array of references.
    pub const fn is_reference_array(self) -> bool {
        self.0 & (Self::ARRAY | Self::REF_ELEMENTS) == (Self::ARRAY | Self::REF_ELEMENTS)
    }

    /// Whether the referenced object lives in persistent storage.
    pub const fn is_persistent(self) -> bool {
        self.0 & Self::PERSISTENT != 0
    }

    /// The heap handle field.
    pub const fn handle(self) -> u16 {
        self.0 & Self::HANDLE_MASK
    }

    /// The kind tag, or `None` for null.
    pub const fn kind(self) -> Option<RefKind> {
        if self.is_null() {
            None
        } else if !self.is_array() {
            Some(RefKind::Instance)
        } else if self.is_reference_array() {
            Some(RefKind::ReferenceArray)
        } else {
            Some(RefKind::PrimitiveArray)
        }
    }
}
