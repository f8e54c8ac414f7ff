use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
#[non_exhaustive]
/// Fault representation for the interpreter.
///
/// A fault is recoverable: it unwinds through the active frames looking for
/// an exception handler, and only surfaces to the host when nothing catches
/// it.
pub enum Fault {
    /// The byte can't be mapped to any known `Fault`.
    Unknown = 0x00,
    /// Dereference of the null reference.
    NullPointer = 0x01,
    /// Array access past the array length, or a saved-PC slot out of range.
    IndexOutOfBounds = 0x02,
    /// Write of an incompatible reference into a reference array.
    ArrayStore = 0x03,
    /// The operand of a failed `checkcast`.
    ClassCast = 0x04,
    /// Array allocation with a negative length.
    NegativeArraySize = 0x05,
    /// The operand stack or locals region exceeds its reservation.
    StackOverflow = 0x06,
    /// Pop from an empty operand region.
    StackUnderflow = 0x07,
    /// Firewall denial, a reused jsr slot, an unexpected constant-pool tag,
    /// a malformed CAP structure, or an abstract-slot chain reaching the
    /// root class.
    Security = 0x08,
    /// Division or remainder by zero.
    Arithmetic = 0x09,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<u8> for Fault {
    /// Converts the `u8` into a `Fault`.
    fn from(b: u8) -> Self {
        use Fault::*;
        match b {
            0x01 => NullPointer,
            0x02 => IndexOutOfBounds,
            0x03 => ArrayStore,
            0x04 => ClassCast,
            0x05 => NegativeArraySize,
            0x06 => StackOverflow,
            0x07 => StackUnderflow,
            0x08 => Security,
            0x09 => Arithmetic,
            _ => Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_u8_fault_round_trip() {
        let last_known_fault: u8 = Fault::iter().last().unwrap() as u8 + 1;
        let fault = Fault::from(0);
        assert_eq!(fault, Fault::Unknown);

        for i in 1..last_known_fault {
            let fault = Fault::from(i);
            let i2 = fault as u8;
            assert_eq!(i, i2);
        }
        for i in last_known_fault..=255 {
            let fault = Fault::from(i);
            let i2 = fault as u8;
            assert_eq!(Fault::Unknown as u8, i2);
        }
    }
}
