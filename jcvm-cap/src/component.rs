//! Component framing and primitive readers.

use jcvm_asm::Fault;

/// Tag byte of a CAP component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComponentTag {
    /// Package identity and CAP version.
    Header = 1,
    /// Class and interface descriptors.
    Class = 3,
    /// Imported package AIDs.
    Import = 4,
    /// Exception handlers and method bodies.
    Method = 5,
    /// Symbolic references of the package.
    ConstantPool = 7,
    /// Static field image layout and initial values.
    StaticField = 8,
    /// Token-to-code-offset maps.
    ReferenceLocation = 9,
    /// Classes and statics visible to other packages.
    Export = 10,
    /// Optional descriptions backing dynamic checks.
    Descriptor = 11,
}

impl ComponentTag {
    /// Map a tag byte to a known component tag.
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Header),
            3 => Some(Self::Class),
            4 => Some(Self::Import),
            5 => Some(Self::Method),
            7 => Some(Self::ConstantPool),
            8 => Some(Self::StaticField),
            9 => Some(Self::ReferenceLocation),
            10 => Some(Self::Export),
            11 => Some(Self::Descriptor),
            _ => None,
        }
    }
}

pub(crate) fn read_u8(bytes: &[u8], at: usize) -> Result<u8, Fault> {
    bytes.get(at).copied().ok_or(Fault::Security)
}

pub(crate) fn read_u16(bytes: &[u8], at: usize) -> Result<u16, Fault> {
    let raw = bytes.get(at..at + 2).ok_or(Fault::Security)?;
    Ok(u16::from_be_bytes([raw[0], raw[1]]))
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> Result<u32, Fault> {
    let raw = bytes.get(at..at + 4).ok_or(Fault::Security)?;
    Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

pub(crate) fn read_slice(bytes: &[u8], at: usize, len: usize) -> Result<&[u8], Fault> {
    bytes.get(at..at + len).ok_or(Fault::Security)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_reads_are_big_endian() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(read_u8(&bytes, 4).unwrap(), 0x05);
        assert_eq!(read_u16(&bytes, 1).unwrap(), 0x0203);
        assert_eq!(read_u32(&bytes, 0).unwrap(), 0x01020304);
    }

    #[test]
    fn out_of_component_reads_fault() {
        let bytes = [0xAA];
        assert_eq!(read_u8(&bytes, 1), Err(Fault::Security));
        assert_eq!(read_u16(&bytes, 0), Err(Fault::Security));
        assert_eq!(read_u32(&bytes, 0), Err(Fault::Security));
        assert_eq!(read_slice(&bytes, 0, 2), Err(Fault::Security));
    }

    #[test]
    fn known_tags_round_trip() {
        for tag in [1u8, 3, 4, 5, 7, 8, 9, 10, 11] {
            assert_eq!(ComponentTag::from_u8(tag).unwrap() as u8, tag);
        }
        assert!(ComponentTag::from_u8(0).is_none());
        assert!(ComponentTag::from_u8(2).is_none());
        assert!(ComponentTag::from_u8(12).is_none());
    }
}
