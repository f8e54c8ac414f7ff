//! The Constant Pool component: the package's symbolic references.

use jcvm_asm::Fault;
use jcvm_types::{CpOffset, Token};

use crate::class::ClassRef;
use crate::component::read_u16;

/// Tag byte of a constant-pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CpTag {
    /// A class or interface reference.
    Classref = 1,
    /// An instance field reference.
    InstanceFieldref = 2,
    /// A virtual method reference.
    VirtualMethodref = 3,
    /// A superclass method reference.
    SuperMethodref = 4,
    /// A static field reference.
    StaticFieldref = 5,
    /// A static or statically-linked method reference.
    StaticMethodref = 6,
}

/// One raw 4-byte constant-pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpEntry {
    /// The entry tag byte.
    pub tag: u8,
    /// The three info bytes, interpreted per tag.
    pub info: [u8; 3],
}

impl CpEntry {
    /// The class reference of a Classref, field-ref or method-ref entry.
    pub fn class_ref(&self) -> ClassRef {
        ClassRef::from_u16(u16::from_be_bytes([self.info[0], self.info[1]]))
    }

    /// The token byte of a field-ref or method-ref entry.
    pub fn token(&self) -> Token {
        self.info[2]
    }

    /// The static reference of a StaticFieldref or StaticMethodref entry.
    pub fn static_ref(&self) -> StaticRef {
        if self.info[0] & 0x80 != 0 {
            StaticRef::External {
                package_token: self.info[0] & 0x7F,
                class_token: self.info[1],
                token: self.info[2],
            }
        } else {
            StaticRef::Internal {
                offset: u16::from_be_bytes([self.info[1], self.info[2]]),
            }
        }
    }
}

/// A resolved-form static field or method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticRef {
    /// An offset into this package's Method or StaticField info area.
    Internal {
        /// The in-image offset.
        offset: u16,
    },
    /// A token triple resolved through the Import and Export components.
    External {
        /// 7-bit token into the Import component.
        package_token: u8,
        /// Class token into the foreign Export component.
        class_token: u8,
        /// Static field or method token within the exported class.
        token: u8,
    },
}

/// A virtual or super method reference: a class and a method token.
///
/// The token's high bit selects the package-visible method table; public
/// tokens have it clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualMethodRef {
    /// The class introducing the method.
    pub class_ref: ClassRef,
    /// The raw method token.
    pub token: Token,
}

impl VirtualMethodRef {
    /// Whether the token addresses the public method table.
    pub const fn is_public(&self) -> bool {
        self.token & 0x80 == 0
    }

    /// The token value within its table's token space.
    pub const fn table_token(&self) -> u8 {
        self.token & 0x7F
    }
}

/// The Constant Pool component: `count` 4-byte tag-discriminated entries.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPoolComponent<'a> {
    info: &'a [u8],
}

impl<'a> ConstantPoolComponent<'a> {
    const ENTRY_SIZE: usize = 4;

    pub(crate) const fn new(info: &'a [u8]) -> Self {
        Self { info }
    }

    /// Number of entries.
    pub fn count(&self) -> Result<u16, Fault> {
        read_u16(self.info, 0)
    }

    /// The raw entry at `offset`, bounds-checked.
    pub fn entry(&self, offset: CpOffset) -> Result<CpEntry, Fault> {
        if offset >= self.count()? {
            return Err(Fault::Security);
        }
        let at = 2 + offset as usize * Self::ENTRY_SIZE;
        let raw = self.info.get(at..at + Self::ENTRY_SIZE).ok_or(Fault::Security)?;
        Ok(CpEntry {
            tag: raw[0],
            info: [raw[1], raw[2], raw[3]],
        })
    }

    fn typed_entry(&self, offset: CpOffset, tag: CpTag) -> Result<CpEntry, Fault> {
        let entry = self.entry(offset)?;
        if entry.tag != tag as u8 {
            return Err(Fault::Security);
        }
        Ok(entry)
    }

    /// The Classref entry at `offset`.
    pub fn class_ref(&self, offset: CpOffset) -> Result<ClassRef, Fault> {
        Ok(self.typed_entry(offset, CpTag::Classref)?.class_ref())
    }

    /// The InstanceFieldref entry at `offset`.
    pub fn instance_field_ref(&self, offset: CpOffset) -> Result<(ClassRef, Token), Fault> {
        let entry = self.typed_entry(offset, CpTag::InstanceFieldref)?;
        Ok((entry.class_ref(), entry.token()))
    }

    /// The VirtualMethodref entry at `offset`.
    pub fn virtual_method_ref(&self, offset: CpOffset) -> Result<VirtualMethodRef, Fault> {
        let entry = self.typed_entry(offset, CpTag::VirtualMethodref)?;
        Ok(VirtualMethodRef {
            class_ref: entry.class_ref(),
            token: entry.token(),
        })
    }

    /// The SuperMethodref entry at `offset`.
    pub fn super_method_ref(&self, offset: CpOffset) -> Result<VirtualMethodRef, Fault> {
        let entry = self.typed_entry(offset, CpTag::SuperMethodref)?;
        Ok(VirtualMethodRef {
            class_ref: entry.class_ref(),
            token: entry.token(),
        })
    }

    /// The StaticFieldref entry at `offset`.
    pub fn static_field_ref(&self, offset: CpOffset) -> Result<StaticRef, Fault> {
        Ok(self.typed_entry(offset, CpTag::StaticFieldref)?.static_ref())
    }

    /// The StaticMethodref entry at `offset`.
    pub fn static_method_ref(&self, offset: CpOffset) -> Result<StaticRef, Fault> {
        Ok(self.typed_entry(offset, CpTag::StaticMethodref)?.static_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> Vec<u8> {
        let mut info = vec![0x00, 0x04]; // four entries
        info.extend_from_slice(&[CpTag::Classref as u8, 0x00, 0x05, 0x00]);
        info.extend_from_slice(&[CpTag::VirtualMethodref as u8, 0x00, 0x05, 0x81]);
        info.extend_from_slice(&[CpTag::StaticMethodref as u8, 0x00, 0x00, 0x10]);
        info.extend_from_slice(&[CpTag::StaticMethodref as u8, 0x82, 0x01, 0x03]);
        info
    }

    #[test]
    fn typed_accessors_check_the_tag() {
        let info = sample_info();
        let cp = ConstantPoolComponent::new(&info);

        assert_eq!(cp.count().unwrap(), 4);
        assert_eq!(cp.class_ref(0).unwrap().to_u16(), 0x0005);
        assert_eq!(cp.class_ref(1), Err(Fault::Security));
        assert_eq!(cp.virtual_method_ref(0), Err(Fault::Security));
        assert_eq!(cp.static_field_ref(2), Err(Fault::Security));
    }

    #[test]
    fn virtual_ref_token_visibility() {
        let info = sample_info();
        let cp = ConstantPoolComponent::new(&info);

        let vref = cp.virtual_method_ref(1).unwrap();
        assert!(!vref.is_public());
        assert_eq!(vref.table_token(), 1);
    }

    #[test]
    fn static_refs_split_on_the_high_bit() {
        let info = sample_info();
        let cp = ConstantPoolComponent::new(&info);

        assert_eq!(
            cp.static_method_ref(2).unwrap(),
            StaticRef::Internal { offset: 0x0010 }
        );
        assert_eq!(
            cp.static_method_ref(3).unwrap(),
            StaticRef::External {
                package_token: 2,
                class_token: 1,
                token: 3,
            }
        );
    }

    #[test]
    fn out_of_pool_offsets_fault() {
        let info = sample_info();
        let cp = ConstantPoolComponent::new(&info);
        assert_eq!(cp.entry(4), Err(Fault::Security));
    }
}
