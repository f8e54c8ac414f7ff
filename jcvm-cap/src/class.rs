//! The Class component: class and interface descriptors.

use bitflags::bitflags;
use jcvm_asm::Fault;
use jcvm_types::{ClassIndex, Token};

use crate::component::{read_u16, read_u8};

/// A class or interface reference as encoded in CAP structures.
///
/// Internal references (high bit clear) are byte offsets into the Class
/// component info area of the package holding the reference. External
/// references (high bit set) carry a 7-bit package token into the Import
/// component and an 8-bit class token into the foreign Export component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassRef(u16);

impl ClassRef {
    const EXTERNAL: u16 = 0x8000;

    /// Wrap a raw encoded reference.
    pub const fn from_u16(raw: u16) -> Self {
        Self(raw)
    }

    /// An internal reference to the descriptor at `offset`.
    pub const fn internal(offset: ClassIndex) -> Self {
        Self(offset.to_u16())
    }

    /// An external reference from package and class tokens.
    pub const fn external(package_token: u8, class_token: u8) -> Self {
        Self(Self::EXTERNAL | ((package_token as u16 & 0x7F) << 8) | class_token as u16)
    }

    /// The raw encoding.
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// Whether this reference crosses into an imported package.
    pub const fn is_external(self) -> bool {
        self.0 & Self::EXTERNAL != 0
    }

    /// The 7-bit package token of an external reference.
    pub const fn package_token(self) -> u8 {
        ((self.0 >> 8) & 0x7F) as u8
    }

    /// The class token of an external reference.
    pub const fn class_token(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// The info-area offset of an internal reference.
    pub const fn internal_offset(self) -> ClassIndex {
        ClassIndex::new(self.0)
    }
}

bitflags! {
    /// Access flags of a class or interface descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFlags: u8 {
        /// The descriptor is an interface.
        const INTERFACE = 0x8;
        /// Instances may be invoked across the firewall.
        const SHAREABLE = 0x4;
        /// The class is remotely accessible.
        const REMOTE = 0x2;
    }
}

/// The info-area sentinel marking the root class: the superclass slot of
/// `Object` holds no valid reference.
pub(crate) const NO_SUPER_CLASS: u16 = 0xFFFF;

/// The Class component: a packed sequence of class and interface
/// descriptors, addressed by their byte offset in the info area.
#[derive(Debug, Clone, Copy)]
pub struct ClassComponent<'a> {
    info: &'a [u8],
}

/// Either kind of descriptor found at an info-area offset.
#[derive(Debug, Clone, Copy)]
pub enum TypeInfo<'a> {
    /// A class descriptor.
    Class(ClassInfo<'a>),
    /// An interface descriptor.
    Interface(InterfaceInfo<'a>),
}

impl<'a> ClassComponent<'a> {
    pub(crate) const fn new(info: &'a [u8]) -> Self {
        Self { info }
    }

    /// The raw info area.
    pub const fn info(&self) -> &'a [u8] {
        self.info
    }

    fn flags_at(&self, offset: ClassIndex) -> Result<ClassFlags, Fault> {
        let packed = read_u8(self.info, offset.to_u16() as usize)?;
        Ok(ClassFlags::from_bits_truncate(packed >> 4))
    }

    /// The descriptor at `offset`, discriminated by its interface flag.
    pub fn type_info(&self, offset: ClassIndex) -> Result<TypeInfo<'a>, Fault> {
        if self.flags_at(offset)?.contains(ClassFlags::INTERFACE) {
            self.interface_info(offset).map(TypeInfo::Interface)
        } else {
            self.class_info(offset).map(TypeInfo::Class)
        }
    }

    /// The class descriptor at `offset`; an interface there is a fault.
    pub fn class_info(&self, offset: ClassIndex) -> Result<ClassInfo<'a>, Fault> {
        if self.flags_at(offset)?.contains(ClassFlags::INTERFACE) {
            return Err(Fault::Security);
        }
        let info = ClassInfo {
            info: self.info,
            at: offset.to_u16() as usize,
        };
        // Force a bounds check over the fixed header and both tables.
        info.interfaces_end()?;
        Ok(info)
    }

    /// The interface descriptor at `offset`; a class there is a fault.
    pub fn interface_info(&self, offset: ClassIndex) -> Result<InterfaceInfo<'a>, Fault> {
        if !self.flags_at(offset)?.contains(ClassFlags::INTERFACE) {
            return Err(Fault::Security);
        }
        let info = InterfaceInfo {
            info: self.info,
            at: offset.to_u16() as usize,
        };
        info.end()?;
        Ok(info)
    }
}

/// A class descriptor.
///
/// ```text
/// flags:4 interface_count:4   u8
/// super_class_ref             u16
/// declared_instance_size      u8
/// first_reference_token       u8
/// reference_count             u8
/// public_method_table_base    u8
/// public_method_table_count   u8
/// package_method_table_base   u8
/// package_method_table_count  u8
/// public_virtual_method_table u16 × count
/// package_virtual_method_table u16 × count
/// interfaces                  implemented-interface records
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ClassInfo<'a> {
    info: &'a [u8],
    at: usize,
}

/// One implemented-interface record of a class: the interface and the map
/// from interface method index to public virtual method token.
#[derive(Debug, Clone, Copy)]
pub struct ImplementedInterface<'a> {
    /// The implemented interface.
    pub interface: ClassRef,
    /// Public method tokens, indexed by interface method index.
    pub indexes: &'a [u8],
}

impl<'a> ClassInfo<'a> {
    const HEADER: usize = 10;

    /// The info-area offset of this descriptor.
    pub fn offset(&self) -> ClassIndex {
        ClassIndex::new(self.at as u16)
    }

    /// Access flags.
    pub fn flags(&self) -> Result<ClassFlags, Fault> {
        Ok(ClassFlags::from_bits_truncate(read_u8(self.info, self.at)? >> 4))
    }

    /// Number of implemented interfaces.
    pub fn interface_count(&self) -> Result<u8, Fault> {
        Ok(read_u8(self.info, self.at)? & 0x0F)
    }

    /// Whether instances may be invoked across the firewall.
    pub fn is_shareable(&self) -> Result<bool, Fault> {
        Ok(self.flags()?.contains(ClassFlags::SHAREABLE))
    }

    /// Whether this is the root class.
    pub fn is_object(&self) -> Result<bool, Fault> {
        Ok(read_u16(self.info, self.at + 1)? == NO_SUPER_CLASS)
    }

    /// The superclass reference; faults on the root class.
    pub fn super_class_ref(&self) -> Result<ClassRef, Fault> {
        let raw = read_u16(self.info, self.at + 1)?;
        if raw == NO_SUPER_CLASS {
            return Err(Fault::Security);
        }
        Ok(ClassRef::from_u16(raw))
    }

    /// Number of instance-field words declared by this class alone.
    pub fn declared_instance_size(&self) -> Result<u8, Fault> {
        read_u8(self.info, self.at + 3)
    }

    /// Token of the first reference-typed instance field.
    pub fn first_reference_token(&self) -> Result<Token, Fault> {
        read_u8(self.info, self.at + 4)
    }

    /// Number of reference-typed instance fields.
    pub fn reference_count(&self) -> Result<u8, Fault> {
        read_u8(self.info, self.at + 5)
    }

    /// First public method token handled by this class's table.
    pub fn public_method_table_base(&self) -> Result<u8, Fault> {
        read_u8(self.info, self.at + 6)
    }

    /// Entries in the public virtual method table.
    pub fn public_method_table_count(&self) -> Result<u8, Fault> {
        read_u8(self.info, self.at + 7)
    }

    /// First package method token handled by this class's table.
    pub fn package_method_table_base(&self) -> Result<u8, Fault> {
        read_u8(self.info, self.at + 8)
    }

    /// Entries in the package virtual method table.
    pub fn package_method_table_count(&self) -> Result<u8, Fault> {
        read_u8(self.info, self.at + 9)
    }

    /// Method-component offset at `index` of the public table.
    pub fn public_method_entry(&self, index: u8) -> Result<u16, Fault> {
        if index >= self.public_method_table_count()? {
            return Err(Fault::Security);
        }
        read_u16(self.info, self.at + Self::HEADER + 2 * index as usize)
    }

    /// Method-component offset at `index` of the package table.
    pub fn package_method_entry(&self, index: u8) -> Result<u16, Fault> {
        if index >= self.package_method_table_count()? {
            return Err(Fault::Security);
        }
        let base = self.package_table_start()?;
        read_u16(self.info, base + 2 * index as usize)
    }

    fn package_table_start(&self) -> Result<usize, Fault> {
        Ok(self.at + Self::HEADER + 2 * self.public_method_table_count()? as usize)
    }

    fn interfaces_start(&self) -> Result<usize, Fault> {
        Ok(self.package_table_start()? + 2 * self.package_method_table_count()? as usize)
    }

    /// The implemented-interface record at `index`.
    pub fn implemented_interface(&self, index: u8) -> Result<ImplementedInterface<'a>, Fault> {
        if index >= self.interface_count()? {
            return Err(Fault::Security);
        }

        let mut at = self.interfaces_start()?;
        for _ in 0..index {
            let count = read_u8(self.info, at + 2)?;
            at += 3 + count as usize;
        }

        let interface = ClassRef::from_u16(read_u16(self.info, at)?);
        let count = read_u8(self.info, at + 2)?;
        let indexes = self
            .info
            .get(at + 3..at + 3 + count as usize)
            .ok_or(Fault::Security)?;

        Ok(ImplementedInterface { interface, indexes })
    }

    fn interfaces_end(&self) -> Result<usize, Fault> {
        let mut at = self.interfaces_start()?;
        for _ in 0..self.interface_count()? {
            let count = read_u8(self.info, at + 2)?;
            at += 3 + count as usize;
        }
        if at > self.info.len() {
            return Err(Fault::Security);
        }
        Ok(at)
    }

    /// Total encoded size of this descriptor.
    pub fn size(&self) -> Result<usize, Fault> {
        Ok(self.interfaces_end()? - self.at)
    }
}

/// An interface descriptor: the packed flags byte followed by every
/// superinterface, direct and indirect.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceInfo<'a> {
    info: &'a [u8],
    at: usize,
}

impl<'a> InterfaceInfo<'a> {
    /// The info-area offset of this descriptor.
    pub fn offset(&self) -> ClassIndex {
        ClassIndex::new(self.at as u16)
    }

    /// Access flags.
    pub fn flags(&self) -> Result<ClassFlags, Fault> {
        Ok(ClassFlags::from_bits_truncate(read_u8(self.info, self.at)? >> 4))
    }

    /// Number of superinterfaces.
    pub fn super_interface_count(&self) -> Result<u8, Fault> {
        Ok(read_u8(self.info, self.at)? & 0x0F)
    }

    /// The superinterface reference at `index`.
    pub fn super_interface(&self, index: u8) -> Result<ClassRef, Fault> {
        if index >= self.super_interface_count()? {
            return Err(Fault::Security);
        }
        Ok(ClassRef::from_u16(read_u16(
            self.info,
            self.at + 1 + 2 * index as usize,
        )?))
    }

    fn end(&self) -> Result<usize, Fault> {
        let end = self.at + 1 + 2 * self.super_interface_count()? as usize;
        if end > self.info.len() {
            return Err(Fault::Security);
        }
        Ok(end)
    }

    /// Total encoded size of this descriptor.
    pub fn size(&self) -> Result<usize, Fault> {
        Ok(self.end()? - self.at)
    }
}
