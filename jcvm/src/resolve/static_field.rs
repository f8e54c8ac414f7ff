//! Typed access to a package's static-field image.
//!
//! The image is the package's mutable persistent state: scalar cells are
//! read and written in place, while reference cells designate the
//! read-only persistent arrays initialised in flash.

use jcvm_asm::Fault;
use jcvm_cap::FlashMemory;
use jcvm_types::{JByte, JInt, JRef, JShort, PackageId};

/// Marker distinguishing raw stored references from array-initialiser
/// ordinals in a reference cell.
const REF_BITS: u16 = 0x8000;

/// What a reference-typed static cell designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StaticRefCell {
    /// The null reference.
    Null,
    /// The persistent array initialised by this ordinal of the package's
    /// array-initialiser table.
    ArrayInit(u16),
    /// A reference stored by a previous `putstatic`.
    Stored(JRef),
}

fn image<'a>(flash: &'a FlashMemory, package: PackageId) -> Result<&'a [u8], Fault> {
    flash.statics(package)
}

fn cell<'a>(flash: &'a FlashMemory, package: PackageId, offset: u16, width: usize) -> Result<&'a [u8], Fault> {
    image(flash, package)?
        .get(offset as usize..offset as usize + width)
        .ok_or(Fault::Security)
}

fn cell_mut(
    flash: &mut FlashMemory,
    package: PackageId,
    offset: u16,
    width: usize,
) -> Result<&mut [u8], Fault> {
    flash
        .statics_mut(package)?
        .get_mut(offset as usize..offset as usize + width)
        .ok_or(Fault::Security)
}

pub(crate) fn read_byte(flash: &FlashMemory, package: PackageId, offset: u16) -> Result<JByte, Fault> {
    Ok(cell(flash, package, offset, 1)?[0] as JByte)
}

pub(crate) fn read_short(flash: &FlashMemory, package: PackageId, offset: u16) -> Result<JShort, Fault> {
    let raw = cell(flash, package, offset, 2)?;
    Ok(JShort::from_be_bytes([raw[0], raw[1]]))
}

pub(crate) fn read_int(flash: &FlashMemory, package: PackageId, offset: u16) -> Result<JInt, Fault> {
    let raw = cell(flash, package, offset, 4)?;
    Ok(JInt::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

pub(crate) fn read_ref_cell(
    flash: &FlashMemory,
    package: PackageId,
    offset: u16,
) -> Result<StaticRefCell, Fault> {
    let raw = cell(flash, package, offset, 2)?;
    let value = u16::from_be_bytes([raw[0], raw[1]]);
    Ok(match value {
        0 => StaticRefCell::Null,
        v if v & REF_BITS != 0 => StaticRefCell::Stored(JRef::from_word(v as i16)),
        v => StaticRefCell::ArrayInit(v - 1),
    })
}

pub(crate) fn write_byte(
    flash: &mut FlashMemory,
    package: PackageId,
    offset: u16,
    value: JByte,
) -> Result<(), Fault> {
    cell_mut(flash, package, offset, 1)?[0] = value as u8;
    Ok(())
}

pub(crate) fn write_short(
    flash: &mut FlashMemory,
    package: PackageId,
    offset: u16,
    value: JShort,
) -> Result<(), Fault> {
    cell_mut(flash, package, offset, 2)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

pub(crate) fn write_int(
    flash: &mut FlashMemory,
    package: PackageId,
    offset: u16,
    value: JInt,
) -> Result<(), Fault> {
    cell_mut(flash, package, offset, 4)?.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Store a reference into a static cell. Only null and persistent
/// references may enter persistent storage; a transient reference would
/// dangle across sessions, so the firewall rejects it.
pub(crate) fn write_ref_cell(
    flash: &mut FlashMemory,
    package: PackageId,
    offset: u16,
    value: JRef,
) -> Result<(), Fault> {
    let bits = if value.is_null() {
        0u16
    } else if value.is_persistent() {
        value.bits()
    } else {
        return Err(Fault::Security);
    };
    cell_mut(flash, package, offset, 2)?.copy_from_slice(&bits.to_be_bytes());
    Ok(())
}
