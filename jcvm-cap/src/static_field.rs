//! The StaticField component: image layout and initial values.

use jcvm_asm::Fault;
use jcvm_types::ArrayKind;

use crate::component::{read_u16, read_slice};

/// The StaticField component.
///
/// ```text
/// image_size              u16
/// reference_count         u16
/// array_init_count        u16
/// array_init              { type u8, count u16, values } × count
/// default_value_count     u16
/// non_default_value_count u16
/// non_default_values      bytes
/// ```
///
/// The image starts with `reference_count` two-byte reference cells; the
/// first `array_init_count` of them designate the persistent arrays below.
/// The last `non_default_value_count` bytes of the image carry the
/// non-default primitive values; everything in between is zero.
#[derive(Debug, Clone, Copy)]
pub struct StaticFieldComponent<'a> {
    info: &'a [u8],
}

/// One persistent array initialiser.
#[derive(Debug, Clone, Copy)]
pub struct ArrayInit<'a> {
    /// Element type of the array.
    pub kind: ArrayKind,
    /// Raw big-endian element bytes.
    pub values: &'a [u8],
}

impl ArrayInit<'_> {
    /// Number of elements.
    pub fn length(&self) -> usize {
        self.values.len() / self.kind.element_size()
    }
}

const TYPE_BOOLEAN: u8 = 2;
const TYPE_BYTE: u8 = 3;
const TYPE_SHORT: u8 = 4;
const TYPE_INT: u8 = 5;

impl<'a> StaticFieldComponent<'a> {
    pub(crate) const fn new(info: &'a [u8]) -> Self {
        Self { info }
    }

    /// Bytes required to represent the static fields.
    pub fn image_size(&self) -> Result<u16, Fault> {
        read_u16(self.info, 0)
    }

    /// Number of reference-typed static fields.
    pub fn reference_count(&self) -> Result<u16, Fault> {
        read_u16(self.info, 2)
    }

    /// Number of persistent array initialisers.
    pub fn array_init_count(&self) -> Result<u16, Fault> {
        read_u16(self.info, 4)
    }

    /// The persistent array initialiser at `index`.
    pub fn array_init(&self, index: u16) -> Result<ArrayInit<'a>, Fault> {
        if index >= self.array_init_count()? {
            return Err(Fault::Security);
        }

        let mut at = 6;
        for _ in 0..index {
            let count = read_u16(self.info, at + 1)? as usize;
            at += 3 + count;
        }

        let kind = match self.info.get(at).copied().ok_or(Fault::Security)? {
            TYPE_BOOLEAN => ArrayKind::Boolean,
            TYPE_BYTE => ArrayKind::Byte,
            TYPE_SHORT => ArrayKind::Short,
            TYPE_INT => ArrayKind::Int,
            _ => return Err(Fault::Security),
        };
        let count = read_u16(self.info, at + 1)? as usize;
        let values = read_slice(self.info, at + 3, count)?;

        Ok(ArrayInit { kind, values })
    }

    fn after_array_inits(&self) -> Result<usize, Fault> {
        let mut at = 6;
        for _ in 0..self.array_init_count()? {
            let count = read_u16(self.info, at + 1)? as usize;
            at += 3 + count;
        }
        Ok(at)
    }

    /// Bytes of the image left at their default (zero) value.
    pub fn default_value_count(&self) -> Result<u16, Fault> {
        read_u16(self.info, self.after_array_inits()?)
    }

    /// Bytes of non-default initial values at the tail of the image.
    pub fn non_default_values(&self) -> Result<&'a [u8], Fault> {
        let at = self.after_array_inits()?;
        let count = read_u16(self.info, at + 2)? as usize;
        read_slice(self.info, at + 4, count)
    }

    /// Build the initial static-field image: reference cells designating
    /// their array initialisers, a zeroed default segment, and the
    /// non-default values at the tail.
    pub fn initial_image(&self) -> Result<Vec<u8>, Fault> {
        let size = self.image_size()? as usize;
        let mut image = vec![0u8; size];

        let non_default = self.non_default_values()?;
        if non_default.len() > size {
            return Err(Fault::Security);
        }
        let tail = size - non_default.len();
        image[tail..].copy_from_slice(non_default);

        let references = self.reference_count()? as usize;
        let inits = self.array_init_count()? as usize;
        if inits > references || 2 * references > size {
            return Err(Fault::Security);
        }
        for i in 0..inits {
            let cell = ((i + 1) as u16).to_be_bytes();
            image[2 * i..2 * i + 2].copy_from_slice(&cell);
        }

        Ok(image)
    }
}
