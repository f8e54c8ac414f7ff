//! The flash registry of installed packages and the host image codec.
//!
//! On the card, packages live in a flash filesystem managed by the loader;
//! the core only ever sees read-only CAP images plus one mutable
//! static-field image per package. On the host, the same state round-trips
//! through a container file so a run can be persisted with `--save`.

use std::path::Path;

use jcvm_asm::Fault;
use jcvm_types::{PackageId, MAX_PACKAGES};
use thiserror::Error;

use crate::cap::Cap;

/// Magic bytes opening a host flash image file.
const IMAGE_MAGIC: [u8; 4] = *b"JCFM";
/// Supported container format version.
const IMAGE_VERSION: u8 = 1;

/// Errors of the host flash-image codec.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The container framing is not well formed.
    #[error("malformed flash image: {0}")]
    Malformed(&'static str),
    /// The container version is not supported.
    #[error("unsupported flash image version {0}")]
    UnsupportedVersion(u8),
    /// The container holds more packages than the registry allows.
    #[error("flash image holds {0} packages, limit is {MAX_PACKAGES}")]
    TooManyPackages(usize),
    /// A CAP image or static segment failed its structural checks.
    #[error("package {package}: {fault}")]
    BadPackage {
        /// Registry slot of the offending package.
        package: u8,
        /// The structural fault.
        fault: Fault,
    },
    /// I/O and OS related errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One installed package: its CAP image and its mutable static-field image.
#[derive(Debug, Clone)]
pub struct PackageImage {
    bytes: Vec<u8>,
    statics: Vec<u8>,
}

impl PackageImage {
    /// Install a CAP image, building the initial static-field image from
    /// the StaticField component.
    pub fn install(bytes: Vec<u8>) -> Result<Self, Fault> {
        let statics = {
            let cap = Cap::parse(&bytes)?;
            match cap.static_field() {
                Ok(statics) => statics.initial_image()?,
                Err(_) => Vec::new(),
            }
        };
        Ok(Self { bytes, statics })
    }

    fn with_statics(bytes: Vec<u8>, statics: Vec<u8>) -> Result<Self, Fault> {
        let expected = {
            let cap = Cap::parse(&bytes)?;
            cap.static_field()
                .and_then(|s| s.image_size())
                .unwrap_or(0) as usize
        };
        if statics.len() != expected {
            return Err(Fault::Security);
        }
        Ok(Self { bytes, statics })
    }

    /// The component view of the CAP image.
    pub fn cap(&self) -> Result<Cap<'_>, Fault> {
        Cap::parse(&self.bytes)
    }
}

/// The registry of installed packages, indexed by [`PackageId`].
#[derive(Debug, Clone, Default)]
pub struct FlashMemory {
    slots: Vec<Option<PackageImage>>,
}

impl FlashMemory {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a CAP image in the given slot.
    pub fn install(&mut self, id: PackageId, bytes: Vec<u8>) -> Result<(), Fault> {
        let image = PackageImage::install(bytes)?;
        let slot = id.to_u8() as usize;
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(image);
        Ok(())
    }

    fn package(&self, id: PackageId) -> Result<&PackageImage, Fault> {
        self.slots
            .get(id.to_u8() as usize)
            .and_then(Option::as_ref)
            .ok_or(Fault::Security)
    }

    /// The component view of an installed package.
    pub fn cap(&self, id: PackageId) -> Result<Cap<'_>, Fault> {
        self.package(id)?.cap()
    }

    /// The static-field image of an installed package.
    pub fn statics(&self, id: PackageId) -> Result<&[u8], Fault> {
        Ok(&self.package(id)?.statics)
    }

    /// The mutable static-field image of an installed package.
    pub fn statics_mut(&mut self, id: PackageId) -> Result<&mut [u8], Fault> {
        let slot = self
            .slots
            .get_mut(id.to_u8() as usize)
            .and_then(Option::as_mut)
            .ok_or(Fault::Security)?;
        Ok(&mut slot.statics)
    }

    /// Find the installed package carrying the given AID.
    pub fn lookup_aid(&self, aid: &[u8]) -> Option<PackageId> {
        for (slot, image) in self.slots.iter().enumerate() {
            let Some(image) = image else { continue };
            let Ok(cap) = image.cap() else { continue };
            let Ok(header) = cap.header() else { continue };
            if header.package_aid() == Ok(aid) {
                return PackageId::new(slot as u8);
            }
        }
        None
    }

    /// Decode a host flash image.
    pub fn from_image(bytes: &[u8]) -> Result<Self, ImageError> {
        fn take<'a>(
            bytes: &'a [u8],
            cursor: &mut usize,
            len: usize,
        ) -> Result<&'a [u8], ImageError> {
            let chunk = bytes
                .get(*cursor..*cursor + len)
                .ok_or(ImageError::Malformed("truncated container"))?;
            *cursor += len;
            Ok(chunk)
        }

        fn take_len(bytes: &[u8], cursor: &mut usize) -> Result<usize, ImageError> {
            let raw = take(bytes, cursor, 4)?;
            Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize)
        }

        let cursor = &mut 0usize;

        if take(bytes, cursor, 4)? != IMAGE_MAGIC {
            return Err(ImageError::Malformed("bad magic"));
        }
        let version = take(bytes, cursor, 1)?[0];
        if version != IMAGE_VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }
        let count = take(bytes, cursor, 1)?[0] as usize;
        if count > MAX_PACKAGES as usize {
            return Err(ImageError::TooManyPackages(count));
        }

        let mut caps = Vec::with_capacity(count);
        for _ in 0..count {
            let len = take_len(bytes, cursor)?;
            caps.push(take(bytes, cursor, len)?.to_vec());
        }

        let mut registry = Self::new();
        registry.slots.resize_with(count, || None);
        for (slot, cap_bytes) in caps.into_iter().enumerate() {
            let len = take_len(bytes, cursor)?;
            let statics = take(bytes, cursor, len)?.to_vec();

            // An empty record is a free registry slot.
            if cap_bytes.is_empty() {
                continue;
            }

            let package = if statics.is_empty() {
                PackageImage::install(cap_bytes)
            } else {
                PackageImage::with_statics(cap_bytes, statics)
            }
            .map_err(|fault| ImageError::BadPackage {
                package: slot as u8,
                fault,
            })?;
            registry.slots[slot] = Some(package);
        }

        Ok(registry)
    }

    /// Encode the registry, including mutated static images, back into the
    /// container format.
    pub fn to_image(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&IMAGE_MAGIC);
        bytes.push(IMAGE_VERSION);
        bytes.push(self.slots.len() as u8);

        for slot in &self.slots {
            let cap = slot.as_ref().map(|p| p.bytes.as_slice()).unwrap_or(&[]);
            bytes.extend_from_slice(&(cap.len() as u32).to_be_bytes());
            bytes.extend_from_slice(cap);
        }
        for slot in &self.slots {
            let statics = slot.as_ref().map(|p| p.statics.as_slice()).unwrap_or(&[]);
            bytes.extend_from_slice(&(statics.len() as u32).to_be_bytes());
            bytes.extend_from_slice(statics);
        }

        bytes
    }

    /// Load a host flash image from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        Self::from_image(&std::fs::read(path)?)
    }

    /// Persist the registry to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ImageError> {
        Ok(std::fs::write(path, self.to_image())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentTag;

    fn minimal_cap(aid: &[u8]) -> Vec<u8> {
        let mut header = vec![0xDE, 0xCA, 0xFF, 0xED, 0x02, 0x02, 0x00, 0x00, 0x01];
        header.push(aid.len() as u8);
        header.extend_from_slice(aid);

        let mut bytes = vec![ComponentTag::Header as u8, 0x00, header.len() as u8];
        bytes.extend_from_slice(&header);
        bytes
    }

    #[test]
    fn install_and_lookup() {
        let mut flash = FlashMemory::new();
        flash
            .install(PackageId::new(0).unwrap(), minimal_cap(&[0xA0, 0x01]))
            .unwrap();
        flash
            .install(PackageId::new(2).unwrap(), minimal_cap(&[0xA0, 0x02]))
            .unwrap();

        assert_eq!(flash.lookup_aid(&[0xA0, 0x02]), PackageId::new(2));
        assert_eq!(flash.lookup_aid(&[0xA0, 0x03]), None);
        assert!(flash.cap(PackageId::new(1).unwrap()).is_err());
    }

    #[test]
    fn image_round_trip() {
        let mut flash = FlashMemory::new();
        flash
            .install(PackageId::new(0).unwrap(), minimal_cap(&[0xA0]))
            .unwrap();

        let encoded = flash.to_image();
        let decoded = FlashMemory::from_image(&encoded).unwrap();
        assert_eq!(decoded.lookup_aid(&[0xA0]), PackageId::new(0));
        assert_eq!(decoded.to_image(), encoded);
    }

    #[test]
    fn truncated_image_is_rejected() {
        let mut flash = FlashMemory::new();
        flash
            .install(PackageId::new(0).unwrap(), minimal_cap(&[0xA0]))
            .unwrap();

        let mut encoded = flash.to_image();
        encoded.truncate(encoded.len() - 1);
        assert!(matches!(
            FlashMemory::from_image(&encoded),
            Err(ImageError::Malformed(_))
        ));
    }

    #[test]
    fn version_is_checked() {
        let mut flash = FlashMemory::new();
        flash
            .install(PackageId::new(0).unwrap(), minimal_cap(&[0xA0]))
            .unwrap();

        let mut encoded = flash.to_image();
        encoded[4] = 9;
        assert!(matches!(
            FlashMemory::from_image(&encoded),
            Err(ImageError::UnsupportedVersion(9))
        ));
    }
}
