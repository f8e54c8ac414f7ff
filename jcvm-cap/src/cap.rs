//! The per-package CAP view.

use jcvm_asm::Fault;

use crate::class::ClassComponent;
use crate::component::ComponentTag;
use crate::constant_pool::ConstantPoolComponent;
use crate::descriptor::DescriptorComponent;
use crate::export::ExportComponent;
use crate::header::HeaderComponent;
use crate::import::ImportComponent;
use crate::method::MethodComponent;
use crate::reference_location::ReferenceLocationComponent;
use crate::static_field::StaticFieldComponent;

/// A read-only view over one installed CAP image, locating the components
/// by tag.
///
/// Accessors for mandatory components raise [`Fault::Security`] when the
/// component is absent; `export` and `descriptor` are optional and surface
/// their absence as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cap<'a> {
    header: Option<&'a [u8]>,
    class: Option<&'a [u8]>,
    import: Option<&'a [u8]>,
    method: Option<&'a [u8]>,
    constant_pool: Option<&'a [u8]>,
    static_field: Option<&'a [u8]>,
    reference_location: Option<&'a [u8]>,
    export: Option<&'a [u8]>,
    descriptor: Option<&'a [u8]>,
}

impl<'a> Cap<'a> {
    /// Split an image into its components. Unknown tags are skipped; a
    /// truncated component rejects the image.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Fault> {
        let mut cap = Self::default();
        let mut at = 0;

        while at < bytes.len() {
            let tag = bytes[at];
            let size = bytes
                .get(at + 1..at + 3)
                .map(|raw| u16::from_be_bytes([raw[0], raw[1]]) as usize)
                .ok_or(Fault::Security)?;
            let info = bytes.get(at + 3..at + 3 + size).ok_or(Fault::Security)?;
            at += 3 + size;

            let slot = match ComponentTag::from_u8(tag) {
                Some(ComponentTag::Header) => &mut cap.header,
                Some(ComponentTag::Class) => &mut cap.class,
                Some(ComponentTag::Import) => &mut cap.import,
                Some(ComponentTag::Method) => &mut cap.method,
                Some(ComponentTag::ConstantPool) => &mut cap.constant_pool,
                Some(ComponentTag::StaticField) => &mut cap.static_field,
                Some(ComponentTag::ReferenceLocation) => &mut cap.reference_location,
                Some(ComponentTag::Export) => &mut cap.export,
                Some(ComponentTag::Descriptor) => &mut cap.descriptor,
                None => continue,
            };
            if slot.is_some() {
                // Duplicate component.
                return Err(Fault::Security);
            }
            *slot = Some(info);
        }

        cap.header().and_then(|header| header.verify())?;
        Ok(cap)
    }

    /// The Header component.
    pub fn header(&self) -> Result<HeaderComponent<'a>, Fault> {
        self.header.map(HeaderComponent::new).ok_or(Fault::Security)
    }

    /// The Class component.
    pub fn class(&self) -> Result<ClassComponent<'a>, Fault> {
        self.class.map(ClassComponent::new).ok_or(Fault::Security)
    }

    /// The Import component.
    pub fn import(&self) -> Result<ImportComponent<'a>, Fault> {
        self.import.map(ImportComponent::new).ok_or(Fault::Security)
    }

    /// The Method component.
    pub fn method(&self) -> Result<MethodComponent<'a>, Fault> {
        self.method.map(MethodComponent::new).ok_or(Fault::Security)
    }

    /// The Constant Pool component.
    pub fn constant_pool(&self) -> Result<ConstantPoolComponent<'a>, Fault> {
        self.constant_pool
            .map(ConstantPoolComponent::new)
            .ok_or(Fault::Security)
    }

    /// The StaticField component.
    pub fn static_field(&self) -> Result<StaticFieldComponent<'a>, Fault> {
        self.static_field
            .map(StaticFieldComponent::new)
            .ok_or(Fault::Security)
    }

    /// The ReferenceLocation component.
    pub fn reference_location(&self) -> Result<ReferenceLocationComponent<'a>, Fault> {
        self.reference_location
            .map(ReferenceLocationComponent::new)
            .ok_or(Fault::Security)
    }

    /// The Export component, absent when nothing is exported.
    pub fn export(&self) -> Option<ExportComponent<'a>> {
        self.export.map(ExportComponent::new)
    }

    /// The optional Descriptor component.
    pub fn descriptor(&self) -> Option<DescriptorComponent<'a>> {
        self.descriptor.map(DescriptorComponent::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_image() -> Vec<u8> {
        let header = [
            0xDE, 0xCA, 0xFF, 0xED, 0x02, 0x02, 0x00, 0x00, 0x01, 0x01, 0xA0,
        ];
        let mut bytes = vec![ComponentTag::Header as u8, 0x00, header.len() as u8];
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&[ComponentTag::Method as u8, 0x00, 0x01, 0x00]);
        bytes
    }

    #[test]
    fn components_are_located_by_tag() {
        let bytes = minimal_image();
        let cap = Cap::parse(&bytes).unwrap();

        assert_eq!(cap.header().unwrap().package_aid().unwrap(), &[0xA0]);
        assert_eq!(cap.method().unwrap().handler_count().unwrap(), 0);
        assert_eq!(cap.class().unwrap_err(), Fault::Security);
        assert!(cap.export().is_none());
    }

    #[test]
    fn truncated_component_rejects_the_image() {
        let mut bytes = minimal_image();
        bytes.extend_from_slice(&[ComponentTag::Class as u8, 0x00, 0x05, 0x00]);
        assert_eq!(Cap::parse(&bytes), Err(Fault::Security));
    }

    #[test]
    fn duplicate_component_rejects_the_image() {
        let mut bytes = minimal_image();
        bytes.extend_from_slice(&[ComponentTag::Method as u8, 0x00, 0x01, 0x00]);
        assert_eq!(Cap::parse(&bytes), Err(Fault::Security));
    }

    #[test]
    fn bad_magic_rejects_the_image() {
        let mut bytes = minimal_image();
        bytes[3] = 0x00;
        assert_eq!(Cap::parse(&bytes), Err(Fault::Security));
    }
}
