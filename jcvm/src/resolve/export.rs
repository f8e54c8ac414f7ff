//! Export resolution: foreign tokens to in-image offsets.

use jcvm_asm::Fault;
use jcvm_cap::{ClassExport, FlashMemory};
use jcvm_types::{ClassIndex, PackageId};

/// Maps class and static tokens of an exported package onto concrete
/// offsets in its components.
#[derive(Debug, Clone, Copy)]
pub struct ExportHandler<'a> {
    flash: &'a FlashMemory,
    package: PackageId,
}

impl<'a> ExportHandler<'a> {
    /// A handler over `package`'s Export component.
    pub fn new(flash: &'a FlashMemory, package: PackageId) -> Self {
        Self { flash, package }
    }

    fn class_export(&self, class_token: u8) -> Result<ClassExport<'a>, Fault> {
        // A package without an Export component exports nothing.
        let exports = self.flash.cap(self.package)?.export().ok_or(Fault::Security)?;
        exports.class_export(class_token)
    }

    /// Class component offset of the exported class at `class_token`.
    pub fn exported_class_offset(&self, class_token: u8) -> Result<ClassIndex, Fault> {
        self.class_export(class_token)?.class_offset()
    }

    /// Method component offset of an exported static method.
    pub fn exported_static_method_offset(
        &self,
        class_token: u8,
        method_token: u8,
    ) -> Result<u16, Fault> {
        self.class_export(class_token)?.static_method_offset(method_token)
    }

    /// Static image offset of an exported static field.
    pub fn exported_static_field_offset(
        &self,
        class_token: u8,
        field_token: u8,
    ) -> Result<u16, Fault> {
        self.class_export(class_token)?.static_field_offset(field_token)
    }
}
