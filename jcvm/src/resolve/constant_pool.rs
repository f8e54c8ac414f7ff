//! Constant-pool resolution for one package.

use jcvm_asm::Fault;
use jcvm_cap::{
    ClassInfo, ClassRef, ConstantPoolComponent, CpEntry, InterfaceInfo, StaticRef,
    VirtualMethodRef,
};
use jcvm_cap::FlashMemory;
use jcvm_types::{ClassIndex, CpOffset, PackageId, Token};

use crate::resolve::{ExportHandler, ImportHandler};

/// Typed access to one package's constant pool, resolving class references
/// across packages through the Import and Export components.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPoolHandler<'a> {
    flash: &'a FlashMemory,
    package: PackageId,
}

impl<'a> ConstantPoolHandler<'a> {
    /// A handler over `package`'s constant pool.
    pub fn new(flash: &'a FlashMemory, package: PackageId) -> Self {
        Self { flash, package }
    }

    fn pool(&self) -> Result<ConstantPoolComponent<'a>, Fault> {
        self.flash.cap(self.package)?.constant_pool()
    }

    /// The raw entry at `offset`.
    pub fn entry(&self, offset: CpOffset) -> Result<CpEntry, Fault> {
        self.pool()?.entry(offset)
    }

    /// The Classref entry at `offset`.
    pub fn class_ref(&self, offset: CpOffset) -> Result<ClassRef, Fault> {
        self.pool()?.class_ref(offset)
    }

    /// The InstanceFieldref entry at `offset`.
    pub fn instance_field_ref(&self, offset: CpOffset) -> Result<(ClassRef, Token), Fault> {
        self.pool()?.instance_field_ref(offset)
    }

    /// The VirtualMethodref entry at `offset`.
    pub fn virtual_method_ref(&self, offset: CpOffset) -> Result<VirtualMethodRef, Fault> {
        self.pool()?.virtual_method_ref(offset)
    }

    /// The SuperMethodref entry at `offset`.
    pub fn super_method_ref(&self, offset: CpOffset) -> Result<VirtualMethodRef, Fault> {
        self.pool()?.super_method_ref(offset)
    }

    /// The StaticFieldref entry at `offset`.
    pub fn static_field_ref(&self, offset: CpOffset) -> Result<StaticRef, Fault> {
        self.pool()?.static_field_ref(offset)
    }

    /// The StaticMethodref entry at `offset`.
    pub fn static_method_ref(&self, offset: CpOffset) -> Result<StaticRef, Fault> {
        self.pool()?.static_method_ref(offset)
    }

    /// Resolve a class reference to a concrete package and descriptor
    /// offset. External references go through this package's Import table
    /// to find the foreign package, then through its Export component to
    /// map the class token.
    pub fn resolve_class_ref(&self, class_ref: ClassRef) -> Result<(PackageId, ClassIndex), Fault> {
        if class_ref.is_external() {
            let imports = ImportHandler::new(self.flash, self.package);
            let target = imports.package_id(class_ref.package_token())?;
            let exports = ExportHandler::new(self.flash, target);
            let offset = exports.exported_class_offset(class_ref.class_token())?;
            Ok((target, offset))
        } else {
            Ok((self.package, class_ref.internal_offset()))
        }
    }

    /// Resolve a class reference that must name a class.
    pub fn class_ref_to_class(&self, class_ref: ClassRef) -> Result<(PackageId, ClassInfo<'a>), Fault> {
        let (package, offset) = self.resolve_class_ref(class_ref)?;
        let info = self.flash.cap(package)?.class()?.class_info(offset)?;
        Ok((package, info))
    }

    /// Resolve a class reference that must name an interface.
    pub fn class_ref_to_interface(
        &self,
        class_ref: ClassRef,
    ) -> Result<(PackageId, InterfaceInfo<'a>), Fault> {
        let (package, offset) = self.resolve_class_ref(class_ref)?;
        let info = self.flash.cap(package)?.class()?.interface_info(offset)?;
        Ok((package, info))
    }
}
