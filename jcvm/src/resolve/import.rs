//! Import resolution: package tokens to registry handles.

use jcvm_asm::Fault;
use jcvm_cap::FlashMemory;
use jcvm_types::PackageId;

/// Maps a package's import tokens onto installed packages by AID.
#[derive(Debug, Clone, Copy)]
pub struct ImportHandler<'a> {
    flash: &'a FlashMemory,
    package: PackageId,
}

impl<'a> ImportHandler<'a> {
    /// A handler over `package`'s Import component.
    pub fn new(flash: &'a FlashMemory, package: PackageId) -> Self {
        Self { flash, package }
    }

    /// The registry handle of the imported package at `token`. An import of
    /// a package that is not installed is a firewall violation.
    pub fn package_id(&self, token: u8) -> Result<PackageId, Fault> {
        let imports = self.flash.cap(self.package)?.import()?;
        let imported = imports.package(token & 0x7F)?;
        self.flash.lookup_aid(imported.aid).ok_or(Fault::Security)
    }
}
