#![warn(missing_docs)]

//! Read-only structural views over installed CAP images.
//!
//! A CAP image is a sequence of tagged, big-endian components. The views in
//! this crate never copy component payloads: each one wraps a byte slice of
//! the installed image and exposes bounds-checked accessors. A structural
//! read that would leave the component raises [`jcvm_asm::Fault::Security`]
//! instead of producing garbage.

mod cap;
mod class;
mod component;
mod constant_pool;
mod descriptor;
mod export;
mod flash;
mod header;
mod import;
mod method;
mod reference_location;
mod static_field;

pub use cap::Cap;
pub use class::{
    ClassComponent, ClassFlags, ClassInfo, ClassRef, ImplementedInterface, InterfaceInfo, TypeInfo,
};
pub use component::ComponentTag;
pub use constant_pool::{ConstantPoolComponent, CpEntry, CpTag, StaticRef, VirtualMethodRef};
pub use descriptor::DescriptorComponent;
pub use export::{ClassExport, ExportComponent};
pub use flash::{FlashMemory, ImageError, PackageImage};
pub use header::HeaderComponent;
pub use import::{ImportComponent, ImportedPackage};
pub use method::{ExceptionHandler, MethodComponent, MethodFlags, MethodHeader};
pub use reference_location::ReferenceLocationComponent;
pub use static_field::{ArrayInit, StaticFieldComponent};
