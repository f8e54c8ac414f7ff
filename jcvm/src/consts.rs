//! Runtime configuration constants.

use jcvm_types::PackageId;

pub use jcvm_types::MAX_PACKAGES;

/// Words of stack buffer per execution context.
pub const STACK_SIZE: usize = 256;

/// Ceiling on transient heap payload, in bytes.
pub const MAX_HEAP_SIZE: usize = 256;

/// Maximum number of installed applets.
pub const MAX_APPLETS: usize = 40;

/// Registry slot of the system package holding the root `Object` class.
pub const SYSTEM_PACKAGE: PackageId = match PackageId::new(0) {
    Some(id) => id,
    None => unreachable!(),
};

/// Registry slot of the card manager package the on-card boot selects.
pub const STARTING_PACKAGE: u8 = 2;

/// Export class token of the bootstrap entry.
pub const STARTING_CLASS: u8 = 0;

/// Export method token of the bootstrap entry.
pub const STARTING_METHOD: u8 = 0;
