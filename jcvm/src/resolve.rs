//! Resolution of symbolic references against installed CAP images.
//!
//! Each handler borrows the package registry for the duration of one
//! resolution; no pointer into another package's image outlives the opcode
//! that resolved it.

mod class;
mod constant_pool;
mod export;
mod import;
pub(crate) mod static_field;

pub use class::ClassHandler;
pub use constant_pool::ConstantPoolHandler;
pub use export::ExportHandler;
pub use import::ImportHandler;
