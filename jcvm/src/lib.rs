#![warn(missing_docs)]

//! Secure Java Card VM interpreter.
//!
//! The core of a Java Card runtime: a CAP-file bytecode interpreter with a
//! typed frame/stack model, constant-pool resolution across packages, an
//! applet firewall between execution contexts, and a heap distinguishing
//! transient objects from persistent flash-backed ones.
//!
//! The host feeds the interpreter a [`jcvm_cap::FlashMemory`] of installed
//! packages and names a bootstrap method; [`Interpreter::runtime`] then runs
//! the fetch-decode-dispatch loop to completion:
//!
//! ```no_run
//! use jcvm::Interpreter;
//! use jcvm_cap::FlashMemory;
//! use jcvm_types::PackageId;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let flash = FlashMemory::load("card.jcfm")?;
//! let mut vm = Interpreter::new(flash);
//! let package = PackageId::new(2).ok_or("bad package")?;
//! let state = vm.runtime(package, 0, 0)?;
//! # Ok(())
//! # }
//! ```

pub mod consts;
mod context;
mod error;
mod firewall;
mod frame;
mod heap;
mod interpreter;
mod resolve;
mod stack;
mod state;

#[cfg(any(test, feature = "test-helpers"))]
pub mod util;

pub use context::Context;
pub use error::InterpreterError;
pub use frame::Frame;
pub use heap::{ArrayData, Heap, HeapObject, ObjectBody};
pub use interpreter::Interpreter;
pub use resolve::{ClassHandler, ConstantPoolHandler, ExportHandler, ImportHandler};
pub use stack::Stack;
pub use state::{ExecuteState, ProgramState, ReturnValue};
