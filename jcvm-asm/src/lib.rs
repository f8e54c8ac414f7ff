#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! Instruction-level types of the Java Card VM: the bytecode table, the
//! fault taxonomy raised by the runtime's defensive checks, and the program
//! counter used to walk a method's code.

mod bytecode;
mod fault;
mod pc;

pub use bytecode::Bytecode;
pub use fault::Fault;
pub use pc::Pc;
