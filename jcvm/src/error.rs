//! Runtime interpreter error implementation.

use jcvm_asm::Fault;
use jcvm_types::JRef;
use std::io;
use thiserror::Error;

/// Interpreter runtime error variants.
///
/// Anything recoverable travels through the frames as a [`Fault`] first;
/// only what no exception handler caught surfaces here.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// A fault unwound through every active frame without being caught.
    #[error("execution fault: {0}")]
    Fault(#[from] Fault),
    /// An exception object unwound through every active frame without being
    /// caught.
    #[error("uncaught exception object {0:?}")]
    UncaughtException(JRef),
    /// No bootstrap method was installed; the interpreter cannot run.
    #[error("no bootstrap context is initialized")]
    NotInitialized,
    /// I/O and OS related errors.
    #[error("unrecoverable error: {0}")]
    Io(#[from] io::Error),
}

impl InterpreterError {
    /// The fault that caused this error, if applicable.
    pub const fn fault(&self) -> Option<Fault> {
        match self {
            Self::Fault(fault) => Some(*fault),
            _ => None,
        }
    }
}

/// What an opcode handler raised: either a runtime fault or an explicitly
/// thrown exception object. Both unwind through the same handler search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Thrown {
    /// A fault raised by one of the defensive checks.
    Fault(Fault),
    /// An object thrown by `athrow`.
    Object(JRef),
}

impl From<Fault> for Thrown {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}
