//! [`Interpreter`] implementation.

use jcvm_asm::Pc;
use jcvm_cap::{FlashMemory, MethodFlags};
use jcvm_types::{AppletId, JWord, PackageId};
use tracing::debug;

use crate::context::Context;
use crate::error::InterpreterError;
use crate::heap::Heap;
use crate::resolve::ExportHandler;
use crate::state::ProgramState;

mod alu;
mod executors;
mod flow;
mod internal;
mod memory;

/// The Java Card virtual machine.
///
/// Owns the package registry, the object heap, and the LIFO list of
/// execution contexts; the head context is active. One call to
/// [`Interpreter::runtime`] executes one bootstrap invocation to
/// completion, single-threaded and deterministic.
#[derive(Debug)]
pub struct Interpreter {
    flash: FlashMemory,
    heap: Heap,
    contexts: Vec<Context>,
}

impl Interpreter {
    /// A machine over the given package registry.
    pub fn new(flash: FlashMemory) -> Self {
        Self {
            flash,
            heap: Heap::new(),
            contexts: Vec::new(),
        }
    }

    /// The package registry.
    pub fn flash(&self) -> &FlashMemory {
        &self.flash
    }

    /// The object heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The active context, if a run is in progress.
    pub fn current_context(&self) -> Option<&Context> {
        self.contexts.last()
    }

    /// Invoke the exported static method `(class_token, method_token)` of
    /// `package` as the bootstrap entry and run it to completion.
    pub fn runtime(
        &mut self,
        package: PackageId,
        class_token: u8,
        method_token: u8,
    ) -> Result<ProgramState, InterpreterError> {
        let method_offset = ExportHandler::new(&self.flash, package)
            .exported_static_method_offset(class_token, method_token)?;
        self.install_bootstrap(AppletId::new(0), package, method_offset)?;
        self.run()
    }

    /// Push the bootstrap context and frame for a static method at a known
    /// method-component offset.
    pub fn install_bootstrap(
        &mut self,
        applet: AppletId,
        package: PackageId,
        method_offset: u16,
    ) -> Result<(), InterpreterError> {
        let header = self.flash.cap(package)?.method()?.header(method_offset)?;
        if header.flags.contains(MethodFlags::ABSTRACT) {
            return Err(InterpreterError::Fault(jcvm_asm::Fault::Security));
        }

        let args = vec![0 as JWord; header.nargs as usize];
        let locals = header.nargs as usize + header.max_locals as usize;
        let mut context = Context::new(applet, package);
        context.stack.push_frame_with_args(
            &args,
            locals,
            header.max_stack,
            Pc::new(header.code_offset),
            package,
        )?;

        debug!(
            package = package.to_u8(),
            method_offset,
            "bootstrap installed"
        );
        self.contexts.push(context);
        Ok(())
    }

    /// Wipe the session state between applet selections: every context and
    /// every transient object. Persistent state survives.
    pub fn end_session(&mut self) {
        self.contexts.clear();
        self.heap.clear_transient();
    }
}

impl From<Interpreter> for FlashMemory {
    fn from(vm: Interpreter) -> Self {
        vm.flash
    }
}
