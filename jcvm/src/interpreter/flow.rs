//! Control flow: branches, subroutines, the invoke/return state machine,
//! and exception unwinding.

use jcvm_asm::{Fault, Pc};
use jcvm_cap::{CpTag, ExceptionHandler, MethodFlags, MethodHeader, StaticRef};
use jcvm_types::{ClassIndex, JRef, JShort, JWord, PackageId};
use tracing::{debug, trace};

use crate::context::Context;
use crate::error::{InterpreterError, Thrown};
use crate::firewall;
use crate::heap::ObjectBody;
use crate::interpreter::Interpreter;
use crate::resolve::{ClassHandler, ConstantPoolHandler, ExportHandler, ImportHandler};
use crate::state::{ExecuteState, ReturnValue};

/// Which return opcode ended the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnKind {
    Void,
    Short,
    Int,
    Reference,
}

impl ReturnKind {
    fn words(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Short | Self::Reference => 1,
            Self::Int => 2,
        }
    }
}

impl Interpreter {
    fn fetch_branch_offset(&mut self, wide: bool) -> Result<i16, Fault> {
        if wide {
            self.fetch_i16()
        } else {
            Ok(self.fetch_i8()? as i16)
        }
    }

    pub(crate) fn op_goto(&mut self, base: u16, wide: bool) -> Result<(), Fault> {
        let offset = self.fetch_branch_offset(wide)?;
        self.branch_to(base, offset)
    }

    pub(crate) fn op_if(
        &mut self,
        base: u16,
        wide: bool,
        predicate: impl FnOnce(JShort) -> bool,
    ) -> Result<(), Fault> {
        let offset = self.fetch_branch_offset(wide)?;
        let value = self.pop()?;
        if predicate(value) {
            self.branch_to(base, offset)?;
        }
        Ok(())
    }

    pub(crate) fn op_if_scmp(
        &mut self,
        base: u16,
        wide: bool,
        predicate: impl FnOnce(JShort, JShort) -> bool,
    ) -> Result<(), Fault> {
        let offset = self.fetch_branch_offset(wide)?;
        let (a, b) = self.pop_short_pair()?;
        if predicate(a, b) {
            self.branch_to(base, offset)?;
        }
        Ok(())
    }

    pub(crate) fn op_if_acmp(&mut self, base: u16, wide: bool, equal: bool) -> Result<(), Fault> {
        let offset = self.fetch_branch_offset(wide)?;
        let b = self.pop_ref()?;
        let a = self.pop_ref()?;
        if (a == b) == equal {
            self.branch_to(base, offset)?;
        }
        Ok(())
    }

    pub(crate) fn op_ifnull(&mut self, base: u16, wide: bool, want_null: bool) -> Result<(), Fault> {
        let offset = self.fetch_branch_offset(wide)?;
        let reference = self.pop_ref()?;
        if reference.is_null() == want_null {
            self.branch_to(base, offset)?;
        }
        Ok(())
    }

    pub(crate) fn op_stableswitch(&mut self, base: u16) -> Result<(), Fault> {
        let default = self.fetch_i16()?;
        let low = self.fetch_i16()?;
        let high = self.fetch_i16()?;
        if low > high {
            return Err(Fault::Security);
        }
        let index = self.pop()?;
        if index < low || index > high {
            return self.branch_to(base, default);
        }

        let entry = (index as i32 - low as i32) as u32;
        self.table_branch(base, entry)
    }

    pub(crate) fn op_itableswitch(&mut self, base: u16) -> Result<(), Fault> {
        let default = self.fetch_i16()?;
        let low = self.fetch_i32()?;
        let high = self.fetch_i32()?;
        if low > high {
            return Err(Fault::Security);
        }
        let index = self.pop_int()?;
        if index < low || index > high {
            return self.branch_to(base, default);
        }

        let entry = index.wrapping_sub(low) as u32;
        self.table_branch(base, entry)
    }

    /// Branch through entry `entry` of the offset table at the current PC.
    fn table_branch(&mut self, base: u16, entry: u32) -> Result<(), Fault> {
        let table = self.pc_offset()?;
        let position = u16::try_from(table as u32 + 2 * entry).map_err(|_| Fault::Security)?;
        let offset = self.with_pc(|pc, code| {
            pc.set(position);
            pc.next_short(code)
        })?;
        self.branch_to(base, offset)
    }

    pub(crate) fn op_slookupswitch(&mut self, base: u16) -> Result<(), Fault> {
        let default = self.fetch_i16()?;
        let pairs = self.fetch_u16()?;
        let key = self.pop()?;
        for _ in 0..pairs {
            let candidate = self.fetch_i16()?;
            let offset = self.fetch_i16()?;
            if candidate == key {
                return self.branch_to(base, offset);
            }
        }
        self.branch_to(base, default)
    }

    pub(crate) fn op_ilookupswitch(&mut self, base: u16) -> Result<(), Fault> {
        let default = self.fetch_i16()?;
        let pairs = self.fetch_u16()?;
        let key = self.pop_int()?;
        for _ in 0..pairs {
            let candidate = self.fetch_i32()?;
            let offset = self.fetch_i16()?;
            if candidate == key {
                return self.branch_to(base, offset);
            }
        }
        self.branch_to(base, default)
    }

    /// `jsr`: save the PC of the instruction after the operands and leave
    /// the slot index on the stack as the returnAddress word.
    pub(crate) fn op_jsr(&mut self, base: u16) -> Result<(), Fault> {
        let offset = self.fetch_i16()?;
        let index = self.context_mut()?.stack.frame_mut()?.save_pc()?;
        self.push(index as JWord)?;
        self.branch_to(base, offset)
    }

    /// `ret`: consume the saved-PC slot named by a local variable.
    pub(crate) fn op_ret(&mut self) -> Result<(), Fault> {
        let local = self.fetch_u8()?;
        let word = self.read_local_word(local)?;
        let index = u8::try_from(word).map_err(|_| Fault::IndexOutOfBounds)?;

        let frame = self.context_mut()?.stack.frame_mut()?;
        let pc = frame.restore_pc(index)?;
        frame.set_pc(pc);
        Ok(())
    }

    /// Resolve a static method reference to a concrete package and method
    /// offset, crossing into an imported package when needed.
    fn resolve_static_method_ref(&self, sref: StaticRef) -> Result<(PackageId, u16), Fault> {
        match sref {
            StaticRef::Internal { offset } => Ok((self.current_package()?, offset)),
            StaticRef::External {
                package_token,
                class_token,
                token,
            } => {
                let package = self.current_package()?;
                let target = ImportHandler::new(&self.flash, package).package_id(package_token)?;
                let offset = ExportHandler::new(&self.flash, target)
                    .exported_static_method_offset(class_token, token)?;
                Ok((target, offset))
            }
        }
    }

    fn callee_header(&self, package: PackageId, method_offset: u16) -> Result<MethodHeader, Fault> {
        let header = self.flash.cap(package)?.method()?.header(method_offset)?;
        if header.flags.contains(MethodFlags::ABSTRACT) {
            return Err(Fault::Security);
        }
        Ok(header)
    }

    /// Allocate the callee frame on the current context and make the
    /// callee's package current. For instance methods, `this` is verified
    /// non-null after frame construction.
    fn push_callee_frame(
        &mut self,
        header: MethodHeader,
        package: PackageId,
        virtual_call: bool,
    ) -> Result<(), Fault> {
        // An instance method always receives `this`.
        if virtual_call && header.nargs == 0 {
            return Err(Fault::Security);
        }

        let locals = header.nargs as usize + header.max_locals as usize;
        let context = self.context_mut()?;
        context.stack.push_frame(
            header.nargs,
            locals,
            header.max_stack,
            Pc::new(header.code_offset),
            package,
        )?;

        if virtual_call {
            let this = JRef::from_word(context.stack.read_local(0)?);
            if this.is_null() {
                return Err(Fault::NullPointer);
            }
        }

        context.set_current_package(package);
        trace!(package = package.to_u8(), "frame pushed");
        Ok(())
    }

    /// Invoke a method whose receiver, if any, lives in the current
    /// context.
    fn invoke_on_current(
        &mut self,
        package: PackageId,
        method_offset: u16,
        virtual_call: bool,
    ) -> Result<(), Fault> {
        let header = self.callee_header(package, method_offset)?;
        self.push_callee_frame(header, package, virtual_call)
    }

    /// Invoke an instance method, routing a cross-context receiver through
    /// the firewall: denied unless the receiver's class is Shareable, and
    /// then executed in a fresh context owned by the receiver's applet.
    fn invoke_instance(&mut self, package: PackageId, method_offset: u16) -> Result<(), Fault> {
        let header = self.callee_header(package, method_offset)?;
        if header.nargs == 0 {
            return Err(Fault::Security);
        }

        let this = JRef::from_word(self.peek(header.nargs as usize - 1)?);
        if this.is_null() {
            return Err(Fault::NullPointer);
        }

        let owner = self.heap.get(this)?.owner();
        let current = self.current_applet()?;
        if !firewall::is_cross_context(owner, current) {
            return self.push_callee_frame(header, package, true);
        }

        #[cfg(feature = "firewall-checks")]
        {
            let shareable = match self.heap.get(this)?.body() {
                ObjectBody::Instance {
                    package: instance_package,
                    class_index,
                    ..
                } => self
                    .flash
                    .cap(*instance_package)?
                    .class()?
                    .class_info(*class_index)?
                    .is_shareable()?,
                _ => false,
            };
            if !shareable {
                return Err(Fault::Security);
            }
        }

        let locals = header.nargs as usize + header.max_locals as usize;
        let args = self.pop_words(header.nargs as usize)?;
        let mut context = Context::new(owner, package);
        context.stack.push_frame_with_args(
            &args,
            locals,
            header.max_stack,
            Pc::new(header.code_offset),
            package,
        )?;

        debug!(
            from = current.to_u8(),
            to = owner.to_u8(),
            "context switch"
        );
        self.contexts.push(context);
        Ok(())
    }

    pub(crate) fn op_invokestatic(&mut self) -> Result<(), Fault> {
        let index = self.fetch_u16()?;
        let package = self.current_package()?;
        let sref = ConstantPoolHandler::new(&self.flash, package).static_method_ref(index)?;
        let (target, offset) = self.resolve_static_method_ref(sref)?;
        self.invoke_on_current(target, offset, false)
    }

    pub(crate) fn op_invokevirtual(&mut self) -> Result<(), Fault> {
        let index = self.fetch_u16()?;
        let package = self.current_package()?;
        let vref = ConstantPoolHandler::new(&self.flash, package).virtual_method_ref(index)?;
        let handler = ClassHandler::new(&self.flash, package);

        // Resolution against the declared class validates the token and
        // yields the argument count.
        let (declared_package, declared_offset) = handler.method_offset(vref)?;
        let header = self.callee_header(declared_package, declared_offset)?;
        if header.nargs == 0 {
            return Err(Fault::Security);
        }

        let this = JRef::from_word(self.peek(header.nargs as usize - 1)?);
        if this.is_null() {
            return Err(Fault::NullPointer);
        }

        // Dispatch on the receiver's runtime class; arrays fall back to the
        // declared resolution, their method tables being the root class's.
        let (target, offset) = match self.heap.get(this)?.body() {
            ObjectBody::Instance {
                package: instance_package,
                class_index,
                ..
            } => handler.virtual_dispatch((*instance_package, *class_index), vref)?,
            _ => (declared_package, declared_offset),
        };

        self.invoke_instance(target, offset)
    }

    pub(crate) fn op_invokespecial(&mut self) -> Result<(), Fault> {
        let index = self.fetch_u16()?;
        let package = self.current_package()?;
        let cp = ConstantPoolHandler::new(&self.flash, package);
        let entry = cp.entry(index)?;

        if entry.tag == CpTag::StaticMethodref as u8 {
            // A private instance method or constructor, statically linked.
            let (target, offset) = self.resolve_static_method_ref(entry.static_ref())?;
            self.invoke_on_current(target, offset, true)
        } else if entry.tag == CpTag::SuperMethodref as u8 {
            let vref = cp.super_method_ref(index)?;
            // A super invocation names a class of the invoking package.
            if vref.class_ref.is_external() {
                return Err(Fault::Security);
            }
            let (target, offset) = ClassHandler::new(&self.flash, package).method_offset(vref)?;
            self.invoke_on_current(target, offset, true)
        } else {
            Err(Fault::Security)
        }
    }

    pub(crate) fn op_invokeinterface(&mut self) -> Result<(), Fault> {
        let nargs = self.fetch_u8()?;
        let index = self.fetch_u16()?;
        let method_index = self.fetch_u8()?;
        if nargs == 0 {
            return Err(Fault::Security);
        }

        let package = self.current_package()?;
        let cp = ConstantPoolHandler::new(&self.flash, package);
        let interface = cp.resolve_class_ref(cp.class_ref(index)?)?;

        let this = JRef::from_word(self.peek(nargs as usize - 1)?);
        if this.is_null() {
            return Err(Fault::NullPointer);
        }

        let receiver: Option<(PackageId, ClassIndex)> = match self.heap.get(this)?.body() {
            ObjectBody::Instance {
                package: instance_package,
                class_index,
                ..
            } => Some((*instance_package, *class_index)),
            _ => None,
        };

        let (target, offset) = ClassHandler::new(&self.flash, package)
            .implemented_interface_method_offset(receiver, interface, method_index)?;
        self.invoke_instance(target, offset)
    }

    /// Pop the returning frame, hand the return words to the caller, and
    /// restore the caller's package, crossing back over a context switch
    /// when the callee was the last frame of its context.
    pub(crate) fn op_return(&mut self, kind: ReturnKind) -> Result<ExecuteState, Fault> {
        let words = self.pop_words(kind.words())?;
        let value = match kind {
            ReturnKind::Void => ReturnValue::Void,
            ReturnKind::Short => ReturnValue::Short(words[0]),
            ReturnKind::Reference => ReturnValue::Reference(JRef::from_word(words[0])),
            ReturnKind::Int => {
                ReturnValue::Int(((words[0] as u16 as u32) << 16 | words[1] as u16 as u32) as i32)
            }
        };

        {
            let context = self.context_mut()?;
            context.stack.pop_frame()?;
            if context.stack.has_frames() {
                for word in &words {
                    context.stack.push_value(*word)?;
                }
                let package = context.stack.frame()?.package();
                context.set_current_package(package);
                return Ok(ExecuteState::Proceed);
            }
        }

        // The context's bottommost frame returned.
        self.contexts.pop();
        match self.contexts.last_mut() {
            Some(previous) => {
                for word in &words {
                    previous.stack.push_value(*word)?;
                }
                let package = previous.stack.frame()?.package();
                previous.set_current_package(package);
                debug!("context restored");
                Ok(ExecuteState::Proceed)
            }
            None => Ok(ExecuteState::Returned(value)),
        }
    }

    /// Unwind a thrown fault or exception object: scan each active frame's
    /// exception-handler table, popping frames and contexts until a handler
    /// catches it or the machine is empty.
    pub(crate) fn unwind(&mut self, thrown: Thrown) -> Result<ExecuteState, InterpreterError> {
        debug!(?thrown, "unwinding");

        let exception_class = match thrown {
            Thrown::Object(reference) => match self.heap.get(reference)?.body() {
                ObjectBody::Instance {
                    package,
                    class_index,
                    ..
                } => Some((*package, *class_index)),
                // Only class instances are throwable.
                _ => return Err(InterpreterError::Fault(Fault::Security)),
            },
            Thrown::Fault(_) => None,
        };

        loop {
            while let Some(context) = self.contexts.last() {
                if context.stack.has_frames() {
                    break;
                }
                self.contexts.pop();
            }
            if self.contexts.is_empty() {
                return Err(match thrown {
                    Thrown::Fault(fault) => InterpreterError::Fault(fault),
                    Thrown::Object(reference) => InterpreterError::UncaughtException(reference),
                });
            }

            let (package, pc) = {
                let frame = self.context()?.stack.frame()?;
                (frame.package(), frame.pc().offset())
            };

            if let Some(handler) = self.find_handler(package, pc, exception_class)? {
                let context = self.context_mut()?;
                let frame = context.stack.frame_mut()?;
                frame.clear_operands();
                frame.pc_mut().set(handler.handler_offset);
                if let Thrown::Object(reference) = thrown {
                    context.stack.push_value(reference.to_word())?;
                }
                debug!(handler = handler.handler_offset, "caught");
                return Ok(ExecuteState::Proceed);
            }

            let context = self.context_mut()?;
            context.stack.pop_frame()?;
            if context.stack.has_frames() {
                let package = context.stack.frame()?.package();
                context.set_current_package(package);
            }
        }
    }

    /// The first handler of `package`'s Method component covering `pc` that
    /// matches the thrown kind: catch-all entries match everything, typed
    /// entries only exception objects of a compatible class.
    fn find_handler(
        &self,
        package: PackageId,
        pc: u16,
        exception_class: Option<(PackageId, ClassIndex)>,
    ) -> Result<Option<ExceptionHandler>, Fault> {
        let method = self.flash.cap(package)?.method()?;
        for index in 0..method.handler_count()? {
            let handler = method.handler(index)?;
            if !handler.covers(pc) {
                continue;
            }
            if handler.catch_type_index == 0 {
                return Ok(Some(handler));
            }
            let Some(thrown_class) = exception_class else {
                continue;
            };

            let cp = ConstantPoolHandler::new(&self.flash, package);
            let caught = cp.resolve_class_ref(cp.class_ref(handler.catch_type_index)?)?;
            if ClassHandler::new(&self.flash, package).type_compatible(thrown_class, caught)? {
                return Ok(Some(handler));
            }
        }
        Ok(None)
    }
}
