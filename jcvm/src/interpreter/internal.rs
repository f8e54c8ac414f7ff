//! Shared plumbing between the opcode handlers.

use jcvm_asm::{Fault, Pc};
use jcvm_types::{AppletId, JInt, JRef, JShort, JWord, PackageId};

use crate::context::Context;
use crate::firewall;
use crate::heap::HeapObject;
use crate::interpreter::Interpreter;

impl Interpreter {
    pub(crate) fn context(&self) -> Result<&Context, Fault> {
        self.contexts.last().ok_or(Fault::Security)
    }

    pub(crate) fn context_mut(&mut self) -> Result<&mut Context, Fault> {
        self.contexts.last_mut().ok_or(Fault::Security)
    }

    pub(crate) fn current_package(&self) -> Result<PackageId, Fault> {
        Ok(self.context()?.current_package())
    }

    pub(crate) fn current_applet(&self) -> Result<AppletId, Fault> {
        Ok(self.context()?.applet())
    }

    /// Run a closure over the current frame's PC and its method component
    /// info area; every operand fetch goes through here.
    pub(crate) fn with_pc<T>(
        &mut self,
        f: impl FnOnce(&mut Pc, &[u8]) -> Result<T, Fault>,
    ) -> Result<T, Fault> {
        let context = self.contexts.last_mut().ok_or(Fault::Security)?;
        let frame = context.stack.frame_mut()?;
        let code = self.flash.cap(frame.package())?.method()?.info();
        f(frame.pc_mut(), code)
    }

    pub(crate) fn pc_offset(&self) -> Result<u16, Fault> {
        Ok(self.context()?.stack.frame()?.pc().offset())
    }

    pub(crate) fn fetch_u8(&mut self) -> Result<u8, Fault> {
        self.with_pc(|pc, code| pc.next_u8(code))
    }

    pub(crate) fn fetch_i8(&mut self) -> Result<i8, Fault> {
        self.with_pc(|pc, code| pc.next_byte(code))
    }

    pub(crate) fn fetch_u16(&mut self) -> Result<u16, Fault> {
        self.with_pc(|pc, code| pc.next_u16(code))
    }

    pub(crate) fn fetch_i16(&mut self) -> Result<i16, Fault> {
        self.with_pc(|pc, code| pc.next_short(code))
    }

    pub(crate) fn fetch_i32(&mut self) -> Result<i32, Fault> {
        self.with_pc(|pc, code| pc.next_int(code))
    }

    /// Redirect the current frame's PC relative to the opcode at `base`.
    pub(crate) fn branch_to(&mut self, base: u16, offset: i16) -> Result<(), Fault> {
        self.context_mut()?
            .stack
            .frame_mut()?
            .pc_mut()
            .branch(base, offset)
    }

    pub(crate) fn push(&mut self, value: JWord) -> Result<(), Fault> {
        self.context_mut()?.stack.push_value(value)
    }

    pub(crate) fn pop(&mut self) -> Result<JWord, Fault> {
        self.context_mut()?.stack.pop_value()
    }

    pub(crate) fn peek(&self, depth: usize) -> Result<JWord, Fault> {
        self.context()?.stack.peek_value(depth)
    }

    /// Push an int as two words, high word first.
    pub(crate) fn push_int(&mut self, value: JInt) -> Result<(), Fault> {
        self.push((value >> 16) as JWord)?;
        self.push(value as JWord)
    }

    /// Pop an int pushed as two words.
    pub(crate) fn pop_int(&mut self) -> Result<JInt, Fault> {
        let low = self.pop()? as u16;
        let high = self.pop()? as u16;
        Ok(((high as u32) << 16 | low as u32) as JInt)
    }

    pub(crate) fn push_ref(&mut self, reference: JRef) -> Result<(), Fault> {
        self.push(reference.to_word())
    }

    pub(crate) fn pop_ref(&mut self) -> Result<JRef, Fault> {
        Ok(JRef::from_word(self.pop()?))
    }

    pub(crate) fn read_local_word(&self, local: u8) -> Result<JWord, Fault> {
        self.context()?.stack.read_local(local)
    }

    pub(crate) fn write_local_word(&mut self, local: u8, value: JWord) -> Result<(), Fault> {
        self.context_mut()?.stack.write_local(local, value)
    }

    /// Read an int from a local pair, high word first.
    pub(crate) fn read_local_int(&self, local: u8) -> Result<JInt, Fault> {
        let high = self.read_local_word(local)? as u16;
        let low = self.read_local_word(local + 1)? as u16;
        Ok(((high as u32) << 16 | low as u32) as JInt)
    }

    pub(crate) fn write_local_int(&mut self, local: u8, value: JInt) -> Result<(), Fault> {
        self.write_local_word(local, (value >> 16) as JWord)?;
        self.write_local_word(local + 1, value as JWord)
    }

    /// Firewall-checked dereference.
    pub(crate) fn object(&self, reference: JRef) -> Result<&HeapObject, Fault> {
        let object = self.heap.get(reference)?;
        firewall::check_access(object.owner(), self.current_applet()?)?;
        Ok(object)
    }

    /// Firewall-checked mutable dereference.
    pub(crate) fn object_mut(&mut self, reference: JRef) -> Result<&mut HeapObject, Fault> {
        let current = self.current_applet()?;
        let object = self.heap.get_mut(reference)?;
        firewall::check_access(object.owner(), current)?;
        Ok(object)
    }

    pub(crate) fn pop_words(&mut self, count: usize) -> Result<Vec<JWord>, Fault> {
        let mut words = vec![0 as JWord; count];
        for slot in words.iter_mut().rev() {
            *slot = self.pop()?;
        }
        Ok(words)
    }

    /// Pop a binary operand pair in evaluation order.
    pub(crate) fn pop_short_pair(&mut self) -> Result<(JShort, JShort), Fault> {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }

    pub(crate) fn pop_int_pair(&mut self) -> Result<(JInt, JInt), Fault> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        Ok((a, b))
    }
}
