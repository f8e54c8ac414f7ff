//! Arithmetic and logic helpers.

use jcvm_asm::Fault;
use jcvm_types::{JInt, JShort};

use crate::interpreter::Interpreter;

impl Interpreter {
    /// Pop two shorts, push `op(a, b)`; `None` is a division-style error.
    pub(crate) fn alu_short(
        &mut self,
        op: impl FnOnce(JShort, JShort) -> Option<JShort>,
    ) -> Result<(), Fault> {
        let (a, b) = self.pop_short_pair()?;
        let value = op(a, b).ok_or(Fault::Arithmetic)?;
        self.push(value)
    }

    /// Pop two ints, push `op(a, b)`; `None` is a division-style error.
    pub(crate) fn alu_int(
        &mut self,
        op: impl FnOnce(JInt, JInt) -> Option<JInt>,
    ) -> Result<(), Fault> {
        let (a, b) = self.pop_int_pair()?;
        let value = op(a, b).ok_or(Fault::Arithmetic)?;
        self.push_int(value)
    }

    /// `sinc` / `sinc_w`: increment a local short by an inline constant.
    pub(crate) fn op_sinc(&mut self, wide: bool) -> Result<(), Fault> {
        let local = self.fetch_u8()?;
        let constant = if wide {
            self.fetch_i16()?
        } else {
            self.fetch_i8()? as JShort
        };
        let value = self.read_local_word(local)?;
        self.write_local_word(local, value.wrapping_add(constant))
    }

    /// `iinc` / `iinc_w`: increment a local int pair by an inline constant.
    pub(crate) fn op_iinc(&mut self, wide: bool) -> Result<(), Fault> {
        let local = self.fetch_u8()?;
        let constant = if wide {
            self.fetch_i16()? as JInt
        } else {
            self.fetch_i8()? as JInt
        };
        let value = self.read_local_int(local)?;
        self.write_local_int(local, value.wrapping_add(constant))
    }
}
