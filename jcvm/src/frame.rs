//! A single call activation.

use jcvm_asm::{Fault, Pc};
use jcvm_types::{JWord, PackageId};

/// A program counter saved by `jsr`, consumable exactly once by `ret`.
#[derive(Debug, Clone, Copy)]
struct OldPc {
    used: bool,
    pc: Pc,
}

/// One method activation on a context's stack.
///
/// The four indices address the context's shared word buffer and satisfy
/// `fp <= op <= tos <= eos` at every instruction boundary: `fp..op` is the
/// locals region, `op..tos` the operand stack, `tos..eos` free reservation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub(crate) fp: usize,
    pub(crate) op: usize,
    pub(crate) tos: usize,
    pub(crate) eos: usize,
    pc: Pc,
    package: PackageId,
    old_pcs: Vec<OldPc>,
}

impl Frame {
    pub(crate) fn new(fp: usize, op: usize, eos: usize, pc: Pc, package: PackageId) -> Self {
        Self {
            fp,
            op,
            tos: op,
            eos,
            pc,
            package,
            old_pcs: Vec::new(),
        }
    }

    /// The package of the executing method.
    pub fn package(&self) -> PackageId {
        self.package
    }

    /// The method program counter.
    pub fn pc(&self) -> &Pc {
        &self.pc
    }

    /// The method program counter, mutable.
    pub fn pc_mut(&mut self) -> &mut Pc {
        &mut self.pc
    }

    /// Words currently on the operand stack.
    pub fn operand_depth(&self) -> usize {
        self.tos - self.op
    }

    /// Drop every operand, as when entering an exception handler.
    pub(crate) fn clear_operands(&mut self) {
        self.tos = self.op;
    }

    /// Push a word onto the operand stack.
    pub(crate) fn push_value(&mut self, words: &mut [JWord], value: JWord) -> Result<(), Fault> {
        if self.tos >= self.eos {
            return Err(Fault::StackOverflow);
        }
        words[self.tos] = value;
        self.tos += 1;
        Ok(())
    }

    /// Pop the top word off the operand stack.
    pub(crate) fn pop_value(&mut self, words: &[JWord]) -> Result<JWord, Fault> {
        if self.tos <= self.op {
            return Err(Fault::StackUnderflow);
        }
        self.tos -= 1;
        Ok(words[self.tos])
    }

    /// The word `depth` positions below the top, without popping.
    pub(crate) fn peek_value(&self, words: &[JWord], depth: usize) -> Result<JWord, Fault> {
        if depth >= self.operand_depth() {
            return Err(Fault::StackUnderflow);
        }
        Ok(words[self.tos - 1 - depth])
    }

    /// Read local variable `local`.
    ///
    /// A local index reaching into the operand region is reported as
    /// `StackOverflow`: the locals escaped their reservation.
    pub(crate) fn read_local(&self, words: &[JWord], local: u8) -> Result<JWord, Fault> {
        let at = self.fp + local as usize;
        if at >= self.op {
            return Err(Fault::StackOverflow);
        }
        Ok(words[at])
    }

    /// Write local variable `local`.
    pub(crate) fn write_local(
        &mut self,
        words: &mut [JWord],
        local: u8,
        value: JWord,
    ) -> Result<(), Fault> {
        let at = self.fp + local as usize;
        if at >= self.op {
            return Err(Fault::StackOverflow);
        }
        words[at] = value;
        Ok(())
    }

    /// Save the current PC for a `jsr`, returning the slot index left on
    /// the stack as the returnAddress word.
    pub fn save_pc(&mut self) -> Result<u8, Fault> {
        let index = u8::try_from(self.old_pcs.len()).map_err(|_| Fault::Security)?;
        self.old_pcs.push(OldPc {
            used: false,
            pc: self.pc,
        });
        Ok(index)
    }

    /// Consume the saved PC at `index` for a `ret`. A slot is good for one
    /// use; consuming it twice is a firewall violation.
    pub fn restore_pc(&mut self, index: u8) -> Result<Pc, Fault> {
        let slot = self
            .old_pcs
            .get_mut(index as usize)
            .ok_or(Fault::IndexOutOfBounds)?;
        if slot.used {
            return Err(Fault::Security);
        }
        slot.used = true;
        Ok(slot.pc)
    }

    /// Replace the program counter, as `ret` and branch targets do.
    pub fn set_pc(&mut self, pc: Pc) {
        self.pc = pc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> (Frame, Vec<JWord>) {
        // Two locals at 0..2, operands at 2..5.
        (
            Frame::new(0, 2, 5, Pc::new(0), PackageId::new(0).unwrap()),
            vec![0; 8],
        )
    }

    #[test]
    fn push_pop_is_lifo() {
        let (mut frame, mut words) = frame();

        frame.push_value(&mut words, 10).unwrap();
        frame.push_value(&mut words, 20).unwrap();
        assert_eq!(frame.operand_depth(), 2);
        assert_eq!(frame.pop_value(&words).unwrap(), 20);
        assert_eq!(frame.pop_value(&words).unwrap(), 10);
    }

    #[test]
    fn overflow_at_the_edge_only() {
        let (mut frame, mut words) = frame();

        for v in 0..3 {
            frame.push_value(&mut words, v).unwrap();
        }
        assert_eq!(frame.push_value(&mut words, 3), Err(Fault::StackOverflow));
        // A full stack still pops.
        assert_eq!(frame.pop_value(&words).unwrap(), 2);
    }

    #[test]
    fn underflow_is_checked_before_the_move() {
        let (mut frame, words) = frame();
        assert_eq!(frame.pop_value(&words), Err(Fault::StackUnderflow));
        assert_eq!(frame.tos, frame.op);
    }

    #[test]
    fn locals_may_not_escape_into_the_operand_region() {
        let (mut frame, mut words) = frame();

        frame.write_local(&mut words, 1, 7).unwrap();
        assert_eq!(frame.read_local(&words, 1).unwrap(), 7);
        assert_eq!(frame.read_local(&words, 2), Err(Fault::StackOverflow));
        assert_eq!(frame.write_local(&mut words, 2, 0), Err(Fault::StackOverflow));
    }

    #[test]
    fn saved_pcs_are_single_use() {
        let (mut frame, _) = frame();
        frame.set_pc(Pc::new(0x42));

        let index = frame.save_pc().unwrap();
        assert_eq!(index, 0);

        let pc = frame.restore_pc(index).unwrap();
        assert_eq!(pc.offset(), 0x42);
        assert_eq!(frame.restore_pc(index), Err(Fault::Security));
        assert_eq!(frame.restore_pc(9), Err(Fault::IndexOutOfBounds));
    }

    #[test]
    fn save_restore_round_trips_the_pc() {
        let (mut frame, _) = frame();
        frame.set_pc(Pc::new(0x1234));

        let index = frame.save_pc().unwrap();
        frame.set_pc(Pc::new(0));
        assert_eq!(frame.restore_pc(index).unwrap().offset(), 0x1234);
    }
}
