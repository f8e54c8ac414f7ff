//! The per-context frame stack.

use jcvm_asm::{Fault, Pc};
use jcvm_types::{JWord, PackageId};

use crate::consts::STACK_SIZE;
use crate::frame::Frame;

/// A context's execution stack: one bounded word buffer shared by all its
/// frames, plus the frame descriptors themselves.
///
/// Frames are allocated head to tail. On a call the arguments already on
/// the caller's operand stack become the callee's first locals in place;
/// only the descriptors move.
#[derive(Debug)]
pub struct Stack {
    words: Vec<JWord>,
    frames: Vec<Frame>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    /// An empty stack with the configured buffer size.
    pub fn new() -> Self {
        Self {
            words: vec![0; STACK_SIZE],
            frames: Vec::new(),
        }
    }

    /// Whether any frame is live.
    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    /// The current (topmost) frame.
    pub fn frame(&self) -> Result<&Frame, Fault> {
        self.frames.last().ok_or(Fault::Security)
    }

    /// The current frame, mutable.
    pub fn frame_mut(&mut self) -> Result<&mut Frame, Fault> {
        self.frames.last_mut().ok_or(Fault::Security)
    }

    /// Allocate a frame for a callee whose arguments sit on the caller's
    /// operand stack.
    ///
    /// `locals` is the full size of the locals region, arguments included.
    pub fn push_frame(
        &mut self,
        nargs: u8,
        locals: usize,
        max_stack: u8,
        pc: Pc,
        package: PackageId,
    ) -> Result<(), Fault> {
        if locals < nargs as usize {
            return Err(Fault::Security);
        }

        let fp = match self.frames.last_mut() {
            Some(caller) => {
                if caller.operand_depth() < nargs as usize {
                    return Err(Fault::StackUnderflow);
                }
                // The arguments are consumed in place as locals 0..nargs.
                caller.tos -= nargs as usize;
                caller.tos
            }
            None => 0,
        };

        self.install_frame(fp, nargs, locals, max_stack, pc, package)
    }

    /// Allocate a frame on an empty region and marshal `args` into its
    /// first locals, as a cross-context call or the bootstrap does.
    pub fn push_frame_with_args(
        &mut self,
        args: &[JWord],
        locals: usize,
        max_stack: u8,
        pc: Pc,
        package: PackageId,
    ) -> Result<(), Fault> {
        if locals < args.len() {
            return Err(Fault::Security);
        }

        let fp = self.frames.last().map(|frame| frame.tos).unwrap_or(0);
        let nargs = u8::try_from(args.len()).map_err(|_| Fault::Security)?;
        self.install_frame(fp, nargs, locals, max_stack, pc, package)?;
        self.words[fp..fp + args.len()].copy_from_slice(args);
        Ok(())
    }

    fn install_frame(
        &mut self,
        fp: usize,
        nargs: u8,
        locals: usize,
        max_stack: u8,
        pc: Pc,
        package: PackageId,
    ) -> Result<(), Fault> {
        let op = fp + locals;
        let eos = op + max_stack as usize;
        if eos > self.words.len() {
            return Err(Fault::StackOverflow);
        }

        #[cfg(feature = "clean-stack")]
        self.words[fp + nargs as usize..op].fill(0);
        #[cfg(not(feature = "clean-stack"))]
        let _ = nargs;

        self.frames.push(Frame::new(fp, op, eos, pc, package));
        Ok(())
    }

    /// Destroy the current frame, releasing its buffer region.
    pub fn pop_frame(&mut self) -> Result<Frame, Fault> {
        let frame = self.frames.pop().ok_or(Fault::StackUnderflow)?;

        #[cfg(feature = "clean-stack")]
        self.words[frame.fp..frame.eos].fill(0);

        Ok(frame)
    }

    /// Push a word onto the current frame's operand stack.
    pub fn push_value(&mut self, value: JWord) -> Result<(), Fault> {
        let frame = self.frames.last_mut().ok_or(Fault::Security)?;
        frame.push_value(&mut self.words, value)
    }

    /// Pop a word off the current frame's operand stack.
    pub fn pop_value(&mut self) -> Result<JWord, Fault> {
        let frame = self.frames.last_mut().ok_or(Fault::Security)?;
        frame.pop_value(&self.words)
    }

    /// The word `depth` positions below the current top.
    pub fn peek_value(&self, depth: usize) -> Result<JWord, Fault> {
        let frame = self.frames.last().ok_or(Fault::Security)?;
        frame.peek_value(&self.words, depth)
    }

    /// Read a local of the current frame.
    pub fn read_local(&self, local: u8) -> Result<JWord, Fault> {
        let frame = self.frames.last().ok_or(Fault::Security)?;
        frame.read_local(&self.words, local)
    }

    /// Write a local of the current frame.
    pub fn write_local(&mut self, local: u8, value: JWord) -> Result<(), Fault> {
        let frame = self.frames.last_mut().ok_or(Fault::Security)?;
        frame.write_local(&mut self.words, local, value)
    }

    /// Duplicate the top `m` operand words and insert the copy `n` words
    /// down; `n == 0` duplicates on top.
    pub(crate) fn dup_words(&mut self, m: usize, n: usize) -> Result<(), Fault> {
        let frame = self.frames.last_mut().ok_or(Fault::Security)?;
        let depth = frame.tos - frame.op;
        if m == 0 || m > depth || n > depth || (n != 0 && n < m) {
            return Err(Fault::Security);
        }
        if frame.tos + m > frame.eos {
            return Err(Fault::StackOverflow);
        }

        let tos = frame.tos;
        let top: Vec<JWord> = self.words[tos - m..tos].to_vec();
        if n == 0 {
            self.words[tos..tos + m].copy_from_slice(&top);
        } else {
            self.words.copy_within(tos - n..tos, tos - n + m);
            self.words[tos - n..tos - n + m].copy_from_slice(&top);
        }
        frame.tos += m;
        Ok(())
    }

    /// Swap the top `m` operand words with the `n` words beneath them.
    pub(crate) fn swap_words(&mut self, m: usize, n: usize) -> Result<(), Fault> {
        let frame = self.frames.last().ok_or(Fault::Security)?;
        if m == 0 || n == 0 || m + n > frame.operand_depth() {
            return Err(Fault::Security);
        }
        let tos = frame.tos;
        self.words[tos - m - n..tos].rotate_left(n);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> PackageId {
        PackageId::new(0).unwrap()
    }

    #[test]
    fn callee_arguments_become_locals_in_place() {
        let mut stack = Stack::new();
        stack
            .push_frame(0, 0, 4, Pc::new(0), package())
            .unwrap();
        stack.push_value(0x11).unwrap();
        stack.push_value(0x22).unwrap();

        // Callee takes both words as arguments, one extra local, own stack.
        stack.push_frame(2, 3, 2, Pc::new(9), package()).unwrap();
        assert_eq!(stack.read_local(0).unwrap(), 0x11);
        assert_eq!(stack.read_local(1).unwrap(), 0x22);
        // The extra local was zeroed.
        assert_eq!(stack.read_local(2).unwrap(), 0);

        // The caller's operand stack no longer holds the arguments.
        stack.pop_frame().unwrap();
        assert_eq!(stack.pop_value(), Err(Fault::StackUnderflow));
    }

    #[test]
    fn frame_reservation_is_bounded() {
        let mut stack = Stack::new();
        let mut outcome = Ok(());
        for _ in 0..=STACK_SIZE {
            outcome = stack.push_frame(0, 32, 32, Pc::new(0), package());
            if outcome.is_err() {
                break;
            }
        }
        assert_eq!(outcome, Err(Fault::StackOverflow));
    }

    #[test]
    fn missing_arguments_underflow() {
        let mut stack = Stack::new();
        stack.push_frame(0, 0, 1, Pc::new(0), package()).unwrap();
        assert_eq!(
            stack.push_frame(1, 1, 1, Pc::new(0), package()),
            Err(Fault::StackUnderflow)
        );
    }

    #[test]
    fn marshalled_arguments_land_in_locals() {
        let mut stack = Stack::new();
        stack
            .push_frame_with_args(&[5, 6], 3, 2, Pc::new(0), package())
            .unwrap();
        assert_eq!(stack.read_local(0).unwrap(), 5);
        assert_eq!(stack.read_local(1).unwrap(), 6);
        assert_eq!(stack.read_local(2).unwrap(), 0);
    }
}
