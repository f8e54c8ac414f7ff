//! The Method component: exception handlers and method bodies.

use bitflags::bitflags;
use jcvm_asm::Fault;

use crate::component::{read_u16, read_u8};

bitflags! {
    /// Access flags of a method header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodFlags: u8 {
        /// The header is in extended form.
        const EXTENDED = 0x8;
        /// The method has no body.
        const ABSTRACT = 0x4;
    }
}

/// One entry of the component-wide exception handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First covered offset in the info area.
    pub start_offset: u16,
    /// Length of the covered range.
    pub active_length: u16,
    /// Whether the handler terminates a nested handler chain.
    pub stop: bool,
    /// Info-area offset of the handler code.
    pub handler_offset: u16,
    /// Constant-pool offset of the caught class, or 0 to catch everything.
    pub catch_type_index: u16,
}

impl ExceptionHandler {
    /// Whether the handler covers the given info-area offset.
    pub fn covers(&self, offset: u16) -> bool {
        offset >= self.start_offset
            && (offset - self.start_offset) < self.active_length
    }
}

/// A decoded method header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodHeader {
    /// Access flags.
    pub flags: MethodFlags,
    /// Operand-stack words the method may use.
    pub max_stack: u8,
    /// Argument words, including `this` for instance methods.
    pub nargs: u8,
    /// Local-variable words beyond the arguments.
    pub max_locals: u8,
    /// Info-area offset of the first opcode.
    pub code_offset: u16,
}

/// The Method component.
///
/// ```text
/// handler_count        u8
/// exception_handlers   8 bytes × count
/// methods              headers + bytecode
/// ```
///
/// Method offsets, exception handler offsets and the program counter all
/// address the same info area, starting at the handler count.
#[derive(Debug, Clone, Copy)]
pub struct MethodComponent<'a> {
    info: &'a [u8],
}

impl<'a> MethodComponent<'a> {
    const HANDLER_SIZE: usize = 8;

    pub(crate) const fn new(info: &'a [u8]) -> Self {
        Self { info }
    }

    /// The raw info area; the program counter walks this region.
    pub const fn info(&self) -> &'a [u8] {
        self.info
    }

    /// Number of exception handler entries.
    pub fn handler_count(&self) -> Result<u8, Fault> {
        read_u8(self.info, 0)
    }

    /// The exception handler entry at `index`.
    pub fn handler(&self, index: u8) -> Result<ExceptionHandler, Fault> {
        if index >= self.handler_count()? {
            return Err(Fault::Security);
        }
        let at = 1 + index as usize * Self::HANDLER_SIZE;
        let bits = read_u16(self.info, at + 2)?;
        Ok(ExceptionHandler {
            start_offset: read_u16(self.info, at)?,
            active_length: bits & 0x7FFF,
            stop: bits & 0x8000 != 0,
            handler_offset: read_u16(self.info, at + 4)?,
            catch_type_index: read_u16(self.info, at + 6)?,
        })
    }

    /// Decode the method header at `offset`.
    pub fn header(&self, offset: u16) -> Result<MethodHeader, Fault> {
        let at = offset as usize;
        let packed = read_u8(self.info, at)?;
        let flags = MethodFlags::from_bits_truncate(packed >> 4);

        if flags.contains(MethodFlags::EXTENDED) {
            Ok(MethodHeader {
                flags,
                max_stack: read_u8(self.info, at + 1)?,
                nargs: read_u8(self.info, at + 2)?,
                max_locals: read_u8(self.info, at + 3)?,
                code_offset: offset + 4,
            })
        } else {
            let second = read_u8(self.info, at + 1)?;
            Ok(MethodHeader {
                flags,
                max_stack: packed & 0x0F,
                nargs: second >> 4,
                max_locals: second & 0x0F,
                code_offset: offset + 2,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> Vec<u8> {
        let mut info = vec![0x01]; // one handler
        info.extend_from_slice(&[
            0x00, 0x0B, // start
            0x80, 0x04, // stop bit set, active length 4
            0x00, 0x14, // handler offset
            0x00, 0x00, // catch everything
        ]);
        // Normal header at 9: max_stack 2, nargs 1, max_locals 3.
        info.extend_from_slice(&[0x02, 0x13]);
        // Code.
        info.extend_from_slice(&[0x7A, 0x00]);
        // Extended header at 13.
        info.extend_from_slice(&[0x80, 0x11, 0x02, 0x04]);
        info
    }

    #[test]
    fn normal_header() {
        let info = sample_info();
        let component = MethodComponent::new(&info);
        let header = component.header(9).unwrap();

        assert_eq!(header.flags, MethodFlags::empty());
        assert_eq!(header.max_stack, 2);
        assert_eq!(header.nargs, 1);
        assert_eq!(header.max_locals, 3);
        assert_eq!(header.code_offset, 11);
    }

    #[test]
    fn extended_header() {
        let info = sample_info();
        let component = MethodComponent::new(&info);
        let header = component.header(13).unwrap();

        assert!(header.flags.contains(MethodFlags::EXTENDED));
        assert_eq!(header.max_stack, 0x11);
        assert_eq!(header.nargs, 2);
        assert_eq!(header.max_locals, 4);
        assert_eq!(header.code_offset, 17);
    }

    #[test]
    fn handler_coverage() {
        let info = sample_info();
        let component = MethodComponent::new(&info);

        assert_eq!(component.handler_count().unwrap(), 1);
        let handler = component.handler(0).unwrap();
        assert!(handler.stop);
        assert_eq!(handler.catch_type_index, 0);
        assert!(!handler.covers(0x0A));
        assert!(handler.covers(0x0B));
        assert!(handler.covers(0x0E));
        assert!(!handler.covers(0x0F));

        assert_eq!(component.handler(1), Err(Fault::Security));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let info = [0x00, 0x02];
        let component = MethodComponent::new(&info);
        assert_eq!(component.header(1), Err(Fault::Security));
    }
}
