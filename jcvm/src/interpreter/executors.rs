//! The fetch-decode-dispatch loop.

use jcvm_asm::{Bytecode, Fault};
use jcvm_types::{ArrayKind, JRef, JShort};
use tracing::trace;

use crate::error::{InterpreterError, Thrown};
use crate::interpreter::flow::ReturnKind;
use crate::interpreter::memory::FieldKind;
use crate::interpreter::Interpreter;
use crate::state::{ExecuteState, ProgramState};

impl Interpreter {
    /// Run the installed bootstrap to completion.
    pub fn run(&mut self) -> Result<ProgramState, InterpreterError> {
        if self.contexts.is_empty() {
            return Err(InterpreterError::NotInitialized);
        }
        loop {
            match self.execute()? {
                ExecuteState::Proceed => continue,
                ExecuteState::Returned(value) => return Ok(ProgramState::Return(value)),
            }
        }
    }

    /// Execute a single instruction, unwinding anything it throws.
    pub fn execute(&mut self) -> Result<ExecuteState, InterpreterError> {
        match self.step() {
            Ok(state) => Ok(state),
            Err(thrown) => self.unwind(thrown),
        }
    }

    fn step(&mut self) -> Result<ExecuteState, Thrown> {
        let base = self.pc_offset()?;
        let byte = self.fetch_u8()?;
        let op = Bytecode::from_u8(byte).ok_or(Fault::Security)?;
        trace!(pc = base, ?op, "dispatch");

        match op {
            Bytecode::NOP => {}

            // Constants.
            Bytecode::ACONST_NULL => self.push_ref(JRef::NULL)?,
            Bytecode::SCONST_M1 => self.push(-1)?,
            Bytecode::SCONST_0 => self.push(0)?,
            Bytecode::SCONST_1 => self.push(1)?,
            Bytecode::SCONST_2 => self.push(2)?,
            Bytecode::SCONST_3 => self.push(3)?,
            Bytecode::SCONST_4 => self.push(4)?,
            Bytecode::SCONST_5 => self.push(5)?,
            Bytecode::ICONST_M1 => self.push_int(-1)?,
            Bytecode::ICONST_0 => self.push_int(0)?,
            Bytecode::ICONST_1 => self.push_int(1)?,
            Bytecode::ICONST_2 => self.push_int(2)?,
            Bytecode::ICONST_3 => self.push_int(3)?,
            Bytecode::ICONST_4 => self.push_int(4)?,
            Bytecode::ICONST_5 => self.push_int(5)?,
            Bytecode::BSPUSH => {
                let value = self.fetch_i8()?;
                self.push(value as JShort)?;
            }
            Bytecode::SSPUSH => {
                let value = self.fetch_i16()?;
                self.push(value)?;
            }
            Bytecode::BIPUSH => {
                let value = self.fetch_i8()?;
                self.push_int(value as i32)?;
            }
            Bytecode::SIPUSH => {
                let value = self.fetch_i16()?;
                self.push_int(value as i32)?;
            }
            Bytecode::IIPUSH => {
                let value = self.fetch_i32()?;
                self.push_int(value)?;
            }

            // Local loads.
            Bytecode::ALOAD | Bytecode::SLOAD => {
                let local = self.fetch_u8()?;
                let value = self.read_local_word(local)?;
                self.push(value)?;
            }
            Bytecode::ILOAD => {
                let local = self.fetch_u8()?;
                let value = self.read_local_int(local)?;
                self.push_int(value)?;
            }
            Bytecode::ALOAD_0 | Bytecode::SLOAD_0 => self.load_word_local(0)?,
            Bytecode::ALOAD_1 | Bytecode::SLOAD_1 => self.load_word_local(1)?,
            Bytecode::ALOAD_2 | Bytecode::SLOAD_2 => self.load_word_local(2)?,
            Bytecode::ALOAD_3 | Bytecode::SLOAD_3 => self.load_word_local(3)?,
            Bytecode::ILOAD_0 => self.load_int_local(0)?,
            Bytecode::ILOAD_1 => self.load_int_local(1)?,
            Bytecode::ILOAD_2 => self.load_int_local(2)?,
            Bytecode::ILOAD_3 => self.load_int_local(3)?,

            // Local stores.
            Bytecode::ASTORE | Bytecode::SSTORE => {
                let local = self.fetch_u8()?;
                let value = self.pop()?;
                self.write_local_word(local, value)?;
            }
            Bytecode::ISTORE => {
                let local = self.fetch_u8()?;
                let value = self.pop_int()?;
                self.write_local_int(local, value)?;
            }
            Bytecode::ASTORE_0 | Bytecode::SSTORE_0 => self.store_word_local(0)?,
            Bytecode::ASTORE_1 | Bytecode::SSTORE_1 => self.store_word_local(1)?,
            Bytecode::ASTORE_2 | Bytecode::SSTORE_2 => self.store_word_local(2)?,
            Bytecode::ASTORE_3 | Bytecode::SSTORE_3 => self.store_word_local(3)?,
            Bytecode::ISTORE_0 => self.store_int_local(0)?,
            Bytecode::ISTORE_1 => self.store_int_local(1)?,
            Bytecode::ISTORE_2 => self.store_int_local(2)?,
            Bytecode::ISTORE_3 => self.store_int_local(3)?,

            // Arrays.
            Bytecode::AALOAD => self.op_array_load(ArrayKind::Reference)?,
            Bytecode::BALOAD => self.op_array_load(ArrayKind::Byte)?,
            Bytecode::SALOAD => self.op_array_load(ArrayKind::Short)?,
            Bytecode::IALOAD => self.op_array_load(ArrayKind::Int)?,
            Bytecode::AASTORE => self.op_array_store(ArrayKind::Reference)?,
            Bytecode::BASTORE => self.op_array_store(ArrayKind::Byte)?,
            Bytecode::SASTORE => self.op_array_store(ArrayKind::Short)?,
            Bytecode::IASTORE => self.op_array_store(ArrayKind::Int)?,
            Bytecode::ARRAYLENGTH => self.op_arraylength()?,
            Bytecode::NEWARRAY => self.op_newarray()?,
            Bytecode::ANEWARRAY => self.op_anewarray()?,

            // Operand stack manipulation.
            Bytecode::POP => {
                self.pop()?;
            }
            Bytecode::POP2 => {
                self.pop()?;
                self.pop()?;
            }
            Bytecode::DUP => self.context_mut()?.stack.dup_words(1, 0)?,
            Bytecode::DUP2 => self.context_mut()?.stack.dup_words(2, 0)?,
            Bytecode::DUP_X => {
                let mn = self.fetch_u8()?;
                let (m, n) = ((mn >> 4) as usize, (mn & 0x0F) as usize);
                self.context_mut()?.stack.dup_words(m, n)?;
            }
            Bytecode::SWAP_X => {
                let mn = self.fetch_u8()?;
                let (m, n) = ((mn >> 4) as usize, (mn & 0x0F) as usize);
                self.context_mut()?.stack.swap_words(m, n)?;
            }

            // Arithmetic and logic.
            Bytecode::SADD => self.alu_short(|a, b| Some(a.wrapping_add(b)))?,
            Bytecode::IADD => self.alu_int(|a, b| Some(a.wrapping_add(b)))?,
            Bytecode::SSUB => self.alu_short(|a, b| Some(a.wrapping_sub(b)))?,
            Bytecode::ISUB => self.alu_int(|a, b| Some(a.wrapping_sub(b)))?,
            Bytecode::SMUL => self.alu_short(|a, b| Some(a.wrapping_mul(b)))?,
            Bytecode::IMUL => self.alu_int(|a, b| Some(a.wrapping_mul(b)))?,
            Bytecode::SDIV => self.alu_short(|a, b| (b != 0).then(|| a.wrapping_div(b)))?,
            Bytecode::IDIV => self.alu_int(|a, b| (b != 0).then(|| a.wrapping_div(b)))?,
            Bytecode::SREM => self.alu_short(|a, b| (b != 0).then(|| a.wrapping_rem(b)))?,
            Bytecode::IREM => self.alu_int(|a, b| (b != 0).then(|| a.wrapping_rem(b)))?,
            Bytecode::SNEG => {
                let value = self.pop()?;
                self.push(value.wrapping_neg())?;
            }
            Bytecode::INEG => {
                let value = self.pop_int()?;
                self.push_int(value.wrapping_neg())?;
            }
            Bytecode::SSHL => self.alu_short(|a, b| Some(a.wrapping_shl(b as u32 & 0x1F)))?,
            Bytecode::ISHL => self.alu_int(|a, b| Some(a.wrapping_shl(b as u32 & 0x1F)))?,
            Bytecode::SSHR => self.alu_short(|a, b| Some(a.wrapping_shr(b as u32 & 0x1F)))?,
            Bytecode::ISHR => self.alu_int(|a, b| Some(a.wrapping_shr(b as u32 & 0x1F)))?,
            Bytecode::SUSHR => self.alu_short(|a, b| {
                Some(((a as i32 as u32) >> (b as u32 & 0x1F)) as u16 as JShort)
            })?,
            Bytecode::IUSHR => self.alu_int(|a, b| Some(((a as u32) >> (b as u32 & 0x1F)) as i32))?,
            Bytecode::SAND => self.alu_short(|a, b| Some(a & b))?,
            Bytecode::IAND => self.alu_int(|a, b| Some(a & b))?,
            Bytecode::SOR => self.alu_short(|a, b| Some(a | b))?,
            Bytecode::IOR => self.alu_int(|a, b| Some(a | b))?,
            Bytecode::SXOR => self.alu_short(|a, b| Some(a ^ b))?,
            Bytecode::IXOR => self.alu_int(|a, b| Some(a ^ b))?,
            Bytecode::SINC => self.op_sinc(false)?,
            Bytecode::IINC => self.op_iinc(false)?,
            Bytecode::SINC_W => self.op_sinc(true)?,
            Bytecode::IINC_W => self.op_iinc(true)?,
            Bytecode::S2B => {
                let value = self.pop()?;
                self.push(value as i8 as JShort)?;
            }
            Bytecode::S2I => {
                let value = self.pop()?;
                self.push_int(value as i32)?;
            }
            Bytecode::I2B => {
                let value = self.pop_int()?;
                self.push(value as i8 as JShort)?;
            }
            Bytecode::I2S => {
                let value = self.pop_int()?;
                self.push(value as JShort)?;
            }
            Bytecode::ICMP => {
                let (a, b) = self.pop_int_pair()?;
                self.push((a > b) as JShort - (a < b) as JShort)?;
            }

            // Branches.
            Bytecode::IFEQ => self.op_if(base, false, |v| v == 0)?,
            Bytecode::IFNE => self.op_if(base, false, |v| v != 0)?,
            Bytecode::IFLT => self.op_if(base, false, |v| v < 0)?,
            Bytecode::IFGE => self.op_if(base, false, |v| v >= 0)?,
            Bytecode::IFGT => self.op_if(base, false, |v| v > 0)?,
            Bytecode::IFLE => self.op_if(base, false, |v| v <= 0)?,
            Bytecode::IFEQ_W => self.op_if(base, true, |v| v == 0)?,
            Bytecode::IFNE_W => self.op_if(base, true, |v| v != 0)?,
            Bytecode::IFLT_W => self.op_if(base, true, |v| v < 0)?,
            Bytecode::IFGE_W => self.op_if(base, true, |v| v >= 0)?,
            Bytecode::IFGT_W => self.op_if(base, true, |v| v > 0)?,
            Bytecode::IFLE_W => self.op_if(base, true, |v| v <= 0)?,
            Bytecode::IFNULL => self.op_ifnull(base, false, true)?,
            Bytecode::IFNONNULL => self.op_ifnull(base, false, false)?,
            Bytecode::IFNULL_W => self.op_ifnull(base, true, true)?,
            Bytecode::IFNONNULL_W => self.op_ifnull(base, true, false)?,
            Bytecode::IF_ACMPEQ => self.op_if_acmp(base, false, true)?,
            Bytecode::IF_ACMPNE => self.op_if_acmp(base, false, false)?,
            Bytecode::IF_ACMPEQ_W => self.op_if_acmp(base, true, true)?,
            Bytecode::IF_ACMPNE_W => self.op_if_acmp(base, true, false)?,
            Bytecode::IF_SCMPEQ => self.op_if_scmp(base, false, |a, b| a == b)?,
            Bytecode::IF_SCMPNE => self.op_if_scmp(base, false, |a, b| a != b)?,
            Bytecode::IF_SCMPLT => self.op_if_scmp(base, false, |a, b| a < b)?,
            Bytecode::IF_SCMPGE => self.op_if_scmp(base, false, |a, b| a >= b)?,
            Bytecode::IF_SCMPGT => self.op_if_scmp(base, false, |a, b| a > b)?,
            Bytecode::IF_SCMPLE => self.op_if_scmp(base, false, |a, b| a <= b)?,
            Bytecode::IF_SCMPEQ_W => self.op_if_scmp(base, true, |a, b| a == b)?,
            Bytecode::IF_SCMPNE_W => self.op_if_scmp(base, true, |a, b| a != b)?,
            Bytecode::IF_SCMPLT_W => self.op_if_scmp(base, true, |a, b| a < b)?,
            Bytecode::IF_SCMPGE_W => self.op_if_scmp(base, true, |a, b| a >= b)?,
            Bytecode::IF_SCMPGT_W => self.op_if_scmp(base, true, |a, b| a > b)?,
            Bytecode::IF_SCMPLE_W => self.op_if_scmp(base, true, |a, b| a <= b)?,
            Bytecode::GOTO => self.op_goto(base, false)?,
            Bytecode::GOTO_W => self.op_goto(base, true)?,
            Bytecode::STABLESWITCH => self.op_stableswitch(base)?,
            Bytecode::SLOOKUPSWITCH => self.op_slookupswitch(base)?,
            Bytecode::ITABLESWITCH => self.op_itableswitch(base)?,
            Bytecode::ILOOKUPSWITCH => self.op_ilookupswitch(base)?,
            Bytecode::JSR => self.op_jsr(base)?,
            Bytecode::RET => self.op_ret()?,

            // Statics.
            Bytecode::GETSTATIC_A => self.op_getstatic(FieldKind::Reference)?,
            Bytecode::GETSTATIC_B => self.op_getstatic(FieldKind::Byte)?,
            Bytecode::GETSTATIC_S => self.op_getstatic(FieldKind::Short)?,
            Bytecode::GETSTATIC_I => self.op_getstatic(FieldKind::Int)?,
            Bytecode::PUTSTATIC_A => self.op_putstatic(FieldKind::Reference)?,
            Bytecode::PUTSTATIC_B => self.op_putstatic(FieldKind::Byte)?,
            Bytecode::PUTSTATIC_S => self.op_putstatic(FieldKind::Short)?,
            Bytecode::PUTSTATIC_I => self.op_putstatic(FieldKind::Int)?,

            // Instance fields.
            Bytecode::GETFIELD_A => self.op_getfield(FieldKind::Reference, false, false)?,
            Bytecode::GETFIELD_B => self.op_getfield(FieldKind::Byte, false, false)?,
            Bytecode::GETFIELD_S => self.op_getfield(FieldKind::Short, false, false)?,
            Bytecode::GETFIELD_I => self.op_getfield(FieldKind::Int, false, false)?,
            Bytecode::GETFIELD_A_W => self.op_getfield(FieldKind::Reference, true, false)?,
            Bytecode::GETFIELD_B_W => self.op_getfield(FieldKind::Byte, true, false)?,
            Bytecode::GETFIELD_S_W => self.op_getfield(FieldKind::Short, true, false)?,
            Bytecode::GETFIELD_I_W => self.op_getfield(FieldKind::Int, true, false)?,
            Bytecode::GETFIELD_A_THIS => self.op_getfield(FieldKind::Reference, false, true)?,
            Bytecode::GETFIELD_B_THIS => self.op_getfield(FieldKind::Byte, false, true)?,
            Bytecode::GETFIELD_S_THIS => self.op_getfield(FieldKind::Short, false, true)?,
            Bytecode::GETFIELD_I_THIS => self.op_getfield(FieldKind::Int, false, true)?,
            Bytecode::PUTFIELD_A => self.op_putfield(FieldKind::Reference, false, false)?,
            Bytecode::PUTFIELD_B => self.op_putfield(FieldKind::Byte, false, false)?,
            Bytecode::PUTFIELD_S => self.op_putfield(FieldKind::Short, false, false)?,
            Bytecode::PUTFIELD_I => self.op_putfield(FieldKind::Int, false, false)?,
            Bytecode::PUTFIELD_A_W => self.op_putfield(FieldKind::Reference, true, false)?,
            Bytecode::PUTFIELD_B_W => self.op_putfield(FieldKind::Byte, true, false)?,
            Bytecode::PUTFIELD_S_W => self.op_putfield(FieldKind::Short, true, false)?,
            Bytecode::PUTFIELD_I_W => self.op_putfield(FieldKind::Int, true, false)?,
            Bytecode::PUTFIELD_A_THIS => self.op_putfield(FieldKind::Reference, false, true)?,
            Bytecode::PUTFIELD_B_THIS => self.op_putfield(FieldKind::Byte, false, true)?,
            Bytecode::PUTFIELD_S_THIS => self.op_putfield(FieldKind::Short, false, true)?,
            Bytecode::PUTFIELD_I_THIS => self.op_putfield(FieldKind::Int, false, true)?,

            // Objects.
            Bytecode::NEW => self.op_new()?,
            Bytecode::CHECKCAST => self.op_checkcast()?,
            Bytecode::INSTANCEOF => self.op_instanceof()?,
            Bytecode::ATHROW => {
                let exception = self.pop_ref()?;
                if exception.is_null() {
                    return Err(Thrown::Fault(Fault::NullPointer));
                }
                return Err(Thrown::Object(exception));
            }

            // Invocations and returns.
            Bytecode::INVOKEVIRTUAL => self.op_invokevirtual()?,
            Bytecode::INVOKESPECIAL => self.op_invokespecial()?,
            Bytecode::INVOKESTATIC => self.op_invokestatic()?,
            Bytecode::INVOKEINTERFACE => self.op_invokeinterface()?,
            Bytecode::RETURN => return Ok(self.op_return(ReturnKind::Void)?),
            Bytecode::SRETURN => return Ok(self.op_return(ReturnKind::Short)?),
            Bytecode::IRETURN => return Ok(self.op_return(ReturnKind::Int)?),
            Bytecode::ARETURN => return Ok(self.op_return(ReturnKind::Reference)?),

            Bytecode::IMPDEP1 | Bytecode::IMPDEP2 => return Err(Thrown::Fault(Fault::Security)),
        }

        Ok(ExecuteState::Proceed)
    }

    fn load_word_local(&mut self, local: u8) -> Result<(), Fault> {
        let value = self.read_local_word(local)?;
        self.push(value)
    }

    fn load_int_local(&mut self, local: u8) -> Result<(), Fault> {
        let value = self.read_local_int(local)?;
        self.push_int(value)
    }

    fn store_word_local(&mut self, local: u8) -> Result<(), Fault> {
        let value = self.pop()?;
        self.write_local_word(local, value)
    }

    fn store_int_local(&mut self, local: u8) -> Result<(), Fault> {
        let value = self.pop_int()?;
        self.write_local_int(local, value)
    }
}
