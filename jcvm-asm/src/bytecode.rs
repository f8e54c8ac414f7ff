//! The Java Card bytecode table.

macro_rules! bytecodes {
    ($($(#[$attr:meta])* $name:ident = $value:literal,)*) => {
        /// Instruction representation for the interpreter.
        ///
        /// One variant per opcode byte of the Java Card instruction set.
        /// Inline operands are not part of the representation; handlers
        /// consume them through [`crate::Pc`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum Bytecode {
            $($(#[$attr])* $name = $value,)*
        }

        impl Bytecode {
            /// Map an opcode byte to its instruction, if defined.
            pub const fn from_u8(byte: u8) -> Option<Self> {
                match byte {
                    $($value => Some(Self::$name),)*
                    _ => None,
                }
            }
        }
    };
}

bytecodes! {
    /// Do nothing.
    NOP = 0x00,
    /// Push the null reference.
    ACONST_NULL = 0x01,
    /// Push short constant -1.
    SCONST_M1 = 0x02,
    /// Push short constant 0.
    SCONST_0 = 0x03,
    /// Push short constant 1.
    SCONST_1 = 0x04,
    /// Push short constant 2.
    SCONST_2 = 0x05,
    /// Push short constant 3.
    SCONST_3 = 0x06,
    /// Push short constant 4.
    SCONST_4 = 0x07,
    /// Push short constant 5.
    SCONST_5 = 0x08,
    /// Push int constant -1.
    ICONST_M1 = 0x09,
    /// Push int constant 0.
    ICONST_0 = 0x0A,
    /// Push int constant 1.
    ICONST_1 = 0x0B,
    /// Push int constant 2.
    ICONST_2 = 0x0C,
    /// Push int constant 3.
    ICONST_3 = 0x0D,
    /// Push int constant 4.
    ICONST_4 = 0x0E,
    /// Push int constant 5.
    ICONST_5 = 0x0F,
    /// Push a sign-extended byte as a short.
    BSPUSH = 0x10,
    /// Push a short.
    SSPUSH = 0x11,
    /// Push a sign-extended byte as an int.
    BIPUSH = 0x12,
    /// Push a sign-extended short as an int.
    SIPUSH = 0x13,
    /// Push an int.
    IIPUSH = 0x14,
    /// Load a reference from a local variable.
    ALOAD = 0x15,
    /// Load a short from a local variable.
    SLOAD = 0x16,
    /// Load an int from a local variable pair.
    ILOAD = 0x17,
    /// Load a reference from local 0.
    ALOAD_0 = 0x18,
    /// Load a reference from local 1.
    ALOAD_1 = 0x19,
    /// Load a reference from local 2.
    ALOAD_2 = 0x1A,
    /// Load a reference from local 3.
    ALOAD_3 = 0x1B,
    /// Load a short from local 0.
    SLOAD_0 = 0x1C,
    /// Load a short from local 1.
    SLOAD_1 = 0x1D,
    /// Load a short from local 2.
    SLOAD_2 = 0x1E,
    /// Load a short from local 3.
    SLOAD_3 = 0x1F,
    /// Load an int from locals 0-1.
    ILOAD_0 = 0x20,
    /// Load an int from locals 1-2.
    ILOAD_1 = 0x21,
    /// Load an int from locals 2-3.
    ILOAD_2 = 0x22,
    /// Load an int from locals 3-4.
    ILOAD_3 = 0x23,
    /// Load a reference from an array.
    AALOAD = 0x24,
    /// Load a byte or boolean from an array.
    BALOAD = 0x25,
    /// Load a short from an array.
    SALOAD = 0x26,
    /// Load an int from an array.
    IALOAD = 0x27,
    /// Store a reference into a local variable.
    ASTORE = 0x28,
    /// Store a short into a local variable.
    SSTORE = 0x29,
    /// Store an int into a local variable pair.
    ISTORE = 0x2A,
    /// Store a reference into local 0.
    ASTORE_0 = 0x2B,
    /// Store a reference into local 1.
    ASTORE_1 = 0x2C,
    /// Store a reference into local 2.
    ASTORE_2 = 0x2D,
    /// Store a reference into local 3.
    ASTORE_3 = 0x2E,
    /// Store a short into local 0.
    SSTORE_0 = 0x2F,
    /// Store a short into local 1.
    SSTORE_1 = 0x30,
    /// Store a short into local 2.
    SSTORE_2 = 0x31,
    /// Store a short into local 3.
    SSTORE_3 = 0x32,
    /// Store an int into locals 0-1.
    ISTORE_0 = 0x33,
    /// Store an int into locals 1-2.
    ISTORE_1 = 0x34,
    /// Store an int into locals 2-3.
    ISTORE_2 = 0x35,
    /// Store an int into locals 3-4.
    ISTORE_3 = 0x36,
    /// Store a reference into an array.
    AASTORE = 0x37,
    /// Store a byte or boolean into an array.
    BASTORE = 0x38,
    /// Store a short into an array.
    SASTORE = 0x39,
    /// Store an int into an array.
    IASTORE = 0x3A,
    /// Pop the top word.
    POP = 0x3B,
    /// Pop the top two words.
    POP2 = 0x3C,
    /// Duplicate the top word.
    DUP = 0x3D,
    /// Duplicate the top two words.
    DUP2 = 0x3E,
    /// Duplicate the top m words and insert them n words down.
    DUP_X = 0x3F,
    /// Swap the top m words with the n words beneath.
    SWAP_X = 0x40,
    /// Add two shorts.
    SADD = 0x41,
    /// Add two ints.
    IADD = 0x42,
    /// Subtract two shorts.
    SSUB = 0x43,
    /// Subtract two ints.
    ISUB = 0x44,
    /// Multiply two shorts.
    SMUL = 0x45,
    /// Multiply two ints.
    IMUL = 0x46,
    /// Divide two shorts.
    SDIV = 0x47,
    /// Divide two ints.
    IDIV = 0x48,
    /// Remainder of two shorts.
    SREM = 0x49,
    /// Remainder of two ints.
    IREM = 0x4A,
    /// Negate a short.
    SNEG = 0x4B,
    /// Negate an int.
    INEG = 0x4C,
    /// Shift a short left.
    SSHL = 0x4D,
    /// Shift an int left.
    ISHL = 0x4E,
    /// Arithmetic shift a short right.
    SSHR = 0x4F,
    /// Arithmetic shift an int right.
    ISHR = 0x50,
    /// Logical shift a short right.
    SUSHR = 0x51,
    /// Logical shift an int right.
    IUSHR = 0x52,
    /// Bitwise AND of two shorts.
    SAND = 0x53,
    /// Bitwise AND of two ints.
    IAND = 0x54,
    /// Bitwise OR of two shorts.
    SOR = 0x55,
    /// Bitwise OR of two ints.
    IOR = 0x56,
    /// Bitwise XOR of two shorts.
    SXOR = 0x57,
    /// Bitwise XOR of two ints.
    IXOR = 0x58,
    /// Increment a local short by a constant.
    SINC = 0x59,
    /// Increment a local int by a constant.
    IINC = 0x5A,
    /// Truncate a short to a byte.
    S2B = 0x5B,
    /// Widen a short to an int.
    S2I = 0x5C,
    /// Truncate an int to a byte.
    I2B = 0x5D,
    /// Truncate an int to a short.
    I2S = 0x5E,
    /// Compare two ints, pushing -1, 0 or 1.
    ICMP = 0x5F,
    /// Branch if the short equals zero.
    IFEQ = 0x60,
    /// Branch if the short differs from zero.
    IFNE = 0x61,
    /// Branch if the short is below zero.
    IFLT = 0x62,
    /// Branch if the short is zero or above.
    IFGE = 0x63,
    /// Branch if the short is above zero.
    IFGT = 0x64,
    /// Branch if the short is zero or below.
    IFLE = 0x65,
    /// Branch if the reference is null.
    IFNULL = 0x66,
    /// Branch if the reference is non-null.
    IFNONNULL = 0x67,
    /// Branch if two references are equal.
    IF_ACMPEQ = 0x68,
    /// Branch if two references differ.
    IF_ACMPNE = 0x69,
    /// Branch if two shorts are equal.
    IF_SCMPEQ = 0x6A,
    /// Branch if two shorts differ.
    IF_SCMPNE = 0x6B,
    /// Branch if the first short is below the second.
    IF_SCMPLT = 0x6C,
    /// Branch if the first short is not below the second.
    IF_SCMPGE = 0x6D,
    /// Branch if the first short is above the second.
    IF_SCMPGT = 0x6E,
    /// Branch if the first short is not above the second.
    IF_SCMPLE = 0x6F,
    /// Branch unconditionally.
    GOTO = 0x70,
    /// Jump to a subroutine, leaving a returnAddress word.
    JSR = 0x71,
    /// Return from a subroutine through a saved PC slot.
    RET = 0x72,
    /// Table switch on a short.
    STABLESWITCH = 0x73,
    /// Lookup switch on a short.
    SLOOKUPSWITCH = 0x74,
    /// Table switch on an int.
    ITABLESWITCH = 0x75,
    /// Lookup switch on an int.
    ILOOKUPSWITCH = 0x76,
    /// Return a reference from the method.
    ARETURN = 0x77,
    /// Return a short from the method.
    SRETURN = 0x78,
    /// Return an int from the method.
    IRETURN = 0x79,
    /// Return void from the method.
    RETURN = 0x7A,
    /// Read a static reference field.
    GETSTATIC_A = 0x7B,
    /// Read a static byte or boolean field.
    GETSTATIC_B = 0x7C,
    /// Read a static short field.
    GETSTATIC_S = 0x7D,
    /// Read a static int field.
    GETSTATIC_I = 0x7E,
    /// Write a static reference field.
    PUTSTATIC_A = 0x7F,
    /// Write a static byte or boolean field.
    PUTSTATIC_B = 0x80,
    /// Write a static short field.
    PUTSTATIC_S = 0x81,
    /// Write a static int field.
    PUTSTATIC_I = 0x82,
    /// Read an instance reference field.
    GETFIELD_A = 0x83,
    /// Read an instance byte or boolean field.
    GETFIELD_B = 0x84,
    /// Read an instance short field.
    GETFIELD_S = 0x85,
    /// Read an instance int field.
    GETFIELD_I = 0x86,
    /// Write an instance reference field.
    PUTFIELD_A = 0x87,
    /// Write an instance byte or boolean field.
    PUTFIELD_B = 0x88,
    /// Write an instance short field.
    PUTFIELD_S = 0x89,
    /// Write an instance int field.
    PUTFIELD_I = 0x8A,
    /// Invoke an instance method with virtual dispatch.
    INVOKEVIRTUAL = 0x8B,
    /// Invoke a private, constructor or superclass instance method.
    INVOKESPECIAL = 0x8C,
    /// Invoke a static method.
    INVOKESTATIC = 0x8D,
    /// Invoke an interface method.
    INVOKEINTERFACE = 0x8E,
    /// Allocate a class instance.
    NEW = 0x8F,
    /// Allocate an array of primitives.
    NEWARRAY = 0x90,
    /// Allocate an array of references.
    ANEWARRAY = 0x91,
    /// Push the length of an array.
    ARRAYLENGTH = 0x92,
    /// Throw an exception object.
    ATHROW = 0x93,
    /// Check that an object is of a given type.
    CHECKCAST = 0x94,
    /// Test whether an object is of a given type.
    INSTANCEOF = 0x95,
    /// Increment a wide-indexed local short by a constant.
    SINC_W = 0x96,
    /// Increment a wide-indexed local int by a constant.
    IINC_W = 0x97,
    /// Wide branch if the short equals zero.
    IFEQ_W = 0x98,
    /// Wide branch if the short differs from zero.
    IFNE_W = 0x99,
    /// Wide branch if the short is below zero.
    IFLT_W = 0x9A,
    /// Wide branch if the short is zero or above.
    IFGE_W = 0x9B,
    /// Wide branch if the short is above zero.
    IFGT_W = 0x9C,
    /// Wide branch if the short is zero or below.
    IFLE_W = 0x9D,
    /// Wide branch if the reference is null.
    IFNULL_W = 0x9E,
    /// Wide branch if the reference is non-null.
    IFNONNULL_W = 0x9F,
    /// Wide branch if two references are equal.
    IF_ACMPEQ_W = 0xA0,
    /// Wide branch if two references differ.
    IF_ACMPNE_W = 0xA1,
    /// Wide branch if two shorts are equal.
    IF_SCMPEQ_W = 0xA2,
    /// Wide branch if two shorts differ.
    IF_SCMPNE_W = 0xA3,
    /// Wide branch if the first short is below the second.
    IF_SCMPLT_W = 0xA4,
    /// Wide branch if the first short is not below the second.
    IF_SCMPGE_W = 0xA5,
    /// Wide branch if the first short is above the second.
    IF_SCMPGT_W = 0xA6,
    /// Wide branch if the first short is not above the second.
    IF_SCMPLE_W = 0xA7,
    /// Wide unconditional branch.
    GOTO_W = 0xA8,
    /// Read an instance reference field through a wide index.
    GETFIELD_A_W = 0xA9,
    /// Read an instance byte field through a wide index.
    GETFIELD_B_W = 0xAA,
    /// Read an instance short field through a wide index.
    GETFIELD_S_W = 0xAB,
    /// Read an instance int field through a wide index.
    GETFIELD_I_W = 0xAC,
    /// Read an instance reference field of `this`.
    GETFIELD_A_THIS = 0xAD,
    /// Read an instance byte field of `this`.
    GETFIELD_B_THIS = 0xAE,
    /// Read an instance short field of `this`.
    GETFIELD_S_THIS = 0xAF,
    /// Read an instance int field of `this`.
    GETFIELD_I_THIS = 0xB0,
    /// Write an instance reference field through a wide index.
    PUTFIELD_A_W = 0xB1,
    /// Write an instance byte field through a wide index.
    PUTFIELD_B_W = 0xB2,
    /// Write an instance short field through a wide index.
    PUTFIELD_S_W = 0xB3,
    /// Write an instance int field through a wide index.
    PUTFIELD_I_W = 0xB4,
    /// Write an instance reference field of `this`.
    PUTFIELD_A_THIS = 0xB5,
    /// Write an instance byte field of `this`.
    PUTFIELD_B_THIS = 0xB6,
    /// Write an instance short field of `this`.
    PUTFIELD_S_THIS = 0xB7,
    /// Write an instance int field of `this`.
    PUTFIELD_I_THIS = 0xB8,
    /// Reserved for implementation-dependent use.
    IMPDEP1 = 0xFE,
    /// Reserved for implementation-dependent use.
    IMPDEP2 = 0xFF,
}

impl Bytecode {
    /// The opcode byte.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}
