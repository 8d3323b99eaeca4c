//! The subset of JVM opcodes the generator produces.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// JVM instruction opcodes.
///
/// Variants carry their encoded byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// Do nothing.
    Nop = 0,
    /// Push `null`.
    AconstNull = 1,
    /// Push int -1.
    IconstM1 = 2,
    /// Push int 0.
    Iconst0 = 3,
    /// Push int 1.
    Iconst1 = 4,
    /// Push int 2.
    Iconst2 = 5,
    /// Push int 3.
    Iconst3 = 6,
    /// Push int 4.
    Iconst4 = 7,
    /// Push int 5.
    Iconst5 = 8,
    /// Push a sign-extended byte. Operand: i8.
    Bipush = 16,
    /// Push a sign-extended short. Operand: i16.
    Sipush = 17,
    /// Push a constant. Operand: u8 pool index.
    Ldc = 18,
    /// Push a constant. Operand: u16 pool index.
    LdcW = 19,
    /// Load reference from local. Operand: u8 index.
    Aload = 25,
    Aload0 = 42,
    Aload1 = 43,
    Aload2 = 44,
    Aload3 = 45,
    /// Store reference into local. Operand: u8 index.
    Astore = 58,
    Astore0 = 75,
    Astore1 = 76,
    Astore2 = 77,
    Astore3 = 78,
    /// Discard one slot.
    Pop = 87,
    /// Discard two slots.
    Pop2 = 88,
    /// Duplicate the top value.
    Dup = 89,
    /// Duplicate the top value beneath the second.
    DupX1 = 90,
    /// Swap the top two values.
    Swap = 95,
    /// Branch. Operand: i16 offset.
    Goto = 167,
    /// Return a reference.
    Areturn = 176,
    /// Return void.
    Return = 177,
    /// Read a static field. Operand: u16 field ref.
    Getstatic = 178,
    /// Operand: u16 method ref.
    Invokevirtual = 182,
    /// Operand: u16 method ref.
    Invokespecial = 183,
    /// Operand: u16 method ref.
    Invokestatic = 184,
    /// Operands: u16 interface method ref, u8 count, u8 zero.
    Invokeinterface = 185,
    /// Operands: u16 call site, two zero bytes.
    Invokedynamic = 186,
    /// Allocate. Operand: u16 class.
    New = 187,
    /// Throw the top value.
    Athrow = 191,
    /// Operand: u16 class.
    Checkcast = 192,
    /// Widen the next local-variable instruction.
    Wide = 196,
    /// Branch. Operand: i32 offset.
    GotoW = 200,
}

impl Opcode {
    /// Whether control never continues to the next instruction.
    pub fn ends_flow(self) -> bool {
        matches!(
            self,
            Opcode::Goto | Opcode::GotoW | Opcode::Areturn | Opcode::Return | Opcode::Athrow
        )
    }

    /// Number of operand bytes following the opcode (ignoring `wide`).
    pub fn operand_len(self) -> usize {
        match self {
            Opcode::Bipush | Opcode::Ldc | Opcode::Aload | Opcode::Astore => 1,
            Opcode::Sipush
            | Opcode::LdcW
            | Opcode::Goto
            | Opcode::Getstatic
            | Opcode::Invokevirtual
            | Opcode::Invokespecial
            | Opcode::Invokestatic
            | Opcode::New
            | Opcode::Checkcast => 2,
            Opcode::Invokeinterface | Opcode::Invokedynamic | Opcode::GotoW => 4,
            _ => 0,
        }
    }

    /// The lower-case mnemonic, as in `javap` output.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::AconstNull => "aconst_null",
            Opcode::IconstM1 => "iconst_m1",
            Opcode::Iconst0 => "iconst_0",
            Opcode::Iconst1 => "iconst_1",
            Opcode::Iconst2 => "iconst_2",
            Opcode::Iconst3 => "iconst_3",
            Opcode::Iconst4 => "iconst_4",
            Opcode::Iconst5 => "iconst_5",
            Opcode::Bipush => "bipush",
            Opcode::Sipush => "sipush",
            Opcode::Ldc => "ldc",
            Opcode::LdcW => "ldc_w",
            Opcode::Aload => "aload",
            Opcode::Aload0 => "aload_0",
            Opcode::Aload1 => "aload_1",
            Opcode::Aload2 => "aload_2",
            Opcode::Aload3 => "aload_3",
            Opcode::Astore => "astore",
            Opcode::Astore0 => "astore_0",
            Opcode::Astore1 => "astore_1",
            Opcode::Astore2 => "astore_2",
            Opcode::Astore3 => "astore_3",
            Opcode::Pop => "pop",
            Opcode::Pop2 => "pop2",
            Opcode::Dup => "dup",
            Opcode::DupX1 => "dup_x1",
            Opcode::Swap => "swap",
            Opcode::Goto => "goto",
            Opcode::Areturn => "areturn",
            Opcode::Return => "return",
            Opcode::Getstatic => "getstatic",
            Opcode::Invokevirtual => "invokevirtual",
            Opcode::Invokespecial => "invokespecial",
            Opcode::Invokestatic => "invokestatic",
            Opcode::Invokeinterface => "invokeinterface",
            Opcode::Invokedynamic => "invokedynamic",
            Opcode::New => "new",
            Opcode::Athrow => "athrow",
            Opcode::Checkcast => "checkcast",
            Opcode::Wide => "wide",
            Opcode::GotoW => "goto_w",
        }
    }

    /// `iconst_<n>` for -1..=5.
    pub fn iconst(value: i32) -> Option<Opcode> {
        match value {
            -1 => Some(Opcode::IconstM1),
            0 => Some(Opcode::Iconst0),
            1 => Some(Opcode::Iconst1),
            2 => Some(Opcode::Iconst2),
            3 => Some(Opcode::Iconst3),
            4 => Some(Opcode::Iconst4),
            5 => Some(Opcode::Iconst5),
            _ => None,
        }
    }
}
