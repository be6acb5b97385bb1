//! Abstract CIL instruction representation for stub emission.
//!
//! The stub generator emits *structured* instructions, not bytecode: each
//! [`Instruction`] pairs an [`Opcode`] with a typed [`Operand`] (argument slot,
//! local slot, label, immediate, or metadata token). A back-end lowers the
//! finished streams to the encoded form, resolving labels to offsets and
//! synthetic tokens to real metadata rows.
//!
//! Label binding is part of the stream itself: the pseudo-opcode
//! [`Opcode::Mark`] carries the label bound at its position and lowers to no
//! bytes. Keeping the binding in-stream means label positions survive the
//! stream concatenation the stub orchestrator performs.

use std::fmt;

use crate::metadata::{Token, TypeSignature};

/// A branch target allocated by the stub assembler.
///
/// Labels are bound to a stream position by an [`Opcode::Mark`] entry and
/// referenced by branch operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L_{:04}", self.0)
    }
}

/// A local variable slot allocated by the stub assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u16);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V_{}", self.0)
    }
}

/// Operand of an abstract CIL instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// Argument slot index
    Arg(u16),
    /// Local variable slot
    Local(LocalId),
    /// 32-bit integer immediate
    Immediate(i32),
    /// 64-bit integer immediate
    ImmediateI8(i64),
    /// Type token (`sizeof`, `ldobj`, `newarr`, ...)
    Type(Token),
    /// Method token (`call`, `newobj`)
    Method(Token),
    /// Branch target or label binding
    Target(Label),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Arg(index) => write!(f, "{index}"),
            Operand::Local(local) => write!(f, "{local}"),
            Operand::Immediate(value) => write!(f, "{value}"),
            Operand::ImmediateI8(value) => write!(f, "{value}"),
            Operand::Type(token) | Operand::Method(token) => write!(f, "{token}"),
            Operand::Target(label) => write!(f, "{label}"),
        }
    }
}

/// CIL opcodes the marshalling streams are built from.
///
/// The set covers exactly what stub emission needs; it is not the complete
/// ECMA-335 instruction set. [`Opcode::Mark`] is a pseudo-opcode binding a
/// label at its stream position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Opcode {
    Nop,
    Dup,
    Pop,
    Ret,
    Ldarg,
    Ldarga,
    Starg,
    Ldloc,
    Ldloca,
    Stloc,
    LdcI4,
    LdcI8,
    Ldnull,
    LdindI1,
    LdindU1,
    LdindI2,
    LdindU2,
    LdindI4,
    LdindU4,
    LdindI8,
    LdindI,
    LdindR4,
    LdindR8,
    LdindRef,
    StindI1,
    StindI2,
    StindI4,
    StindI8,
    StindI,
    StindR4,
    StindR8,
    StindRef,
    Ldobj,
    Stobj,
    Ldlen,
    Ldelem,
    Ldelema,
    Stelem,
    ConvI,
    ConvU,
    ConvI1,
    ConvU1,
    ConvI2,
    ConvU2,
    ConvI4,
    ConvU4,
    ConvI8,
    ConvU8,
    Add,
    Sub,
    Mul,
    Ceq,
    Cgt,
    Clt,
    Br,
    Brtrue,
    Brfalse,
    Blt,
    Bge,
    Call,
    Calli,
    Newobj,
    Newarr,
    Initobj,
    Sizeof,
    Mark,
}

impl Opcode {
    /// The CIL mnemonic for this opcode (`Mark` renders as a label definition).
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Dup => "dup",
            Opcode::Pop => "pop",
            Opcode::Ret => "ret",
            Opcode::Ldarg => "ldarg",
            Opcode::Ldarga => "ldarga",
            Opcode::Starg => "starg",
            Opcode::Ldloc => "ldloc",
            Opcode::Ldloca => "ldloca",
            Opcode::Stloc => "stloc",
            Opcode::LdcI4 => "ldc.i4",
            Opcode::LdcI8 => "ldc.i8",
            Opcode::Ldnull => "ldnull",
            Opcode::LdindI1 => "ldind.i1",
            Opcode::LdindU1 => "ldind.u1",
            Opcode::LdindI2 => "ldind.i2",
            Opcode::LdindU2 => "ldind.u2",
            Opcode::LdindI4 => "ldind.i4",
            Opcode::LdindU4 => "ldind.u4",
            Opcode::LdindI8 => "ldind.i8",
            Opcode::LdindI => "ldind.i",
            Opcode::LdindR4 => "ldind.r4",
            Opcode::LdindR8 => "ldind.r8",
            Opcode::LdindRef => "ldind.ref",
            Opcode::StindI1 => "stind.i1",
            Opcode::StindI2 => "stind.i2",
            Opcode::StindI4 => "stind.i4",
            Opcode::StindI8 => "stind.i8",
            Opcode::StindI => "stind.i",
            Opcode::StindR4 => "stind.r4",
            Opcode::StindR8 => "stind.r8",
            Opcode::StindRef => "stind.ref",
            Opcode::Ldobj => "ldobj",
            Opcode::Stobj => "stobj",
            Opcode::Ldlen => "ldlen",
            Opcode::Ldelem => "ldelem",
            Opcode::Ldelema => "ldelema",
            Opcode::Stelem => "stelem",
            Opcode::ConvI => "conv.i",
            Opcode::ConvU => "conv.u",
            Opcode::ConvI1 => "conv.i1",
            Opcode::ConvU1 => "conv.u1",
            Opcode::ConvI2 => "conv.i2",
            Opcode::ConvU2 => "conv.u2",
            Opcode::ConvI4 => "conv.i4",
            Opcode::ConvU4 => "conv.u4",
            Opcode::ConvI8 => "conv.i8",
            Opcode::ConvU8 => "conv.u8",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Ceq => "ceq",
            Opcode::Cgt => "cgt",
            Opcode::Clt => "clt",
            Opcode::Br => "br",
            Opcode::Brtrue => "brtrue",
            Opcode::Brfalse => "brfalse",
            Opcode::Blt => "blt",
            Opcode::Bge => "bge",
            Opcode::Call => "call",
            Opcode::Calli => "calli",
            Opcode::Newobj => "newobj",
            Opcode::Newarr => "newarr",
            Opcode::Initobj => "initobj",
            Opcode::Sizeof => "sizeof",
            Opcode::Mark => "label",
        }
    }

    /// Selects the typed `ldind` variant for a managed type.
    ///
    /// Returns `None` for value types that need `ldobj` with a type token.
    #[must_use]
    pub fn ldind_for(signature: &TypeSignature) -> Option<Opcode> {
        match signature {
            TypeSignature::Boolean | TypeSignature::U1 => Some(Opcode::LdindU1),
            TypeSignature::I1 => Some(Opcode::LdindI1),
            TypeSignature::I2 => Some(Opcode::LdindI2),
            TypeSignature::Char | TypeSignature::U2 => Some(Opcode::LdindU2),
            TypeSignature::I4 => Some(Opcode::LdindI4),
            TypeSignature::U4 => Some(Opcode::LdindU4),
            TypeSignature::I8 | TypeSignature::U8 => Some(Opcode::LdindI8),
            TypeSignature::R4 => Some(Opcode::LdindR4),
            TypeSignature::R8 => Some(Opcode::LdindR8),
            TypeSignature::I
            | TypeSignature::U
            | TypeSignature::Ptr(_)
            | TypeSignature::FnPtr => Some(Opcode::LdindI),
            TypeSignature::String
            | TypeSignature::Object
            | TypeSignature::SzArray(_)
            | TypeSignature::Class(_)
            | TypeSignature::Delegate(_)
            | TypeSignature::StringBuilder
            | TypeSignature::SafeHandle(_)
            | TypeSignature::CriticalHandle(_) => Some(Opcode::LdindRef),
            TypeSignature::Enum { underlying, .. } => Opcode::ldind_for(underlying),
            _ => None,
        }
    }

    /// Selects the typed `stind` variant for a managed type.
    ///
    /// Returns `None` for value types that need `stobj` with a type token.
    #[must_use]
    pub fn stind_for(signature: &TypeSignature) -> Option<Opcode> {
        match signature {
            TypeSignature::Boolean | TypeSignature::I1 | TypeSignature::U1 => {
                Some(Opcode::StindI1)
            }
            TypeSignature::Char | TypeSignature::I2 | TypeSignature::U2 => Some(Opcode::StindI2),
            TypeSignature::I4 | TypeSignature::U4 => Some(Opcode::StindI4),
            TypeSignature::I8 | TypeSignature::U8 => Some(Opcode::StindI8),
            TypeSignature::R4 => Some(Opcode::StindR4),
            TypeSignature::R8 => Some(Opcode::StindR8),
            TypeSignature::I
            | TypeSignature::U
            | TypeSignature::Ptr(_)
            | TypeSignature::FnPtr => Some(Opcode::StindI),
            TypeSignature::String
            | TypeSignature::Object
            | TypeSignature::SzArray(_)
            | TypeSignature::Class(_)
            | TypeSignature::Delegate(_)
            | TypeSignature::StringBuilder
            | TypeSignature::SafeHandle(_)
            | TypeSignature::CriticalHandle(_) => Some(Opcode::StindRef),
            TypeSignature::Enum { underlying, .. } => Opcode::stind_for(underlying),
            _ => None,
        }
    }
}

/// One abstract CIL instruction: an opcode and its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The operation
    pub opcode: Opcode,
    /// The operand, [`Operand::None`] when the opcode takes none
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction without an operand.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// Creates an instruction with an operand.
    #[must_use]
    pub fn with_operand(opcode: Opcode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode == Opcode::Mark {
            return write!(f, "{}:", self.operand);
        }

        match self.operand {
            Operand::None => write!(f, "{}", self.opcode.mnemonic()),
            operand => write!(f, "{} {}", self.opcode.mnemonic(), operand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let test_cases = vec![
            (Instruction::new(Opcode::Ret), "ret"),
            (
                Instruction::with_operand(Opcode::Ldarg, Operand::Arg(0)),
                "ldarg 0",
            ),
            (
                Instruction::with_operand(Opcode::Ldloc, Operand::Local(LocalId(2))),
                "ldloc V_2",
            ),
            (
                Instruction::with_operand(Opcode::LdcI4, Operand::Immediate(-1)),
                "ldc.i4 -1",
            ),
            (
                Instruction::with_operand(Opcode::Brfalse, Operand::Target(Label(3))),
                "brfalse L_0003",
            ),
            (
                Instruction::with_operand(Opcode::Mark, Operand::Target(Label(3))),
                "L_0003:",
            ),
            (
                Instruction::with_operand(Opcode::Call, Operand::Method(Token::member_ref(1))),
                "call 0x0a000001",
            ),
        ];

        for (instruction, expected) in test_cases {
            assert_eq!(format!("{instruction}"), expected);
        }
    }

    #[test]
    fn test_indirect_opcode_selection() {
        assert_eq!(
            Opcode::ldind_for(&TypeSignature::I4),
            Some(Opcode::LdindI4)
        );
        assert_eq!(
            Opcode::ldind_for(&TypeSignature::Char),
            Some(Opcode::LdindU2)
        );
        assert_eq!(
            Opcode::ldind_for(&TypeSignature::String),
            Some(Opcode::LdindRef)
        );
        assert_eq!(
            Opcode::ldind_for(&TypeSignature::I4.pointer_to()),
            Some(Opcode::LdindI)
        );
        assert_eq!(Opcode::ldind_for(&TypeSignature::Guid), None);

        assert_eq!(
            Opcode::stind_for(&TypeSignature::Boolean),
            Some(Opcode::StindI1)
        );
        assert_eq!(stind_enum(), Some(Opcode::StindI4));
        assert_eq!(Opcode::stind_for(&TypeSignature::Decimal), None);
    }

    fn stind_enum() -> Option<Opcode> {
        Opcode::stind_for(&TypeSignature::Enum {
            token: Token::new(0x02000001),
            underlying: Box::new(TypeSignature::I4),
        })
    }
}
