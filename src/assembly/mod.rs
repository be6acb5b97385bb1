//! Abstract CIL instruction emission for marshalling stubs.
//!
//! This module is the instruction-stream side of stub generation: a structured
//! instruction model ([`Instruction`], [`Opcode`], [`Operand`]), the append-only
//! [`InstructionStream`] buffer with its fluent emission API, and the
//! [`StubAssembler`] that vends the resources all streams of one stub share -
//! local slots, labels, and synthetic type/helper tokens.
//!
//! The streams stay abstract: labels are in-stream markers and tokens are
//! synthetic until an external back-end lowers the finished stub to encoded
//! bytecode against real metadata.
//!
//! # Key Components
//!
//! - [`Instruction`] / [`Opcode`] / [`Operand`] - Structured instruction model
//! - [`InstructionStream`] - Append-only emission buffer
//! - [`StubAssembler`] - Locals, labels, and token vending
//! - [`HelperId`] - Well-known interop helper entry points

mod assembler;
mod instruction;

pub use assembler::{HelperId, InstructionStream, LocalSlot, StubAssembler, TokenTables};
pub use instruction::{Instruction, Label, LocalId, Opcode, Operand};
