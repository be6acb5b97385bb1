//! Value homes: where a marshalled value currently lives.
//!
//! A [`Home`] names the storage location holding one side of a conversion - an
//! argument slot or a local slot, held directly or through a by-reference
//! pointer - and knows how to emit the loads and stores against it. Emission
//! code works against homes so it never has to care whether reading a value
//! first requires dereferencing a pointer.
//!
//! By-reference homes are never the direct target of a store: stores go through
//! a direct local and are propagated explicitly by the marshaller templates
//! (the indirect store needs its target address below the value on the
//! evaluation stack, so the propagation site controls the ordering). This is a
//! precondition, enforced with a debug assertion.

use crate::{
    assembly::{InstructionStream, LocalId, Opcode, StubAssembler},
    metadata::TypeSignature,
};

/// A storage location for one value of a marshalling stub.
///
/// The carried [`TypeSignature`] is the type of the *value*, not of the slot:
/// for the by-reference variants the slot holds a pointer to a value of that
/// type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Home {
    /// Value lives in an argument slot
    Arg {
        /// Argument slot index
        index: u16,
        /// Type of the value
        signature: TypeSignature,
    },
    /// Argument slot holds a pointer to the value
    ByRefArg {
        /// Argument slot index
        index: u16,
        /// Type of the referenced value
        signature: TypeSignature,
    },
    /// Value lives in a local slot
    Local {
        /// Local slot
        id: LocalId,
        /// Type of the value
        signature: TypeSignature,
    },
    /// Local slot holds a pointer to the value
    ByRefLocal {
        /// Local slot
        id: LocalId,
        /// Type of the referenced value
        signature: TypeSignature,
    },
}

impl Home {
    /// The type of the value this home refers to.
    #[must_use]
    pub fn signature(&self) -> &TypeSignature {
        match self {
            Home::Arg { signature, .. }
            | Home::ByRefArg { signature, .. }
            | Home::Local { signature, .. }
            | Home::ByRefLocal { signature, .. } => signature,
        }
    }

    /// True when reaching the value requires a dereference.
    #[must_use]
    pub fn is_by_ref(&self) -> bool {
        matches!(self, Home::ByRefArg { .. } | Home::ByRefLocal { .. })
    }

    /// Emits a load of the value onto the evaluation stack.
    pub fn emit_load_value(&self, stream: &mut InstructionStream, asm: &mut StubAssembler) {
        match self {
            Home::Arg { index, .. } => {
                stream.ldarg(*index);
            }
            Home::Local { id, .. } => {
                stream.ldloc(*id);
            }
            Home::ByRefArg { index, signature } => {
                stream.ldarg(*index);
                emit_load_indirect(stream, asm, signature);
            }
            Home::ByRefLocal { id, signature } => {
                stream.ldloc(*id);
                emit_load_indirect(stream, asm, signature);
            }
        }
    }

    /// Emits a load of the value's address onto the evaluation stack.
    ///
    /// For the by-reference variants the slot already holds the address.
    pub fn emit_load_address(&self, stream: &mut InstructionStream) {
        match self {
            Home::Arg { index, .. } => {
                stream.ldarga(*index);
            }
            Home::Local { id, .. } => {
                stream.ldloca(*id);
            }
            Home::ByRefArg { index, .. } => {
                stream.ldarg(*index);
            }
            Home::ByRefLocal { id, .. } => {
                stream.ldloc(*id);
            }
        }
    }

    /// Emits a store of the value on top of the evaluation stack.
    ///
    /// Precondition: the home is direct. By-reference homes cannot be stored
    /// through here; the value has to be parked in a direct local and
    /// propagated with an address-first indirect store.
    pub fn emit_store_value(&self, stream: &mut InstructionStream) {
        match self {
            Home::Arg { index, .. } => {
                stream.starg(*index);
            }
            Home::Local { id, .. } => {
                stream.stloc(*id);
            }
            Home::ByRefArg { .. } | Home::ByRefLocal { .. } => {
                debug_assert!(false, "store into a by-reference home");
            }
        }
    }
}

/// Emits a typed indirect load for `signature` (address on the stack).
pub(crate) fn emit_load_indirect(
    stream: &mut InstructionStream,
    asm: &mut StubAssembler,
    signature: &TypeSignature,
) {
    match Opcode::ldind_for(signature) {
        Some(opcode) => {
            stream.emit(opcode);
        }
        None => {
            let token = asm.type_token(signature);
            stream.ldobj(token);
        }
    }
}

/// Emits a typed indirect store for `signature` (address below value).
pub(crate) fn emit_store_indirect(
    stream: &mut InstructionStream,
    asm: &mut StubAssembler,
    signature: &TypeSignature,
) {
    match Opcode::stind_for(signature) {
        Some(opcode) => {
            stream.emit(opcode);
        }
        None => {
            let token = asm.type_token(signature);
            stream.stobj(token);
        }
    }
}
