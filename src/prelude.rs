//! # dotstub Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the dotstub library. Import this module to get quick access to the
//! essential types for marshalling stub generation.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotstub operations
pub use crate::Error;

/// The result type used throughout dotstub
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Stub generation entry point
pub use crate::interop::{MarshallingStub, StubGenerator};

// ================================================================================================
// Metadata Surface
// ================================================================================================

/// Metadata token type for referencing table entries
pub use crate::metadata::Token;

/// Marshalling descriptor surface
pub use crate::metadata::{parse_marshalling_descriptor, MarshallingInfo, NativeType, NATIVE_TYPE};

/// Managed signature model
pub use crate::metadata::{SignatureMethod, SignatureParameter, TypeSignature};

/// Method-level marshalling policy
pub use crate::metadata::{CharSet, MarshalPolicy, PARAM_ATTRIBUTES, PINVOKE_ATTRIBUTES};

// ================================================================================================
// Interop Core
// ================================================================================================

/// Strategy classification
pub use crate::interop::{classify, MarshalDirection, MarshallerKind, MarshallerRole};

/// Native representation mapping
pub use crate::interop::{native_param_type, native_type_of};

/// Emission building blocks
pub use crate::interop::{CodeStreams, Home, Marshaller, Stream};

// ================================================================================================
// Assembly Layer
// ================================================================================================

/// Abstract instruction model
pub use crate::assembly::{Instruction, Label, LocalId, Opcode, Operand};

/// Stream building and resource vending
pub use crate::assembly::{HelperId, InstructionStream, LocalSlot, StubAssembler, TokenTables};
