//! Stub orchestration.
//!
//! [`StubGenerator`] drives one stub end to end: it builds a [`Marshaller`] per
//! parameter plus one for the return slot, runs each through its emission
//! entry point against a shared assembler and stream bundle, and concatenates
//! the streams into the final [`MarshallingStub`].
//!
//! The generator owns all of its state; generating a stub takes no locks and
//! shares nothing, so callers may generate any number of stubs in parallel,
//! each with its own generator.
//!
//! # Examples
//!
//! ```rust
//! use dotstub::{MarshalPolicy, StubGenerator};
//! use dotstub::metadata::{SignatureMethod, SignatureParameter, TypeSignature};
//!
//! // int NativeCall(int value)
//! let signature = SignatureMethod::pinvoke(
//!     SignatureParameter::returning(TypeSignature::I4),
//!     vec![SignatureParameter::new(TypeSignature::I4)],
//! );
//!
//! let stub = StubGenerator::forward(&signature, MarshalPolicy::auto()).generate()?;
//! assert_eq!(stub.callsite_pushes, 1);
//! # Ok::<(), dotstub::Error>(())
//! ```

use crate::{
    assembly::{Instruction, LocalSlot, StubAssembler, TokenTables},
    interop::{
        kind::MarshalDirection,
        marshaller::{EmitContext, Marshaller},
        streams::CodeStreams,
    },
    metadata::{MarshalPolicy, SignatureMethod},
    Result,
};

/// A generated marshalling stub, ready for back-end lowering.
///
/// The instruction sequence is complete except for the native call itself,
/// which the back-end inserts at [`MarshallingStub::native_call_index`] (it
/// owns the target address and calling convention). The cleanup section must
/// be made reachable from exceptional unwind as well as the normal path.
#[derive(Debug)]
pub struct MarshallingStub {
    /// The concatenated instruction streams, in final order
    pub instructions: Vec<Instruction>,
    /// Where the back-end inserts the native call
    pub native_call_index: usize,
    /// Start of the cleanup section
    pub cleanup_index: usize,
    /// Length of the cleanup section
    pub cleanup_len: usize,
    /// Number of argument pushes in the call-site section
    pub callsite_pushes: usize,
    /// Local variable slots of the stub
    pub locals: Vec<LocalSlot>,
    /// Synthetic-token intern tables for back-end fixup
    pub tokens: TokenTables,
    /// True when the target reports failures via `GetLastError` and the
    /// back-end must capture it right after the call
    pub sets_last_error: bool,
}

/// Generates the marshalling stub for one interop method.
pub struct StubGenerator<'a> {
    signature: &'a SignatureMethod,
    policy: MarshalPolicy,
    direction: MarshalDirection,
}

impl<'a> StubGenerator<'a> {
    /// A generator for a managed-to-native (P/Invoke) stub.
    #[must_use]
    pub fn forward(signature: &'a SignatureMethod, policy: MarshalPolicy) -> Self {
        StubGenerator {
            signature,
            policy,
            direction: MarshalDirection::Forward,
        }
    }

    /// A generator for a native-to-managed (reverse P/Invoke) stub.
    #[must_use]
    pub fn reverse(signature: &'a SignatureMethod, policy: MarshalPolicy) -> Self {
        StubGenerator {
            signature,
            policy,
            direction: MarshalDirection::Reverse,
        }
    }

    /// Generates the stub.
    ///
    /// Marshallers for every parameter are constructed up front, so
    /// cross-parameter validation (`SizeParamIndex`) completes before any
    /// instruction is emitted; the return-value marshaller runs last and
    /// writes only into the return-value stream.
    ///
    /// # Errors
    ///
    /// [`crate::Error::UnsupportedSignature`] or
    /// [`crate::Error::InvalidSizeParamIndex`] when any parameter cannot be
    /// marshalled; nothing is partially emitted in that case.
    pub fn generate(&self) -> Result<MarshallingStub> {
        let parameter_count = u16::try_from(self.signature.params.len())
            .map_err(|_| malformed_error!("Too many parameters"))?;

        let mut marshallers = Vec::with_capacity(usize::from(parameter_count));
        for ordinal in 1..=parameter_count {
            marshallers.push(Marshaller::for_parameter(
                self.signature,
                ordinal,
                &self.policy,
                self.direction,
            )?);
        }
        let mut return_marshaller =
            Marshaller::for_parameter(self.signature, 0, &self.policy, self.direction)?;

        let mut asm = StubAssembler::new();
        let mut streams = CodeStreams::new();
        {
            let mut ctx = EmitContext {
                asm: &mut asm,
                streams: &mut streams,
            };
            for marshaller in &mut marshallers {
                marshaller.emit_marshalling(&mut ctx)?;
            }
            return_marshaller.emit_marshalling(&mut ctx)?;
        }

        let callsite_pushes = streams.callsite.len();
        let body = streams.into_body();
        let (locals, tokens) = asm.finish();

        Ok(MarshallingStub {
            instructions: body.instructions,
            native_call_index: body.native_call_index,
            cleanup_index: body.cleanup_index,
            cleanup_len: body.cleanup_len,
            callsite_pushes,
            locals,
            tokens,
            sets_last_error: self.policy.supports_last_error(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Opcode;
    use crate::metadata::{SignatureParameter, TypeSignature};

    #[test]
    fn test_single_int_argument() {
        let signature = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![SignatureParameter::new(TypeSignature::I4)],
        );
        let stub = StubGenerator::forward(&signature, MarshalPolicy::auto())
            .generate()
            .unwrap();

        // Fast path: the whole stub is one ldarg at the call site
        assert_eq!(stub.instructions.len(), 1);
        assert_eq!(stub.instructions[0].opcode, Opcode::Ldarg);
        assert_eq!(stub.callsite_pushes, 1);
        assert_eq!(stub.native_call_index, 1);
        assert_eq!(stub.cleanup_len, 0);
        assert!(!stub.sets_last_error);
    }

    #[test]
    fn test_one_push_per_argument() {
        let signature = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::I4),
            vec![
                SignatureParameter::new(TypeSignature::I4),
                SignatureParameter::new(TypeSignature::String),
                SignatureParameter::by_ref(TypeSignature::Boolean),
            ],
        );
        let stub = StubGenerator::forward(&signature, MarshalPolicy::auto())
            .generate()
            .unwrap();
        assert_eq!(stub.callsite_pushes, 3);
    }

    #[test]
    fn test_unsupported_signature_rejected() {
        let signature = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![SignatureParameter::new(TypeSignature::Object)],
        );
        let result = StubGenerator::forward(&signature, MarshalPolicy::auto()).generate();
        assert!(matches!(
            result.unwrap_err(),
            crate::Error::UnsupportedSignature(_)
        ));
    }

    #[test]
    fn test_last_error_flag_propagates() {
        let signature = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![],
        );
        let policy = MarshalPolicy::from_pinvoke_flags(
            crate::metadata::PINVOKE_ATTRIBUTES::CHAR_SET_UNICODE
                | crate::metadata::PINVOKE_ATTRIBUTES::SUPPORTS_LAST_ERROR,
        );
        let stub = StubGenerator::forward(&signature, policy).generate().unwrap();
        assert!(stub.sets_last_error);
        assert!(stub.instructions.is_empty());
    }
}
