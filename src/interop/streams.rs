//! The code-stream bundle of one marshalling stub.
//!
//! Every marshaller of a stub emits into the same five ordered streams. The
//! streams are append-only while marshallers run; once the orchestrator has
//! driven every marshaller, [`CodeStreams::into_body`] concatenates them in
//! the fixed order
//!
//! ```text
//! marshalling -> call-site setup -> [native call] -> unmarshalling -> cleanup -> return value
//! ```
//!
//! and records the two positions the back-end needs: where to insert the
//! native call, and where the cleanup section starts. The cleanup section must
//! stay reachable from exceptional unwind as well as normal return; the
//! back-end expresses that with whatever structured-unwind mechanism its
//! target provides, using the recorded boundaries.

use crate::assembly::{Instruction, InstructionStream};

/// Selector for one of the five streams.
///
/// Marshaller hooks receive a selector rather than a stream reference so the
/// same transform can serve the marshal, unmarshal, and return-value phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Managed-to-native conversions before the call
    Marshal,
    /// Argument pushes for the native call site
    Callsite,
    /// Native-to-managed conversions and write-backs after the call
    Unmarshal,
    /// Releases of unmanaged resources, reachable on all exits
    Cleanup,
    /// Return-value conversion
    Retval,
}

/// The five instruction streams of one stub.
#[derive(Debug, Default)]
pub struct CodeStreams {
    /// Managed-to-native conversions before the call
    pub marshal: InstructionStream,
    /// Argument pushes for the native call site
    pub callsite: InstructionStream,
    /// Native-to-managed conversions and write-backs after the call
    pub unmarshal: InstructionStream,
    /// Releases of unmanaged resources
    pub cleanup: InstructionStream,
    /// Return-value conversion
    pub retval: InstructionStream,
}

/// The concatenated body of a generated stub.
#[derive(Debug)]
pub struct StubBody {
    /// All instructions, in final order
    pub instructions: Vec<Instruction>,
    /// Position where the back-end inserts the native call
    pub native_call_index: usize,
    /// Start of the cleanup section (must run on all exits)
    pub cleanup_index: usize,
    /// Length of the cleanup section
    pub cleanup_len: usize,
}

impl CodeStreams {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        CodeStreams::default()
    }

    /// The stream behind a selector.
    pub fn get_mut(&mut self, stream: Stream) -> &mut InstructionStream {
        match stream {
            Stream::Marshal => &mut self.marshal,
            Stream::Callsite => &mut self.callsite,
            Stream::Unmarshal => &mut self.unmarshal,
            Stream::Cleanup => &mut self.cleanup,
            Stream::Retval => &mut self.retval,
        }
    }

    /// Concatenates the streams in their fixed final order.
    #[must_use]
    pub fn into_body(mut self) -> StubBody {
        let native_call_index = self.marshal.len() + self.callsite.len();
        let cleanup_index = native_call_index + self.unmarshal.len();
        let cleanup_len = self.cleanup.len();

        let mut body = InstructionStream::new();
        body.append(&mut self.marshal)
            .append(&mut self.callsite)
            .append(&mut self.unmarshal)
            .append(&mut self.cleanup)
            .append(&mut self.retval);

        StubBody {
            instructions: body.instructions().to_vec(),
            native_call_index,
            cleanup_index,
            cleanup_len,
        }
    }
}
