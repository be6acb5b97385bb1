//! Instruction stream building and stub-level resource vending.
//!
//! Two pieces live here. [`InstructionStream`] is an append-only buffer of
//! abstract instructions with a fluent emission API, one per code section of a
//! marshalling stub. [`StubAssembler`] owns everything the sections share:
//! local variable slots (optionally pinned), branch labels, and the synthetic
//! metadata tokens standing in for types and well-known helper methods until
//! the back-end resolves them.
//!
//! # Token vending
//!
//! Types and helpers are interned on first use: asking for the token of the
//! same [`TypeSignature`] or [`HelperId`] twice yields the same token. The
//! intern tables are returned by [`StubAssembler::finish`] and shipped with
//! the generated stub so the back-end can rewrite every synthetic token
//! against the host's metadata.
//!
//! # Examples
//!
//! ```rust
//! use dotstub::assembly::{InstructionStream, StubAssembler};
//! use dotstub::metadata::TypeSignature;
//!
//! let mut asm = StubAssembler::new();
//! let count = asm.alloc_local(TypeSignature::I4);
//! let done = asm.alloc_label();
//!
//! let mut stream = InstructionStream::new();
//! stream.ldc_i4(0).stloc(count).br(done).mark(done);
//! assert_eq!(stream.len(), 4);
//! ```

use rustc_hash::FxHashMap;

use crate::{
    assembly::instruction::{Instruction, Label, LocalId, Opcode, Operand},
    metadata::{Token, TypeSignature},
};

/// Well-known helper entry points referenced by marshalling streams.
///
/// Helpers are identified by this closed enum rather than free-form name
/// lookups during emission; each maps to the `(namespace, type, method)`
/// triple the host resolves once against its symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperId {
    /// Allocate zero-initialised unmanaged memory for array marshalling
    CoTaskMemAllocAndZeroMemory,
    /// Release unmanaged memory allocated during marshalling
    CoTaskMemFree,
    /// Transcode a managed string into an ANSI byte buffer
    StringToAnsi,
    /// Materialise a managed string from an ANSI pointer
    AnsiStringToString,
    /// Materialise a managed string from a Unicode character pointer
    StringFromUnicodePtr,
    /// Borrow the writable character buffer of a string builder
    GetEmptyStringBuilderBuffer,
    /// Commit a native character buffer back into a string builder
    StringBuilderReplaceBuffer,
    /// Obtain the stable native stub pointer for a managed delegate
    GetStubForPInvokeDelegate,
    /// Offset from a string reference to its first character
    OffsetToStringData,
    /// Increment a safe handle's reference count
    SafeHandleDangerousAddRef,
    /// Decrement a safe handle's reference count
    SafeHandleDangerousRelease,
    /// Read a safe handle's raw handle value
    SafeHandleDangerousGetHandle,
    /// Store a raw handle value into a safe handle
    SafeHandleSetHandle,
}

impl HelperId {
    /// The `(namespace, type, method)` triple the host resolves this helper by.
    #[must_use]
    pub fn method_path(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            HelperId::CoTaskMemAllocAndZeroMemory => (
                "Internal.Runtime.CompilerHelpers",
                "InteropHelpers",
                "CoTaskMemAllocAndZeroMemory",
            ),
            HelperId::CoTaskMemFree => (
                "Internal.Runtime.CompilerHelpers",
                "InteropHelpers",
                "CoTaskMemFree",
            ),
            HelperId::StringToAnsi => (
                "Internal.Runtime.CompilerHelpers",
                "InteropHelpers",
                "StringToAnsi",
            ),
            HelperId::AnsiStringToString => (
                "Internal.Runtime.CompilerHelpers",
                "InteropHelpers",
                "AnsiStringToString",
            ),
            HelperId::StringFromUnicodePtr => ("System", "String", ".ctor"),
            HelperId::GetEmptyStringBuilderBuffer => (
                "Internal.Runtime.CompilerHelpers",
                "InteropHelpers",
                "GetEmptyStringBuilderBuffer",
            ),
            HelperId::StringBuilderReplaceBuffer => {
                ("System.Text", "StringBuilder", "ReplaceBuffer")
            }
            HelperId::GetStubForPInvokeDelegate => (
                "Internal.Runtime.CompilerHelpers",
                "InteropHelpers",
                "GetStubForPInvokeDelegate",
            ),
            HelperId::OffsetToStringData => (
                "System.Runtime.CompilerServices",
                "RuntimeHelpers",
                "get_OffsetToStringData",
            ),
            HelperId::SafeHandleDangerousAddRef => (
                "System.Runtime.InteropServices",
                "SafeHandle",
                "DangerousAddRef",
            ),
            HelperId::SafeHandleDangerousRelease => (
                "System.Runtime.InteropServices",
                "SafeHandle",
                "DangerousRelease",
            ),
            HelperId::SafeHandleDangerousGetHandle => (
                "System.Runtime.InteropServices",
                "SafeHandle",
                "DangerousGetHandle",
            ),
            HelperId::SafeHandleSetHandle => {
                ("System.Runtime.InteropServices", "SafeHandle", "SetHandle")
            }
        }
    }
}

/// A local variable slot of a marshalling stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSlot {
    /// Managed type of the slot
    pub signature: TypeSignature,
    /// Whether the garbage collector must not move the referenced object
    pub pinned: bool,
}

/// Side tables produced by stub assembly.
///
/// Maps every synthetic token the streams reference back to the type, helper,
/// or constructor it stands for, in vending order.
#[derive(Debug, Default, Clone)]
pub struct TokenTables {
    /// Interned types, in the order their tokens were vended
    pub types: Vec<(TypeSignature, Token)>,
    /// Interned helpers, in the order their tokens were vended
    pub helpers: Vec<(HelperId, Token)>,
    /// Interned parameterless constructors, in the order their tokens were vended
    pub ctors: Vec<(TypeSignature, Token)>,
}

impl TokenTables {
    /// Looks up the helper a synthetic method token stands for.
    #[must_use]
    pub fn helper_for(&self, token: Token) -> Option<HelperId> {
        self.helpers
            .iter()
            .find(|(_, t)| *t == token)
            .map(|(h, _)| *h)
    }

    /// Looks up the type a synthetic type token stands for.
    #[must_use]
    pub fn type_for(&self, token: Token) -> Option<&TypeSignature> {
        self.types.iter().find(|(_, t)| *t == token).map(|(s, _)| s)
    }
}

/// Vends locals, labels, and synthetic tokens for one stub.
///
/// One assembler exists per generated stub; all five code streams of the stub
/// draw from it, so slot numbering and token rows are consistent across the
/// final concatenation.
#[derive(Debug, Default)]
pub struct StubAssembler {
    locals: Vec<LocalSlot>,
    next_label: u32,
    next_member_row: u32,
    type_tokens: FxHashMap<TypeSignature, Token>,
    helper_tokens: FxHashMap<HelperId, Token>,
    ctor_tokens: FxHashMap<TypeSignature, Token>,
    tables: TokenTables,
}

impl StubAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        StubAssembler::default()
    }

    /// Allocates a local variable slot of the given type.
    pub fn alloc_local(&mut self, signature: TypeSignature) -> LocalId {
        self.push_local(signature, false)
    }

    /// Allocates a pinned local variable slot of the given type.
    ///
    /// Pinned slots have function-scoped pinning: the referenced object stays
    /// fixed until the stub returns, on normal and exceptional exits alike.
    pub fn alloc_pinned_local(&mut self, signature: TypeSignature) -> LocalId {
        self.push_local(signature, true)
    }

    fn push_local(&mut self, signature: TypeSignature, pinned: bool) -> LocalId {
        let id = u16::try_from(self.locals.len()).expect("local slot count exceeds u16");
        self.locals.push(LocalSlot { signature, pinned });
        LocalId(id)
    }

    /// Allocates a fresh branch label.
    pub fn alloc_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Returns the synthetic token for a managed type, interning it on first use.
    pub fn type_token(&mut self, signature: &TypeSignature) -> Token {
        if let Some(token) = self.type_tokens.get(signature) {
            return *token;
        }

        let row = u32::try_from(self.tables.types.len() + 1).expect("type intern table overflow");
        let token = Token::type_spec(row);
        self.type_tokens.insert(signature.clone(), token);
        self.tables.types.push((signature.clone(), token));
        token
    }

    /// Returns the synthetic token for a helper method, interning it on first use.
    pub fn helper_token(&mut self, helper: HelperId) -> Token {
        if let Some(token) = self.helper_tokens.get(&helper) {
            return *token;
        }

        let token = Token::member_ref(self.alloc_member_row());
        self.helper_tokens.insert(helper, token);
        self.tables.helpers.push((helper, token));
        token
    }

    /// Next unused row in the synthetic `MemberRef` table (helpers and
    /// constructors share it).
    fn alloc_member_row(&mut self) -> u32 {
        self.next_member_row += 1;
        self.next_member_row
    }

    /// Returns the synthetic token for a type's parameterless constructor,
    /// interning it on first use.
    ///
    /// Constructor rows share the `MemberRef` table with helpers; both tables
    /// travel with the stub so the back-end can tell them apart.
    pub fn ctor_token(&mut self, signature: &TypeSignature) -> Token {
        if let Some(token) = self.ctor_tokens.get(signature) {
            return *token;
        }

        let token = Token::member_ref(self.alloc_member_row());
        self.ctor_tokens.insert(signature.clone(), token);
        self.tables.ctors.push((signature.clone(), token));
        token
    }

    /// The local slots allocated so far.
    #[must_use]
    pub fn locals(&self) -> &[LocalSlot] {
        &self.locals
    }

    /// Consumes the assembler, returning the local slots and token tables.
    #[must_use]
    pub fn finish(self) -> (Vec<LocalSlot>, TokenTables) {
        (self.locals, self.tables)
    }
}

/// An append-only buffer of abstract instructions.
///
/// The fluent emitters return `&mut Self` so emission sequences read like the
/// instruction listing they produce. Streams are concatenated in a fixed order
/// by the stub orchestrator once every marshaller has run.
#[derive(Debug, Default, Clone)]
pub struct InstructionStream {
    instructions: Vec<Instruction>,
}

impl InstructionStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        InstructionStream::default()
    }

    /// Number of entries in the stream (label bindings included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True when nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The emitted instructions.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Appends a raw instruction.
    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /// Appends an opcode without an operand.
    pub fn emit(&mut self, opcode: Opcode) -> &mut Self {
        self.push(Instruction::new(opcode))
    }

    /// Appends an opcode with an operand.
    pub fn emit_with(&mut self, opcode: Opcode, operand: Operand) -> &mut Self {
        self.push(Instruction::with_operand(opcode, operand))
    }

    /// Moves all instructions of `other` to the end of this stream.
    pub fn append(&mut self, other: &mut InstructionStream) -> &mut Self {
        self.instructions.append(&mut other.instructions);
        self
    }

    /// `ldarg` - load argument slot
    pub fn ldarg(&mut self, index: u16) -> &mut Self {
        self.emit_with(Opcode::Ldarg, Operand::Arg(index))
    }

    /// `ldarga` - load argument slot address
    pub fn ldarga(&mut self, index: u16) -> &mut Self {
        self.emit_with(Opcode::Ldarga, Operand::Arg(index))
    }

    /// `starg` - store into argument slot
    pub fn starg(&mut self, index: u16) -> &mut Self {
        self.emit_with(Opcode::Starg, Operand::Arg(index))
    }

    /// `ldloc` - load local slot
    pub fn ldloc(&mut self, local: LocalId) -> &mut Self {
        self.emit_with(Opcode::Ldloc, Operand::Local(local))
    }

    /// `ldloca` - load local slot address
    pub fn ldloca(&mut self, local: LocalId) -> &mut Self {
        self.emit_with(Opcode::Ldloca, Operand::Local(local))
    }

    /// `stloc` - store into local slot
    pub fn stloc(&mut self, local: LocalId) -> &mut Self {
        self.emit_with(Opcode::Stloc, Operand::Local(local))
    }

    /// `ldc.i4` - load 32-bit constant
    pub fn ldc_i4(&mut self, value: i32) -> &mut Self {
        self.emit_with(Opcode::LdcI4, Operand::Immediate(value))
    }

    /// `ldnull` - load null reference
    pub fn ldnull(&mut self) -> &mut Self {
        self.emit(Opcode::Ldnull)
    }

    /// `dup` - duplicate top of stack
    pub fn dup(&mut self) -> &mut Self {
        self.emit(Opcode::Dup)
    }

    /// `pop` - discard top of stack
    pub fn pop(&mut self) -> &mut Self {
        self.emit(Opcode::Pop)
    }

    /// `add` - integer addition
    pub fn add(&mut self) -> &mut Self {
        self.emit(Opcode::Add)
    }

    /// `mul` - integer multiplication
    pub fn mul(&mut self) -> &mut Self {
        self.emit(Opcode::Mul)
    }

    /// `ceq` - compare equal
    pub fn ceq(&mut self) -> &mut Self {
        self.emit(Opcode::Ceq)
    }

    /// `conv.i` - convert to native int
    pub fn conv_i(&mut self) -> &mut Self {
        self.emit(Opcode::ConvI)
    }

    /// `conv.u` - convert to native unsigned int
    pub fn conv_u(&mut self) -> &mut Self {
        self.emit(Opcode::ConvU)
    }

    /// `conv.i4` - convert to 32-bit int
    pub fn conv_i4(&mut self) -> &mut Self {
        self.emit(Opcode::ConvI4)
    }

    /// `conv.u1` - convert to unsigned 8-bit int
    pub fn conv_u1(&mut self) -> &mut Self {
        self.emit(Opcode::ConvU1)
    }

    /// `conv.u2` - convert to unsigned 16-bit int
    pub fn conv_u2(&mut self) -> &mut Self {
        self.emit(Opcode::ConvU2)
    }

    /// `br` - unconditional branch
    pub fn br(&mut self, target: Label) -> &mut Self {
        self.emit_with(Opcode::Br, Operand::Target(target))
    }

    /// `brtrue` - branch when non-zero
    pub fn brtrue(&mut self, target: Label) -> &mut Self {
        self.emit_with(Opcode::Brtrue, Operand::Target(target))
    }

    /// `brfalse` - branch when zero or null
    pub fn brfalse(&mut self, target: Label) -> &mut Self {
        self.emit_with(Opcode::Brfalse, Operand::Target(target))
    }

    /// `blt` - branch when less than
    pub fn blt(&mut self, target: Label) -> &mut Self {
        self.emit_with(Opcode::Blt, Operand::Target(target))
    }

    /// Binds a label at the current stream position.
    pub fn mark(&mut self, label: Label) -> &mut Self {
        self.emit_with(Opcode::Mark, Operand::Target(label))
    }

    /// `call` - call the method behind a token
    pub fn call(&mut self, method: Token) -> &mut Self {
        self.emit_with(Opcode::Call, Operand::Method(method))
    }

    /// `newobj` - allocate and construct via a constructor token
    pub fn newobj(&mut self, ctor: Token) -> &mut Self {
        self.emit_with(Opcode::Newobj, Operand::Method(ctor))
    }

    /// `newarr` - allocate a single-dimensional array
    pub fn newarr(&mut self, element: Token) -> &mut Self {
        self.emit_with(Opcode::Newarr, Operand::Type(element))
    }

    /// `initobj` - zero-initialise a value type behind an address
    pub fn initobj(&mut self, ty: Token) -> &mut Self {
        self.emit_with(Opcode::Initobj, Operand::Type(ty))
    }

    /// `sizeof` - native size of a type
    pub fn size_of(&mut self, ty: Token) -> &mut Self {
        self.emit_with(Opcode::Sizeof, Operand::Type(ty))
    }

    /// `ldobj` - load a value type from an address
    pub fn ldobj(&mut self, ty: Token) -> &mut Self {
        self.emit_with(Opcode::Ldobj, Operand::Type(ty))
    }

    /// `stobj` - store a value type through an address
    pub fn stobj(&mut self, ty: Token) -> &mut Self {
        self.emit_with(Opcode::Stobj, Operand::Type(ty))
    }

    /// `ldlen` - load array length
    pub fn ldlen(&mut self) -> &mut Self {
        self.emit(Opcode::Ldlen)
    }

    /// `ldelem` - load array element of a type
    pub fn ldelem(&mut self, ty: Token) -> &mut Self {
        self.emit_with(Opcode::Ldelem, Operand::Type(ty))
    }

    /// `ldelema` - load array element address
    pub fn ldelema(&mut self, ty: Token) -> &mut Self {
        self.emit_with(Opcode::Ldelema, Operand::Type(ty))
    }

    /// `stelem` - store array element of a type
    pub fn stelem(&mut self, ty: Token) -> &mut Self {
        self.emit_with(Opcode::Stelem, Operand::Type(ty))
    }
}

impl std::fmt::Display for InstructionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_allocation() {
        let mut asm = StubAssembler::new();
        let a = asm.alloc_local(TypeSignature::I4);
        let b = asm.alloc_pinned_local(TypeSignature::String);

        assert_eq!(a, LocalId(0));
        assert_eq!(b, LocalId(1));
        assert_eq!(asm.locals().len(), 2);
        assert!(!asm.locals()[0].pinned);
        assert!(asm.locals()[1].pinned);
        assert_eq!(asm.locals()[1].signature, TypeSignature::String);
    }

    #[test]
    fn test_label_allocation() {
        let mut asm = StubAssembler::new();
        assert_ne!(asm.alloc_label(), asm.alloc_label());
    }

    #[test]
    fn test_type_token_interning() {
        let mut asm = StubAssembler::new();
        let ptr = TypeSignature::U2.pointer_to();

        let first = asm.type_token(&ptr);
        let second = asm.type_token(&ptr);
        let other = asm.type_token(&TypeSignature::I4);

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.table(), crate::metadata::TABLE_TYPE_SPEC);

        let (_, tables) = asm.finish();
        assert_eq!(tables.types.len(), 2);
        assert_eq!(tables.type_for(first), Some(&ptr));
    }

    #[test]
    fn test_helper_token_interning() {
        let mut asm = StubAssembler::new();
        let free = asm.helper_token(HelperId::CoTaskMemFree);
        assert_eq!(free, asm.helper_token(HelperId::CoTaskMemFree));
        assert_eq!(free.table(), crate::metadata::TABLE_MEMBER_REF);

        let (_, tables) = asm.finish();
        assert_eq!(tables.helper_for(free), Some(HelperId::CoTaskMemFree));
        assert_eq!(
            HelperId::CoTaskMemFree.method_path(),
            (
                "Internal.Runtime.CompilerHelpers",
                "InteropHelpers",
                "CoTaskMemFree"
            )
        );
    }

    #[test]
    fn test_fluent_stream() {
        let mut asm = StubAssembler::new();
        let local = asm.alloc_local(TypeSignature::I4);
        let skip = asm.alloc_label();

        let mut stream = InstructionStream::new();
        stream
            .ldarg(0)
            .brfalse(skip)
            .ldarg(0)
            .ldc_i4(1)
            .add()
            .stloc(local)
            .mark(skip);

        assert_eq!(stream.len(), 7);
        let listing = format!("{stream}");
        assert!(listing.contains("brfalse L_0000"));
        assert!(listing.contains("L_0000:"));
    }

    #[test]
    fn test_append_preserves_order() {
        let mut first = InstructionStream::new();
        first.ldc_i4(1);
        let mut second = InstructionStream::new();
        second.ldc_i4(2);

        first.append(&mut second);
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert_eq!(
            first.instructions()[1].operand,
            Operand::Immediate(2)
        );
    }
}
