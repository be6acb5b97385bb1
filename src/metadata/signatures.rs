//! Managed signature model for interop stub generation.
//!
//! The types in this module describe the *managed* side of an interop boundary:
//! the shape of a method signature ([`SignatureMethod`]), its parameters
//! ([`SignatureParameter`]) and their types ([`TypeSignature`]), together with the
//! method-level marshalling policy ([`MarshalPolicy`]) derived from the P/Invoke
//! attribute flags.
//!
//! # Resolved well-known types
//!
//! [`TypeSignature`] is structural for primitives, pointers, by-refs and arrays,
//! but carries *resolved* variants for the well-known types whose identity drives
//! marshalling strategy selection: `System.String`, `System.Text.StringBuilder`,
//! `SafeHandle`/`CriticalHandle` descendants, `HandleRef`, `System.Decimal`,
//! `System.Guid`, `System.DateTime`, enums and delegates. Resolving these facts
//! before the signature reaches the stub generator keeps classification a pure
//! function; the host compiler performs the recognition the same way it computes
//! any other type-level fact.
//!
//! # Key Components
//!
//! - [`TypeSignature`] - Managed type shapes, structural plus resolved well-known types
//! - [`SignatureParameter`] / [`SignatureMethod`] - Parameter and method records
//! - [`PARAM_ATTRIBUTES`] / [`PINVOKE_ATTRIBUTES`] - ECMA-335 flag constants
//! - [`PInvokeOptions`] - Best-fit / last-error option groups
//! - [`CharSet`] and [`MarshalPolicy`] - Method-level character-set policy

use bitflags::bitflags;

use crate::{metadata::marshalling::NativeType, metadata::token::Token, Result};

#[allow(non_snake_case)]
/// All possible flags for `ParamAttributes` (ECMA-335 II.23.1.13)
pub mod PARAM_ATTRIBUTES {
    /// Param is `In`
    pub const IN: u32 = 0x0001;
    /// Param is `Out`
    pub const OUT: u32 = 0x0002;
    /// Param is optional
    pub const OPTIONAL: u32 = 0x0010;
    /// Param has default value
    pub const HAS_DEFAULT: u32 = 0x1000;
    /// Param has `FieldMarshal`
    pub const HAS_FIELD_MARSHAL: u32 = 0x2000;
    /// Reserved: shall be zero in a conforming implementation
    pub const UNUSED: u32 = 0xcfe0;
}

#[allow(non_snake_case)]
/// All possible flags for `PInvokeAttributes` (ECMA-335 II.23.1.8)
pub mod PINVOKE_ATTRIBUTES {
    /// `PInvoke` is to use the member name as specified
    pub const NO_MANGLE: u32 = 0x0001;
    /// Character set is not specified
    pub const CHAR_SET_NOT_SPEC: u32 = 0x0000;
    /// Strings marshal to the ANSI code page
    pub const CHAR_SET_ANSI: u32 = 0x0002;
    /// Strings marshal to UTF-16
    pub const CHAR_SET_UNICODE: u32 = 0x0004;
    /// Character set chosen per platform
    pub const CHAR_SET_AUTO: u32 = 0x0006;
    /// Character set mask
    pub const CHAR_SET_MASK: u32 = 0x0006;
    /// Target supports `GetLastError`-style error reporting
    pub const SUPPORTS_LAST_ERROR: u32 = 0x0040;
    /// Calling convention mask
    pub const CALL_CONV_MASK: u32 = 0x0700;
    /// Calling convention = `WinAPI`
    pub const CALL_CONV_WINAPI: u32 = 0x0100;
    /// Calling convention = C
    pub const CALL_CONV_CDECL: u32 = 0x0200;
    /// Calling convention = `StdCall`
    pub const CALL_CONV_STDCALL: u32 = 0x0300;
    /// Calling convention = `ThisCall`
    pub const CALL_CONV_THISCALL: u32 = 0x0400;
    /// Calling convention = `FastCall`
    pub const CALL_CONV_FASTCALL: u32 = 0x0500;
    /// Best fit mapping mask
    pub const BEST_FIT_MASK: u32 = 0x0030;
    /// Best fit mapping is enabled
    pub const BEST_FIT_ENABLED: u32 = 0x0010;
    /// Best fit mapping is disabled
    pub const BEST_FIT_DISABLED: u32 = 0x0020;
    /// Throw-on-unmappable-char mask
    pub const THROW_ON_UNMAPPABLE_MASK: u32 = 0x3000;
    /// Throw on an unmappable Unicode character
    pub const THROW_ON_UNMAPPABLE_ENABLED: u32 = 0x1000;
    /// Do not throw on an unmappable Unicode character
    pub const THROW_ON_UNMAPPABLE_DISABLED: u32 = 0x2000;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// P/Invoke option flags the generated stub records for the back-end
    pub struct PInvokeOptions: u32 {
        /// Target supports `GetLastError`-style error reporting
        const SUPPORTS_LAST_ERROR = 0x0040;
        /// Best fit mapping is enabled
        const BEST_FIT_ENABLED = 0x0010;
        /// Best fit mapping is disabled
        const BEST_FIT_DISABLED = 0x0020;
        /// Throw on an unmappable Unicode character
        const THROW_ON_UNMAPPABLE_ENABLED = 0x1000;
        /// Do not throw on an unmappable Unicode character
        const THROW_ON_UNMAPPABLE_DISABLED = 0x2000;
    }
}

impl PInvokeOptions {
    /// Extract the option groups from raw `PInvokeAttributes` flags
    #[must_use]
    pub fn from_pinvoke_flags(flags: u32) -> Self {
        Self::from_bits_truncate(
            flags
                & (PINVOKE_ATTRIBUTES::SUPPORTS_LAST_ERROR
                    | PINVOKE_ATTRIBUTES::BEST_FIT_MASK
                    | PINVOKE_ATTRIBUTES::THROW_ON_UNMAPPABLE_MASK),
        )
    }
}

/// Character set a P/Invoke method marshals its strings and characters with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharSet {
    /// ANSI code page
    Ansi,
    /// UTF-16
    Unicode,
    /// Platform default; this generator resolves `Auto` to Unicode
    #[default]
    Auto,
}

impl CharSet {
    /// Extract the character set from raw `PInvokeAttributes` flags
    #[must_use]
    pub fn from_pinvoke_flags(flags: u32) -> Self {
        match flags & PINVOKE_ATTRIBUTES::CHAR_SET_MASK {
            PINVOKE_ATTRIBUTES::CHAR_SET_ANSI => CharSet::Ansi,
            PINVOKE_ATTRIBUTES::CHAR_SET_UNICODE => CharSet::Unicode,
            _ => CharSet::Auto,
        }
    }

    /// True when strings under this policy marshal to UTF-16.
    ///
    /// `Auto` resolves to Unicode; the ANSI page is only used when requested
    /// explicitly.
    #[must_use]
    pub fn is_unicode(self) -> bool {
        !matches!(self, CharSet::Ansi)
    }
}

/// Method-level marshalling policy for one P/Invoke method.
///
/// Combines the character set with the option groups of the method's
/// `PInvokeAttributes`. The policy participates in classification (character
/// and string defaults) and is recorded on the generated stub so the back-end
/// can emit last-error bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshalPolicy {
    /// Character set strings and characters marshal with
    pub char_set: CharSet,
    /// Best-fit / last-error option groups
    pub options: PInvokeOptions,
}

impl MarshalPolicy {
    /// Policy marshalling strings to the ANSI code page
    #[must_use]
    pub fn ansi() -> Self {
        MarshalPolicy {
            char_set: CharSet::Ansi,
            options: PInvokeOptions::empty(),
        }
    }

    /// Policy marshalling strings to UTF-16
    #[must_use]
    pub fn unicode() -> Self {
        MarshalPolicy {
            char_set: CharSet::Unicode,
            options: PInvokeOptions::empty(),
        }
    }

    /// Platform-default policy (resolves to Unicode)
    #[must_use]
    pub fn auto() -> Self {
        MarshalPolicy {
            char_set: CharSet::Auto,
            options: PInvokeOptions::empty(),
        }
    }

    /// Builds a policy from raw `PInvokeAttributes` flags
    #[must_use]
    pub fn from_pinvoke_flags(flags: u32) -> Self {
        MarshalPolicy {
            char_set: CharSet::from_pinvoke_flags(flags),
            options: PInvokeOptions::from_pinvoke_flags(flags),
        }
    }

    /// True when the target reports failures through `GetLastError`
    #[must_use]
    pub fn supports_last_error(&self) -> bool {
        self.options.contains(PInvokeOptions::SUPPORTS_LAST_ERROR)
    }
}

impl Default for MarshalPolicy {
    fn default() -> Self {
        MarshalPolicy::auto()
    }
}

/// Represents a managed type in an interop signature.
///
/// Structural variants cover primitives, pointers, by-refs, single-dimensional
/// arrays and pinned locals; resolved variants name the well-known types whose
/// identity selects a marshalling strategy (see the module docs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeSignature {
    #[default]
    /// Not defined
    Unknown,
    /// void
    Void,
    /// bool
    Boolean,
    /// 16-bit Unicode character
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// signed integer, sized to executing platform
    I,
    /// unsigned integer, sized to executing platform
    U,
    /// System.String
    String,
    /// System.Object
    Object,
    /// An unmanaged pointer to a type
    Ptr(Box<TypeSignature>),
    /// Type passed by reference
    ByRef(Box<TypeSignature>),
    /// Single dimension, zero-based array
    SzArray(Box<TypeSignature>),
    /// A pinned type (local variable slots only)
    Pinned(Box<TypeSignature>),
    /// Function pointer
    FnPtr,
    /// An enum type and its underlying integer type
    Enum {
        /// Token of the enum type definition
        token: Token,
        /// The underlying integer type
        underlying: Box<TypeSignature>,
    },
    /// A non-well-known value type, with its blittability resolved
    ValueType {
        /// Token of the type definition
        token: Token,
        /// Whether managed and native layouts are bit-identical
        blittable: bool,
    },
    /// A reference type with no special marshalling identity
    Class(Token),
    /// A delegate type
    Delegate(Token),
    /// System.Text.StringBuilder
    StringBuilder,
    /// A type derived from `System.Runtime.InteropServices.SafeHandle`
    SafeHandle(Token),
    /// A type derived from `System.Runtime.InteropServices.CriticalHandle`
    CriticalHandle(Token),
    /// System.Runtime.InteropServices.HandleRef
    HandleRef,
    /// System.Decimal
    Decimal,
    /// System.Guid
    Guid,
    /// System.DateTime
    DateTime,
}

impl TypeSignature {
    /// True for the CIL primitive types (including the native-sized integers).
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeSignature::Void
                | TypeSignature::Boolean
                | TypeSignature::Char
                | TypeSignature::I1
                | TypeSignature::U1
                | TypeSignature::I2
                | TypeSignature::U2
                | TypeSignature::I4
                | TypeSignature::U4
                | TypeSignature::I8
                | TypeSignature::U8
                | TypeSignature::R4
                | TypeSignature::R8
                | TypeSignature::I
                | TypeSignature::U
        )
    }

    /// True for integer types that can carry an element count (`SizeParamIndex`).
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            TypeSignature::I1
                | TypeSignature::U1
                | TypeSignature::I2
                | TypeSignature::U2
                | TypeSignature::I4
                | TypeSignature::U4
                | TypeSignature::I8
                | TypeSignature::U8
                | TypeSignature::I
                | TypeSignature::U
        )
    }

    /// True for value types, which lose `[Out]` semantics when passed by value.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.is_primitive() && !matches!(self, TypeSignature::Void)
            || matches!(
                self,
                TypeSignature::Enum { .. }
                    | TypeSignature::ValueType { .. }
                    | TypeSignature::HandleRef
                    | TypeSignature::Decimal
                    | TypeSignature::Guid
                    | TypeSignature::DateTime
            )
    }

    /// True when managed and native representations are bit-identical.
    #[must_use]
    pub fn is_blittable(&self) -> bool {
        match self {
            TypeSignature::I1
            | TypeSignature::U1
            | TypeSignature::I2
            | TypeSignature::U2
            | TypeSignature::I4
            | TypeSignature::U4
            | TypeSignature::I8
            | TypeSignature::U8
            | TypeSignature::R4
            | TypeSignature::R8
            | TypeSignature::I
            | TypeSignature::U
            | TypeSignature::Ptr(_)
            | TypeSignature::FnPtr
            | TypeSignature::Guid => true,
            TypeSignature::Enum { underlying, .. } => underlying.is_blittable(),
            TypeSignature::ValueType { blittable, .. } => *blittable,
            _ => false,
        }
    }

    /// True when this signature is a by-reference wrapper.
    #[must_use]
    pub fn is_byref(&self) -> bool {
        matches!(self, TypeSignature::ByRef(_))
    }

    /// Removes a by-reference wrapper, if present.
    #[must_use]
    pub fn strip_byref(&self) -> &TypeSignature {
        match self {
            TypeSignature::ByRef(inner) => inner,
            other => other,
        }
    }

    /// Wraps this type in an unmanaged pointer.
    #[must_use]
    pub fn pointer_to(self) -> TypeSignature {
        TypeSignature::Ptr(Box::new(self))
    }

    /// Wraps this type as pinned (for pinned local slots).
    #[must_use]
    pub fn pinned(self) -> TypeSignature {
        TypeSignature::Pinned(Box::new(self))
    }

    /// Returns the element type of a single-dimensional array.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeError`] when the signature is not an array.
    pub fn element_type(&self) -> Result<&TypeSignature> {
        match self {
            TypeSignature::SzArray(element) => Ok(element),
            other => Err(crate::Error::TypeError(format!(
                "Type has no array element type - {other:?}"
            ))),
        }
    }
}

/// Parameter of an interop method signature.
///
/// Combines the parameter's type with its `ParamAttributes` flags and the
/// optional marshalling descriptor carried by the `FieldMarshal` table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureParameter {
    /// Parameter is passed by reference
    pub by_ref: bool,
    /// The type of the parameter (not including the by-ref wrapper)
    pub base: TypeSignature,
    /// Bitmask of [`PARAM_ATTRIBUTES`]
    pub flags: u32,
    /// Marshalling descriptor, when the parameter carries one
    pub marshal: Option<NativeType>,
}

impl SignatureParameter {
    /// A by-value parameter of the given type with no flags or descriptor
    #[must_use]
    pub fn new(base: TypeSignature) -> Self {
        SignatureParameter {
            by_ref: false,
            base,
            flags: 0,
            marshal: None,
        }
    }

    /// A by-reference parameter of the given type
    #[must_use]
    pub fn by_ref(base: TypeSignature) -> Self {
        SignatureParameter {
            by_ref: true,
            base,
            flags: 0,
            marshal: None,
        }
    }

    /// A return-value slot of the given type
    #[must_use]
    pub fn returning(base: TypeSignature) -> Self {
        SignatureParameter::new(base)
    }

    /// Attaches a marshalling descriptor
    #[must_use]
    pub fn with_marshal(mut self, marshal: NativeType) -> Self {
        self.marshal = Some(marshal);
        self
    }

    /// Attaches `ParamAttributes` flags
    #[must_use]
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// The parameter type as seen in the signature, including the by-ref wrapper.
    #[must_use]
    pub fn signature_type(&self) -> TypeSignature {
        if self.by_ref {
            TypeSignature::ByRef(Box::new(self.base.clone()))
        } else {
            self.base.clone()
        }
    }

    /// True when the `In` flag is set explicitly
    #[must_use]
    pub fn is_in(&self) -> bool {
        self.flags & PARAM_ATTRIBUTES::IN != 0
    }

    /// True when the `Out` flag is set explicitly
    #[must_use]
    pub fn is_out(&self) -> bool {
        self.flags & PARAM_ATTRIBUTES::OUT != 0
    }

    /// True when the `Optional` flag is set
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.flags & PARAM_ATTRIBUTES::OPTIONAL != 0
    }
}

/// Represents an interop method signature (II.23.2.1, P/Invoke subset).
#[derive(Debug, Clone, PartialEq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SignatureMethod {
    /// Uses native 'cdecl' calling convention
    pub cdecl: bool,
    /// Uses native 'stdcall' calling convention
    pub stdcall: bool,
    /// Uses native 'thiscall' calling convention
    pub thiscall: bool,
    /// Uses native 'fastcall' calling convention
    pub fastcall: bool,
    /// The return-value slot of this method
    pub return_type: SignatureParameter,
    /// The parameters of this method, in signature order
    pub params: Vec<SignatureParameter>,
}

impl SignatureMethod {
    /// A P/Invoke signature with the platform-default calling convention.
    #[must_use]
    pub fn pinvoke(return_type: SignatureParameter, params: Vec<SignatureParameter>) -> Self {
        SignatureMethod {
            return_type,
            params,
            ..SignatureMethod::default()
        }
    }

    /// Looks up a parameter by its 1-based ordinal (0 is the return slot).
    #[must_use]
    pub fn parameter(&self, ordinal: u16) -> Option<&SignatureParameter> {
        if ordinal == 0 {
            Some(&self.return_type)
        } else {
            self.params.get(usize::from(ordinal) - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_set_from_flags() {
        let test_cases = vec![
            (PINVOKE_ATTRIBUTES::CHAR_SET_ANSI, CharSet::Ansi),
            (PINVOKE_ATTRIBUTES::CHAR_SET_UNICODE, CharSet::Unicode),
            (PINVOKE_ATTRIBUTES::CHAR_SET_AUTO, CharSet::Auto),
            (PINVOKE_ATTRIBUTES::CHAR_SET_NOT_SPEC, CharSet::Auto),
        ];

        for (flags, expected) in test_cases {
            assert_eq!(CharSet::from_pinvoke_flags(flags), expected);
        }
    }

    #[test]
    fn test_policy_from_flags() {
        let policy = MarshalPolicy::from_pinvoke_flags(
            PINVOKE_ATTRIBUTES::CHAR_SET_ANSI | PINVOKE_ATTRIBUTES::SUPPORTS_LAST_ERROR,
        );
        assert_eq!(policy.char_set, CharSet::Ansi);
        assert!(policy.supports_last_error());
        assert!(!policy.char_set.is_unicode());

        assert!(!MarshalPolicy::unicode().supports_last_error());
    }

    #[test]
    fn test_blittability() {
        assert!(TypeSignature::I4.is_blittable());
        assert!(TypeSignature::Guid.is_blittable());
        assert!(TypeSignature::U.is_blittable());
        assert!(TypeSignature::I4.pointer_to().is_blittable());
        assert!(!TypeSignature::String.is_blittable());
        assert!(!TypeSignature::Boolean.is_blittable());
        assert!(!TypeSignature::Char.is_blittable());

        let color = TypeSignature::Enum {
            token: Token::new(0x02000010),
            underlying: Box::new(TypeSignature::U1),
        };
        assert!(color.is_blittable());

        assert!(TypeSignature::ValueType {
            token: Token::new(0x02000011),
            blittable: true
        }
        .is_blittable());
        assert!(!TypeSignature::ValueType {
            token: Token::new(0x02000012),
            blittable: false
        }
        .is_blittable());
    }

    #[test]
    fn test_byref_wrapping() {
        let by_ref = TypeSignature::ByRef(Box::new(TypeSignature::I4));
        assert!(by_ref.is_byref());
        assert_eq!(by_ref.strip_byref(), &TypeSignature::I4);
        assert_eq!(TypeSignature::I4.strip_byref(), &TypeSignature::I4);
    }

    #[test]
    fn test_element_type() {
        let array = TypeSignature::SzArray(Box::new(TypeSignature::U2));
        assert_eq!(array.element_type().unwrap(), &TypeSignature::U2);
        assert!(TypeSignature::String.element_type().is_err());
    }

    #[test]
    fn test_parameter_flags() {
        let param = SignatureParameter::by_ref(TypeSignature::I4)
            .with_flags(PARAM_ATTRIBUTES::IN | PARAM_ATTRIBUTES::OUT);
        assert!(param.is_in());
        assert!(param.is_out());
        assert!(!param.is_optional());
        assert_eq!(
            param.signature_type(),
            TypeSignature::ByRef(Box::new(TypeSignature::I4))
        );
    }

    #[test]
    fn test_method_parameter_lookup() {
        let method = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![
                SignatureParameter::new(TypeSignature::I4),
                SignatureParameter::new(TypeSignature::String),
            ],
        );

        assert_eq!(method.parameter(0).unwrap().base, TypeSignature::Void);
        assert_eq!(method.parameter(1).unwrap().base, TypeSignature::I4);
        assert_eq!(method.parameter(2).unwrap().base, TypeSignature::String);
        assert!(method.parameter(3).is_none());
    }
}
