//! Marshaller kind classification.
//!
//! The classifier is the decision table at the front of stub generation: it maps
//! a managed type, the optional marshalling descriptor attached to it, the
//! method-level policy, and the role the value plays (argument, array element,
//! or field) to the [`MarshallerKind`] that selects the emission strategy. For
//! array shapes it additionally classifies the element type.
//!
//! Classification is a pure function and never fails; unmarshallable
//! combinations yield [`MarshallerKind::Invalid`], which the stub orchestrator
//! turns into an [`crate::Error::UnsupportedSignature`] diagnostic.
//!
//! # Examples
//!
//! ```rust
//! use dotstub::interop::{classify, MarshallerKind, MarshallerRole};
//! use dotstub::metadata::{MarshalPolicy, TypeSignature};
//!
//! let (kind, _) = classify(
//!     &TypeSignature::I4,
//!     None,
//!     &MarshalPolicy::auto(),
//!     MarshallerRole::Argument,
//!     false,
//! );
//! assert_eq!(kind, MarshallerKind::BlittableValue);
//! ```

use strum::{EnumCount, EnumIter};

use crate::metadata::{MarshalPolicy, NativeType, SignatureParameter, TypeSignature};

/// Strategy tag selecting how one value marshals across the interop boundary.
///
/// Closed sum over every strategy the generator distinguishes. `Unknown` never
/// appears on a constructed marshaller; `Invalid` marks a signature that must
/// be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum MarshallerKind {
    /// Bit-identical value, no conversion
    BlittableValue,
    /// Enum, marshalled as its underlying integer
    Enum,
    /// UTF-16 code unit
    UnicodeChar,
    /// ANSI code page character
    AnsiChar,
    /// 4-byte Windows BOOL
    Bool,
    /// 1-byte C bool
    CBool,
    /// System.Decimal by value
    Decimal,
    /// System.Guid by value
    Guid,
    /// OLE automation date (64-bit float)
    OleDateTime,
    /// Non-blittable structure requiring field-wise conversion
    Struct,
    /// Blittable structure, copied as-is
    BlittableStruct,
    /// Blittable structure passed as a pointer to its layout
    BlittableStructPtr,
    /// System.Runtime.InteropServices.HandleRef
    HandleRef,
    /// SafeHandle-derived wrapper with reference counting
    SafeHandle,
    /// CriticalHandle-derived wrapper
    CriticalHandle,
    /// ANSI code page string
    AnsiString,
    /// UTF-16 string
    UnicodeString,
    /// StringBuilder marshalled to an ANSI buffer
    AnsiStringBuilder,
    /// StringBuilder marshalled to a UTF-16 buffer
    UnicodeStringBuilder,
    /// Array requiring per-element conversion
    Array,
    /// Array of blittable elements, pinned in place
    BlittableArray,
    /// Array of ANSI characters
    AnsiCharArray,
    /// Fixed-length array embedded at the marshalling site
    ByValArray,
    /// Fixed-length ANSI character array embedded at the marshalling site
    ByValAnsiCharArray,
    /// Delegate marshalled to a native function pointer
    FunctionPointer,
    /// COM VARIANT
    Variant,
    /// System.Object
    Object,
    /// Void return slot
    VoidReturn,
    /// Not yet classified
    Unknown,
    /// Unmarshallable; the signature must be rejected
    Invalid,
}

impl MarshallerKind {
    /// True for the array-shaped kinds that carry an element kind.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            MarshallerKind::Array
                | MarshallerKind::BlittableArray
                | MarshallerKind::AnsiCharArray
                | MarshallerKind::ByValArray
                | MarshallerKind::ByValAnsiCharArray
        )
    }
}

/// The role a marshalled value plays within its stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshallerRole {
    /// A method argument (or the return slot)
    Argument,
    /// An element of a marshalled array
    Element,
    /// A field of a marshalled structure
    Field,
}

/// Direction of the stub the marshaller emits into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalDirection {
    /// Managed caller invoking a native callee
    Forward,
    /// Native caller invoking a managed callee
    Reverse,
}

/// Classifies a managed type against its descriptor, policy, and role.
///
/// Returns the marshaller kind and, for array shapes, the element kind
/// ([`MarshallerKind::Unknown`] otherwise). The `signature` must already have
/// its by-reference wrapper stripped; by-reference semantics do not change the
/// strategy, only the emission templates.
///
/// First match wins within each arm of the decision table; every fall-through
/// is `Invalid`.
#[must_use]
pub fn classify(
    signature: &TypeSignature,
    descriptor: Option<&NativeType>,
    policy: &MarshalPolicy,
    role: MarshallerRole,
    is_return: bool,
) -> (MarshallerKind, MarshallerKind) {
    let kind = match signature {
        TypeSignature::Void => MarshallerKind::VoidReturn,

        TypeSignature::Boolean => match descriptor {
            None | Some(NativeType::Boolean) => MarshallerKind::Bool,
            Some(NativeType::I1 | NativeType::U1) => MarshallerKind::CBool,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::Char => match descriptor {
            None => char_kind_for(policy),
            Some(NativeType::I1 | NativeType::U1) => MarshallerKind::AnsiChar,
            Some(NativeType::I2 | NativeType::U2) => MarshallerKind::UnicodeChar,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::I1 | TypeSignature::U1 => integer_kind(descriptor, 1),
        TypeSignature::I2 | TypeSignature::U2 => integer_kind(descriptor, 2),
        TypeSignature::I4 | TypeSignature::U4 => integer_kind(descriptor, 4),
        TypeSignature::I8 | TypeSignature::U8 => integer_kind(descriptor, 8),

        TypeSignature::I | TypeSignature::U => match descriptor {
            None => MarshallerKind::BlittableValue,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::R4 => match descriptor {
            None | Some(NativeType::R4) => MarshallerKind::BlittableValue,
            Some(_) => MarshallerKind::Invalid,
        },
        TypeSignature::R8 => match descriptor {
            None | Some(NativeType::R8) => MarshallerKind::BlittableValue,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::Enum { .. } => MarshallerKind::Enum,

        TypeSignature::DateTime => match descriptor {
            None | Some(NativeType::Struct { .. }) => MarshallerKind::OleDateTime,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::Decimal => match descriptor {
            None | Some(NativeType::Struct { .. }) => MarshallerKind::Decimal,
            Some(NativeType::LPStruct) if role == MarshallerRole::Argument && !is_return => {
                MarshallerKind::BlittableStructPtr
            }
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::Guid => match descriptor {
            _ if role == MarshallerRole::Element => MarshallerKind::BlittableValue,
            Some(NativeType::LPStruct) if role == MarshallerRole::Argument && !is_return => {
                MarshallerKind::BlittableStructPtr
            }
            None | Some(NativeType::Struct { .. }) => MarshallerKind::BlittableStruct,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::HandleRef => match descriptor {
            None => MarshallerKind::HandleRef,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::ValueType { blittable, .. } => {
            if *blittable {
                MarshallerKind::BlittableStruct
            } else {
                MarshallerKind::Struct
            }
        }

        TypeSignature::String => match descriptor {
            Some(NativeType::LPWStr { .. }) => MarshallerKind::UnicodeString,
            Some(NativeType::LPStr { .. }) => MarshallerKind::AnsiString,
            None => {
                if policy.char_set.is_unicode() {
                    MarshallerKind::UnicodeString
                } else {
                    MarshallerKind::AnsiString
                }
            }
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::Delegate(_) => match descriptor {
            None | Some(NativeType::Func) => MarshallerKind::FunctionPointer,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::Object => match descriptor {
            None => MarshallerKind::Variant,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::StringBuilder => match descriptor {
            Some(NativeType::LPWStr { .. }) => MarshallerKind::UnicodeStringBuilder,
            Some(NativeType::LPStr { .. }) => MarshallerKind::AnsiStringBuilder,
            None => {
                if policy.char_set.is_unicode() {
                    MarshallerKind::UnicodeStringBuilder
                } else {
                    MarshallerKind::AnsiStringBuilder
                }
            }
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::SafeHandle(_) => match descriptor {
            None => MarshallerKind::SafeHandle,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::CriticalHandle(_) => match descriptor {
            None => MarshallerKind::CriticalHandle,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::SzArray(element) => {
            return classify_array(element, descriptor, policy, role, is_return)
        }

        TypeSignature::Ptr(_) | TypeSignature::FnPtr => match descriptor {
            None => MarshallerKind::BlittableValue,
            Some(_) => MarshallerKind::Invalid,
        },

        TypeSignature::ByRef(_)
        | TypeSignature::Pinned(_)
        | TypeSignature::Class(_)
        | TypeSignature::Unknown => MarshallerKind::Invalid,
    };

    (kind, MarshallerKind::Unknown)
}

/// Character kind chosen by the method policy when no descriptor narrows it.
fn char_kind_for(policy: &MarshalPolicy) -> MarshallerKind {
    if policy.char_set.is_unicode() {
        MarshallerKind::UnicodeChar
    } else {
        MarshallerKind::AnsiChar
    }
}

/// Integer classification: blittable when the descriptor is absent or names an
/// integer of the managed width, either signedness.
fn integer_kind(descriptor: Option<&NativeType>, width: u8) -> MarshallerKind {
    match descriptor {
        None => MarshallerKind::BlittableValue,
        Some(native) if native.is_integer_of_width(width) => MarshallerKind::BlittableValue,
        Some(_) => MarshallerKind::Invalid,
    }
}

/// Array arm of the decision table.
///
/// The element is classified recursively in the `Element` role; its kind then
/// selects the array strategy. An `Invalid` element invalidates the array.
fn classify_array(
    element: &TypeSignature,
    descriptor: Option<&NativeType>,
    policy: &MarshalPolicy,
    role: MarshallerRole,
    is_return: bool,
) -> (MarshallerKind, MarshallerKind) {
    let by_value = match descriptor {
        // Native type defaults to a variable array when unspecified
        None | Some(NativeType::Array { .. }) => false,
        Some(NativeType::FixedArray { .. }) => true,
        Some(_) => return (MarshallerKind::Invalid, MarshallerKind::Unknown),
    };

    // Variable arrays only exist at argument positions
    if !by_value && (role == MarshallerRole::Field || is_return) {
        return (MarshallerKind::Invalid, MarshallerKind::Unknown);
    }

    let sub_type = descriptor.and_then(NativeType::array_sub_type);
    let (element_kind, _) = classify(element, sub_type, policy, MarshallerRole::Element, false);
    if element_kind == MarshallerKind::Invalid {
        return (MarshallerKind::Invalid, MarshallerKind::Unknown);
    }

    let kind = match element_kind {
        MarshallerKind::AnsiChar => {
            if by_value {
                MarshallerKind::ByValAnsiCharArray
            } else {
                MarshallerKind::AnsiCharArray
            }
        }
        MarshallerKind::UnicodeChar | MarshallerKind::Enum | MarshallerKind::BlittableValue => {
            if by_value {
                MarshallerKind::ByValArray
            } else {
                MarshallerKind::BlittableArray
            }
        }
        _ => {
            if by_value {
                MarshallerKind::ByValArray
            } else {
                MarshallerKind::Array
            }
        }
    };

    (kind, element_kind)
}

/// Resolves the effective `in`/`out` semantics of a parameter after
/// classification.
///
/// Applies, in order: by-reference defaults, the string-builder by-value
/// default, the plain `[In]` default, and the silent `[Out]` drop for by-value
/// value types and strings.
#[must_use]
pub fn resolve_in_out(
    kind: MarshallerKind,
    managed_type: &TypeSignature,
    parameter: &SignatureParameter,
    is_managed_by_ref: bool,
    is_return: bool,
) -> (bool, bool) {
    if is_return {
        return (false, true);
    }

    let explicit = parameter.is_in() || parameter.is_out();

    let (marshal_in, marshal_out) = if is_managed_by_ref {
        if explicit {
            (parameter.is_in(), parameter.is_out())
        } else {
            (true, true)
        }
    } else if matches!(
        kind,
        MarshallerKind::AnsiStringBuilder | MarshallerKind::UnicodeStringBuilder
    ) {
        if explicit {
            (parameter.is_in(), parameter.is_out())
        } else {
            (true, true)
        }
    } else if explicit {
        (parameter.is_in(), parameter.is_out())
    } else {
        (true, false)
    };

    // By-value value types and strings have no out semantics to propagate
    if !is_managed_by_ref
        && (managed_type.is_value_type()
            || matches!(
                kind,
                MarshallerKind::AnsiString | MarshallerKind::UnicodeString
            ))
    {
        return (marshal_in, false);
    }

    (marshal_in, marshal_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Token, PARAM_ATTRIBUTES};
    use strum::IntoEnumIterator;

    fn classify_arg(
        signature: &TypeSignature,
        descriptor: Option<&NativeType>,
        policy: &MarshalPolicy,
    ) -> MarshallerKind {
        classify(signature, descriptor, policy, MarshallerRole::Argument, false).0
    }

    #[test]
    fn test_primitive_classification() {
        let auto = MarshalPolicy::auto();
        let test_cases = vec![
            (TypeSignature::Void, None, MarshallerKind::VoidReturn),
            (TypeSignature::Boolean, None, MarshallerKind::Bool),
            (
                TypeSignature::Boolean,
                Some(NativeType::Boolean),
                MarshallerKind::Bool,
            ),
            (
                TypeSignature::Boolean,
                Some(NativeType::U1),
                MarshallerKind::CBool,
            ),
            (
                TypeSignature::Boolean,
                Some(NativeType::VariantBool),
                MarshallerKind::Invalid,
            ),
            (TypeSignature::I4, None, MarshallerKind::BlittableValue),
            (
                TypeSignature::I4,
                Some(NativeType::U4),
                MarshallerKind::BlittableValue,
            ),
            (
                TypeSignature::I4,
                Some(NativeType::I8),
                MarshallerKind::Invalid,
            ),
            (TypeSignature::U8, None, MarshallerKind::BlittableValue),
            (TypeSignature::I, None, MarshallerKind::BlittableValue),
            (
                TypeSignature::I,
                Some(NativeType::Int),
                MarshallerKind::Invalid,
            ),
            (TypeSignature::R4, None, MarshallerKind::BlittableValue),
            (
                TypeSignature::R4,
                Some(NativeType::R8),
                MarshallerKind::Invalid,
            ),
            (
                TypeSignature::R8,
                Some(NativeType::R8),
                MarshallerKind::BlittableValue,
            ),
        ];

        for (signature, descriptor, expected) in test_cases {
            assert_eq!(
                classify_arg(&signature, descriptor.as_ref(), &auto),
                expected,
                "classifying {signature:?} with {descriptor:?}"
            );
        }
    }

    #[test]
    fn test_char_classification() {
        assert_eq!(
            classify_arg(&TypeSignature::Char, None, &MarshalPolicy::ansi()),
            MarshallerKind::AnsiChar
        );
        assert_eq!(
            classify_arg(&TypeSignature::Char, None, &MarshalPolicy::unicode()),
            MarshallerKind::UnicodeChar
        );
        assert_eq!(
            classify_arg(&TypeSignature::Char, None, &MarshalPolicy::auto()),
            MarshallerKind::UnicodeChar
        );
        assert_eq!(
            classify_arg(
                &TypeSignature::Char,
                Some(&NativeType::U1),
                &MarshalPolicy::unicode()
            ),
            MarshallerKind::AnsiChar
        );
        assert_eq!(
            classify_arg(
                &TypeSignature::Char,
                Some(&NativeType::I2),
                &MarshalPolicy::ansi()
            ),
            MarshallerKind::UnicodeChar
        );
        assert_eq!(
            classify_arg(
                &TypeSignature::Char,
                Some(&NativeType::I4),
                &MarshalPolicy::auto()
            ),
            MarshallerKind::Invalid
        );
    }

    #[test]
    fn test_value_type_classification() {
        let auto = MarshalPolicy::auto();
        let color = TypeSignature::Enum {
            token: Token::new(0x02000010),
            underlying: Box::new(TypeSignature::I4),
        };
        assert_eq!(classify_arg(&color, None, &auto), MarshallerKind::Enum);

        assert_eq!(
            classify_arg(&TypeSignature::DateTime, None, &auto),
            MarshallerKind::OleDateTime
        );
        assert_eq!(
            classify_arg(&TypeSignature::Decimal, None, &auto),
            MarshallerKind::Decimal
        );
        assert_eq!(
            classify_arg(&TypeSignature::Decimal, Some(&NativeType::LPStruct), &auto),
            MarshallerKind::BlittableStructPtr
        );
        assert_eq!(
            classify(
                &TypeSignature::Decimal,
                Some(&NativeType::LPStruct),
                &auto,
                MarshallerRole::Field,
                false
            )
            .0,
            MarshallerKind::Invalid
        );
        assert_eq!(
            classify(
                &TypeSignature::Decimal,
                Some(&NativeType::LPStruct),
                &auto,
                MarshallerRole::Argument,
                true
            )
            .0,
            MarshallerKind::Invalid
        );

        assert_eq!(
            classify_arg(&TypeSignature::Guid, None, &auto),
            MarshallerKind::BlittableStruct
        );
        assert_eq!(
            classify_arg(&TypeSignature::Guid, Some(&NativeType::LPStruct), &auto),
            MarshallerKind::BlittableStructPtr
        );
        assert_eq!(
            classify(
                &TypeSignature::Guid,
                None,
                &auto,
                MarshallerRole::Element,
                false
            )
            .0,
            MarshallerKind::BlittableValue
        );

        let blittable = TypeSignature::ValueType {
            token: Token::new(0x02000011),
            blittable: true,
        };
        let managed_only = TypeSignature::ValueType {
            token: Token::new(0x02000012),
            blittable: false,
        };
        assert_eq!(
            classify_arg(&blittable, None, &auto),
            MarshallerKind::BlittableStruct
        );
        assert_eq!(classify_arg(&managed_only, None, &auto), MarshallerKind::Struct);
    }

    #[test]
    fn test_reference_type_classification() {
        let auto = MarshalPolicy::auto();
        assert_eq!(
            classify_arg(&TypeSignature::String, None, &auto),
            MarshallerKind::UnicodeString
        );
        assert_eq!(
            classify_arg(&TypeSignature::String, None, &MarshalPolicy::ansi()),
            MarshallerKind::AnsiString
        );
        assert_eq!(
            classify_arg(
                &TypeSignature::String,
                Some(&NativeType::LPStr {
                    size_param_index: None
                }),
                &auto
            ),
            MarshallerKind::AnsiString
        );
        assert_eq!(
            classify_arg(&TypeSignature::String, Some(&NativeType::BStr), &auto),
            MarshallerKind::Invalid
        );

        assert_eq!(
            classify_arg(&TypeSignature::StringBuilder, None, &auto),
            MarshallerKind::UnicodeStringBuilder
        );
        assert_eq!(
            classify_arg(&TypeSignature::StringBuilder, None, &MarshalPolicy::ansi()),
            MarshallerKind::AnsiStringBuilder
        );

        let callback = TypeSignature::Delegate(Token::new(0x02000020));
        assert_eq!(
            classify_arg(&callback, None, &auto),
            MarshallerKind::FunctionPointer
        );
        assert_eq!(
            classify_arg(&callback, Some(&NativeType::Func), &auto),
            MarshallerKind::FunctionPointer
        );
        assert_eq!(
            classify_arg(&callback, Some(&NativeType::I4), &auto),
            MarshallerKind::Invalid
        );

        assert_eq!(
            classify_arg(&TypeSignature::Object, None, &auto),
            MarshallerKind::Variant
        );
        assert_eq!(
            classify_arg(&TypeSignature::Object, Some(&NativeType::Variant), &auto),
            MarshallerKind::Invalid
        );

        let handle = TypeSignature::SafeHandle(Token::new(0x02000030));
        assert_eq!(classify_arg(&handle, None, &auto), MarshallerKind::SafeHandle);
        assert_eq!(
            classify_arg(&handle, Some(&NativeType::Int), &auto),
            MarshallerKind::Invalid
        );

        // Plain reference types have no marshalling strategy
        assert_eq!(
            classify_arg(&TypeSignature::Class(Token::new(0x02000040)), None, &auto),
            MarshallerKind::Invalid
        );
    }

    #[test]
    fn test_array_classification() {
        let auto = MarshalPolicy::auto();

        let ints = TypeSignature::SzArray(Box::new(TypeSignature::I4));
        assert_eq!(
            classify(&ints, None, &auto, MarshallerRole::Argument, false),
            (MarshallerKind::BlittableArray, MarshallerKind::BlittableValue)
        );

        let strings = TypeSignature::SzArray(Box::new(TypeSignature::String));
        assert_eq!(
            classify(&strings, None, &auto, MarshallerRole::Argument, false),
            (MarshallerKind::Array, MarshallerKind::UnicodeString)
        );

        let chars = TypeSignature::SzArray(Box::new(TypeSignature::Char));
        assert_eq!(
            classify(&chars, None, &MarshalPolicy::ansi(), MarshallerRole::Argument, false),
            (MarshallerKind::AnsiCharArray, MarshallerKind::AnsiChar)
        );
        assert_eq!(
            classify(&chars, None, &auto, MarshallerRole::Argument, false),
            (MarshallerKind::BlittableArray, MarshallerKind::UnicodeChar)
        );

        // Element descriptor overrides the element classification
        let chars_as_bytes = NativeType::Array {
            element_type: Box::new(NativeType::U1),
            num_param: None,
            num_element: None,
        };
        assert_eq!(
            classify(
                &chars,
                Some(&chars_as_bytes),
                &auto,
                MarshallerRole::Argument,
                false
            ),
            (MarshallerKind::AnsiCharArray, MarshallerKind::AnsiChar)
        );

        // Variable arrays cannot be fields or returns
        assert_eq!(
            classify(&ints, None, &auto, MarshallerRole::Field, false).0,
            MarshallerKind::Invalid
        );
        assert_eq!(
            classify(&ints, None, &auto, MarshallerRole::Argument, true).0,
            MarshallerKind::Invalid
        );

        // By-value arrays are the field-embedded form
        let fixed = NativeType::FixedArray {
            size: 8,
            element_type: None,
        };
        assert_eq!(
            classify(&ints, Some(&fixed), &auto, MarshallerRole::Field, false),
            (MarshallerKind::ByValArray, MarshallerKind::BlittableValue)
        );
        assert_eq!(
            classify(&chars, Some(&fixed), &MarshalPolicy::ansi(), MarshallerRole::Field, false),
            (MarshallerKind::ByValAnsiCharArray, MarshallerKind::AnsiChar)
        );

        // Invalid element invalidates the array
        let objects = TypeSignature::SzArray(Box::new(TypeSignature::Object));
        assert_eq!(
            classify(&objects, None, &auto, MarshallerRole::Argument, false),
            (MarshallerKind::Invalid, MarshallerKind::Unknown)
        );
    }

    #[test]
    fn test_pointer_classification() {
        let auto = MarshalPolicy::auto();
        assert_eq!(
            classify_arg(&TypeSignature::I4.pointer_to(), None, &auto),
            MarshallerKind::BlittableValue
        );
        assert_eq!(
            classify_arg(&TypeSignature::I4.pointer_to(), Some(&NativeType::Int), &auto),
            MarshallerKind::Invalid
        );
        assert_eq!(
            classify_arg(&TypeSignature::FnPtr, None, &auto),
            MarshallerKind::BlittableValue
        );
    }

    #[test]
    fn test_classifier_idempotence() {
        let auto = MarshalPolicy::auto();
        let signatures = vec![
            TypeSignature::I4,
            TypeSignature::String,
            TypeSignature::SzArray(Box::new(TypeSignature::Char)),
            TypeSignature::SafeHandle(Token::new(0x02000001)),
        ];

        for signature in signatures {
            let first = classify(&signature, None, &auto, MarshallerRole::Argument, false);
            let second = classify(&signature, None, &auto, MarshallerRole::Argument, false);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_kind_enum_is_closed() {
        // The emitters dispatch over every kind; the count pins the closed set.
        assert_eq!(MarshallerKind::COUNT, 30);
        assert!(MarshallerKind::iter().any(|k| k == MarshallerKind::Invalid));
    }

    #[test]
    fn test_in_out_resolution() {
        let plain = SignatureParameter::new(TypeSignature::I4);
        assert_eq!(
            resolve_in_out(
                MarshallerKind::BlittableValue,
                &TypeSignature::I4,
                &plain,
                false,
                false
            ),
            (true, false)
        );

        // By-reference defaults to [In, Out]
        let by_ref = SignatureParameter::by_ref(TypeSignature::I4);
        assert_eq!(
            resolve_in_out(
                MarshallerKind::BlittableValue,
                &TypeSignature::I4,
                &by_ref,
                true,
                false
            ),
            (true, true)
        );

        // Explicit [Out] on by-reference is honoured
        let out_only = SignatureParameter::by_ref(TypeSignature::I4)
            .with_flags(PARAM_ATTRIBUTES::OUT);
        assert_eq!(
            resolve_in_out(
                MarshallerKind::BlittableValue,
                &TypeSignature::I4,
                &out_only,
                true,
                false
            ),
            (false, true)
        );

        // StringBuilder by value defaults to [In, Out]
        let builder = SignatureParameter::new(TypeSignature::StringBuilder);
        assert_eq!(
            resolve_in_out(
                MarshallerKind::UnicodeStringBuilder,
                &TypeSignature::StringBuilder,
                &builder,
                false,
                false
            ),
            (true, true)
        );

        // [Out] on a by-value value type is silently dropped
        let out_value = SignatureParameter::new(TypeSignature::I4)
            .with_flags(PARAM_ATTRIBUTES::IN | PARAM_ATTRIBUTES::OUT);
        assert_eq!(
            resolve_in_out(
                MarshallerKind::BlittableValue,
                &TypeSignature::I4,
                &out_value,
                false,
                false
            ),
            (true, false)
        );

        // By-value string with in forces out off
        let in_out_string = SignatureParameter::new(TypeSignature::String)
            .with_flags(PARAM_ATTRIBUTES::IN | PARAM_ATTRIBUTES::OUT);
        assert_eq!(
            resolve_in_out(
                MarshallerKind::UnicodeString,
                &TypeSignature::String,
                &in_out_string,
                false,
                false
            ),
            (true, false)
        );

        // Return slots only unmarshal
        assert_eq!(
            resolve_in_out(
                MarshallerKind::UnicodeString,
                &TypeSignature::String,
                &plain,
                false,
                true
            ),
            (false, true)
        );
    }
}
