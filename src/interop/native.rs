//! Native representation mapping.
//!
//! Maps a classified [`MarshallerKind`] to the native type a value of that kind
//! occupies on the other side of the interop boundary. The mapping is pure: the
//! same kind, element kind, managed type, and descriptor always yield the same
//! native [`TypeSignature`]. By-reference parameters additionally wrap the
//! native type in a pointer ([`native_param_type`]).
//!
//! Kinds that only exist embedded in structures (`ByValArray`,
//! `ByValAnsiCharArray`) and the unclassified tags have no representation at
//! this layer and produce a [`crate::Error::TypeError`].

use crate::{
    interop::kind::MarshallerKind,
    metadata::{NativeType, TypeSignature},
    Result,
};

/// Maps a marshaller kind to its native representation.
///
/// `managed` is the by-ref-stripped managed type the kind was classified from;
/// `element_kind` and the descriptor's array sub-type drive the recursive
/// element mapping for array kinds.
pub fn native_type_of(
    kind: MarshallerKind,
    element_kind: MarshallerKind,
    managed: &TypeSignature,
    descriptor: Option<&NativeType>,
) -> Result<TypeSignature> {
    let native = match kind {
        MarshallerKind::BlittableValue => match descriptor {
            Some(tag) => width_type(tag).unwrap_or_else(|| managed.clone()),
            None => managed.clone(),
        },

        MarshallerKind::Bool => TypeSignature::I4,
        MarshallerKind::CBool => TypeSignature::U1,

        MarshallerKind::UnicodeChar => match descriptor {
            Some(NativeType::U2) => TypeSignature::U2,
            _ => TypeSignature::I2,
        },
        MarshallerKind::AnsiChar => TypeSignature::U1,

        MarshallerKind::OleDateTime => TypeSignature::R8,

        MarshallerKind::HandleRef
        | MarshallerKind::SafeHandle
        | MarshallerKind::CriticalHandle
        | MarshallerKind::FunctionPointer => TypeSignature::I,

        MarshallerKind::UnicodeString | MarshallerKind::UnicodeStringBuilder => {
            TypeSignature::Char.pointer_to()
        }
        MarshallerKind::AnsiString | MarshallerKind::AnsiStringBuilder => {
            TypeSignature::U1.pointer_to()
        }

        MarshallerKind::AnsiCharArray => TypeSignature::U1.pointer_to(),
        MarshallerKind::Array | MarshallerKind::BlittableArray => {
            let element = managed.element_type()?;
            let sub_type = descriptor.and_then(NativeType::array_sub_type);
            native_type_of(element_kind, MarshallerKind::Unknown, element, sub_type)?
                .pointer_to()
        }

        MarshallerKind::BlittableStructPtr => managed.clone().pointer_to(),

        MarshallerKind::Enum
        | MarshallerKind::Decimal
        | MarshallerKind::Guid
        | MarshallerKind::Struct
        | MarshallerKind::BlittableStruct
        | MarshallerKind::VoidReturn => managed.clone(),

        MarshallerKind::Variant
        | MarshallerKind::Object
        | MarshallerKind::ByValArray
        | MarshallerKind::ByValAnsiCharArray
        | MarshallerKind::Unknown
        | MarshallerKind::Invalid => {
            return Err(crate::Error::TypeError(format!(
                "Kind {kind:?} has no native representation at this layer"
            )))
        }
    };

    Ok(native)
}

/// The native type of the *parameter slot*: a pointer to the native type when
/// the parameter is passed by reference, the native type itself otherwise.
#[must_use]
pub fn native_param_type(native: TypeSignature, is_native_by_ref: bool) -> TypeSignature {
    if is_native_by_ref {
        native.pointer_to()
    } else {
        native
    }
}

/// The managed integer type a width/sign descriptor tag narrows a blittable
/// value to, when it names one.
fn width_type(tag: &NativeType) -> Option<TypeSignature> {
    match tag {
        NativeType::I1 => Some(TypeSignature::I1),
        NativeType::U1 => Some(TypeSignature::U1),
        NativeType::I2 => Some(TypeSignature::I2),
        NativeType::U2 => Some(TypeSignature::U2),
        NativeType::I4 => Some(TypeSignature::I4),
        NativeType::U4 => Some(TypeSignature::U4),
        NativeType::I8 => Some(TypeSignature::I8),
        NativeType::U8 => Some(TypeSignature::U8),
        NativeType::R4 => Some(TypeSignature::R4),
        NativeType::R8 => Some(TypeSignature::R8),
        NativeType::Int => Some(TypeSignature::I),
        NativeType::UInt => Some(TypeSignature::U),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Token;
    use strum::IntoEnumIterator;

    #[test]
    fn test_scalar_mappings() {
        let test_cases = vec![
            (
                MarshallerKind::BlittableValue,
                TypeSignature::I4,
                TypeSignature::I4,
            ),
            (MarshallerKind::Bool, TypeSignature::Boolean, TypeSignature::I4),
            (MarshallerKind::CBool, TypeSignature::Boolean, TypeSignature::U1),
            (MarshallerKind::UnicodeChar, TypeSignature::Char, TypeSignature::I2),
            (MarshallerKind::AnsiChar, TypeSignature::Char, TypeSignature::U1),
            (
                MarshallerKind::OleDateTime,
                TypeSignature::DateTime,
                TypeSignature::R8,
            ),
            (
                MarshallerKind::SafeHandle,
                TypeSignature::SafeHandle(Token::new(0x02000001)),
                TypeSignature::I,
            ),
            (
                MarshallerKind::FunctionPointer,
                TypeSignature::Delegate(Token::new(0x02000002)),
                TypeSignature::I,
            ),
            (
                MarshallerKind::UnicodeString,
                TypeSignature::String,
                TypeSignature::Char.pointer_to(),
            ),
            (
                MarshallerKind::AnsiString,
                TypeSignature::String,
                TypeSignature::U1.pointer_to(),
            ),
            (
                MarshallerKind::UnicodeStringBuilder,
                TypeSignature::StringBuilder,
                TypeSignature::Char.pointer_to(),
            ),
            (
                MarshallerKind::Decimal,
                TypeSignature::Decimal,
                TypeSignature::Decimal,
            ),
            (MarshallerKind::VoidReturn, TypeSignature::Void, TypeSignature::Void),
        ];

        for (kind, managed, expected) in test_cases {
            let native = native_type_of(kind, MarshallerKind::Unknown, &managed, None).unwrap();
            assert_eq!(native, expected, "mapping {kind:?}");
        }
    }

    #[test]
    fn test_unicode_char_unsigned_with_descriptor() {
        let native = native_type_of(
            MarshallerKind::UnicodeChar,
            MarshallerKind::Unknown,
            &TypeSignature::Char,
            Some(&NativeType::U2),
        )
        .unwrap();
        assert_eq!(native, TypeSignature::U2);
    }

    #[test]
    fn test_blittable_value_width_narrowing() {
        let native = native_type_of(
            MarshallerKind::BlittableValue,
            MarshallerKind::Unknown,
            &TypeSignature::I4,
            Some(&NativeType::U4),
        )
        .unwrap();
        assert_eq!(native, TypeSignature::U4);
    }

    #[test]
    fn test_array_mappings() {
        let ints = TypeSignature::SzArray(Box::new(TypeSignature::I4));
        let native = native_type_of(
            MarshallerKind::BlittableArray,
            MarshallerKind::BlittableValue,
            &ints,
            None,
        )
        .unwrap();
        assert_eq!(native, TypeSignature::I4.pointer_to());

        let strings = TypeSignature::SzArray(Box::new(TypeSignature::String));
        let native = native_type_of(
            MarshallerKind::Array,
            MarshallerKind::UnicodeString,
            &strings,
            None,
        )
        .unwrap();
        assert_eq!(native, TypeSignature::Char.pointer_to().pointer_to());

        let chars = TypeSignature::SzArray(Box::new(TypeSignature::Char));
        let native = native_type_of(
            MarshallerKind::AnsiCharArray,
            MarshallerKind::AnsiChar,
            &chars,
            None,
        )
        .unwrap();
        assert_eq!(native, TypeSignature::U1.pointer_to());
    }

    #[test]
    fn test_struct_ptr_mapping() {
        let native = native_type_of(
            MarshallerKind::BlittableStructPtr,
            MarshallerKind::Unknown,
            &TypeSignature::Guid,
            Some(&NativeType::LPStruct),
        )
        .unwrap();
        assert_eq!(native, TypeSignature::Guid.pointer_to());
    }

    #[test]
    fn test_by_ref_wraps_pointer() {
        let native = native_param_type(TypeSignature::I4, true);
        assert_eq!(native, TypeSignature::I4.pointer_to());
        assert_eq!(native_param_type(TypeSignature::I4, false), TypeSignature::I4);
    }

    #[test]
    fn test_every_kind_maps_or_rejects() {
        // Kinds with no representation at this layer must reject cleanly, the
        // rest must map; nothing may panic.
        for kind in MarshallerKind::iter() {
            let (managed, element_kind) = sample_for(kind);
            let result = native_type_of(kind, element_kind, &managed, None);
            match kind {
                MarshallerKind::Variant
                | MarshallerKind::Object
                | MarshallerKind::ByValArray
                | MarshallerKind::ByValAnsiCharArray
                | MarshallerKind::Unknown
                | MarshallerKind::Invalid => assert!(result.is_err(), "{kind:?}"),
                _ => assert!(result.is_ok(), "{kind:?}: {result:?}"),
            }
        }
    }

    fn sample_for(kind: MarshallerKind) -> (TypeSignature, MarshallerKind) {
        match kind {
            MarshallerKind::Array => (
                TypeSignature::SzArray(Box::new(TypeSignature::String)),
                MarshallerKind::UnicodeString,
            ),
            MarshallerKind::BlittableArray => (
                TypeSignature::SzArray(Box::new(TypeSignature::I4)),
                MarshallerKind::BlittableValue,
            ),
            MarshallerKind::AnsiCharArray => (
                TypeSignature::SzArray(Box::new(TypeSignature::Char)),
                MarshallerKind::AnsiChar,
            ),
            MarshallerKind::Enum => (
                TypeSignature::Enum {
                    token: Token::new(0x02000001),
                    underlying: Box::new(TypeSignature::I4),
                },
                MarshallerKind::Unknown,
            ),
            MarshallerKind::Struct | MarshallerKind::BlittableStruct => (
                TypeSignature::ValueType {
                    token: Token::new(0x02000002),
                    blittable: kind == MarshallerKind::BlittableStruct,
                },
                MarshallerKind::Unknown,
            ),
            _ => (TypeSignature::I4, MarshallerKind::Unknown),
        }
    }
}
