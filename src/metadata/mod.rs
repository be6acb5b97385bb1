//! Metadata surface consumed by the stub generator.
//!
//! This module groups the metadata-level inputs of stub generation: metadata
//! tokens, marshalling descriptors, and the managed signature model with its
//! parameter attributes and method-level policy.
//!
//! # Key Components
//!
//! - [`Token`] - 32-bit metadata token (table + row)
//! - [`NativeType`] / [`MarshallingParser`] - Marshalling descriptor surface
//! - [`TypeSignature`] / [`SignatureMethod`] - Managed signature model
//! - [`MarshalPolicy`] - Method-level character-set and option policy
//!
//! # Examples
//!
//! ```rust
//! use dotstub::metadata::{SignatureMethod, SignatureParameter, TypeSignature};
//!
//! let signature = SignatureMethod::pinvoke(
//!     SignatureParameter::returning(TypeSignature::I4),
//!     vec![SignatureParameter::new(TypeSignature::String)],
//! );
//! assert_eq!(signature.params.len(), 1);
//! ```

mod marshalling;
mod signatures;
mod token;

pub use marshalling::{
    parse_marshalling_descriptor, MarshallingInfo, MarshallingParser, NativeType, NATIVE_TYPE,
};
pub use signatures::{
    CharSet, MarshalPolicy, PInvokeOptions, SignatureMethod, SignatureParameter, TypeSignature,
    PARAM_ATTRIBUTES, PINVOKE_ATTRIBUTES,
};
pub use token::{Token, TABLE_MEMBER_REF, TABLE_TYPE_SPEC};
