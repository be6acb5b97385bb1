// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # dotstub
//!
//! [![Crates.io](https://img.shields.io/crates/v/dotstub.svg)](https://crates.io/crates/dotstub)
//! [![Documentation](https://docs.rs/dotstub/badge.svg)](https://docs.rs/dotstub)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/dotstub/blob/main/LICENSE-APACHE)
//!
//! A platform-invoke marshalling stub generator for CIL. Given a managed method
//! signature annotated with native-interop metadata, `dotstub` synthesises the
//! abstract instruction streams that convert each argument and the return value
//! between the managed calling convention and a foreign native ABI - in pure
//! Rust, without requiring the .NET runtime.
//!
//! # Architecture
//!
//! The library is organized into three layers that mirror the flow of a
//! signature through stub generation:
//!
//! - **Metadata Layer**: marshalling descriptors (ECMA-335 II.23.2.9), the
//!   managed signature model, and the method-level marshalling policy
//! - **Assembly Layer**: the abstract CIL instruction model, instruction
//!   streams, and the assembler that vends locals, labels and tokens
//! - **Interop Layer**: kind classification, native-type mapping, value homes,
//!   the marshaller emission protocol, and stub orchestration
//!
//! Data flows signature → classifier → marshaller instances → orchestrator →
//! populated streams; an external back-end lowers the finished streams to
//! machine-level form and inserts the native call at the recorded position.
//!
//! ## Key Components
//!
//! - [`crate::StubGenerator`] - Main entry point for stub generation
//! - [`crate::MarshallingStub`] - The generated stub with its side tables
//! - [`crate::metadata`] - Descriptor parsing and the managed signature model
//! - [`crate::assembly`] - Abstract instruction emission
//! - [`crate::interop`] - Classification and the marshaller family
//! - [`crate::prelude`] - Convenient re-exports of commonly used types
//! - [`crate::Error`] and [`crate::Result`] - Comprehensive error handling
//!
//! # Usage Examples
//!
//! ## Quick Start
//!
//! Add `dotstub` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! dotstub = "0.3.0"
//! ```
//!
//! ### Generating a P/Invoke stub
//!
//! ```rust
//! use dotstub::prelude::*;
//!
//! // void Send(string message), CharSet.Ansi
//! let signature = SignatureMethod::pinvoke(
//!     SignatureParameter::returning(TypeSignature::Void),
//!     vec![SignatureParameter::new(TypeSignature::String)],
//! );
//!
//! let stub = StubGenerator::forward(&signature, MarshalPolicy::ansi()).generate()?;
//! for instruction in &stub.instructions {
//!     println!("{instruction}");
//! }
//! # Ok::<(), dotstub::Error>(())
//! ```
//!
//! ### Parsing a marshalling descriptor
//!
//! ```rust
//! use dotstub::metadata::{parse_marshalling_descriptor, NativeType, NATIVE_TYPE};
//!
//! let info = parse_marshalling_descriptor(&[NATIVE_TYPE::LPWSTR])?;
//! assert_eq!(
//!     info.primary_type,
//!     NativeType::LPWStr { size_param_index: None }
//! );
//! # Ok::<(), dotstub::Error>(())
//! ```
//!
//! ### Classifying a single parameter
//!
//! ```rust
//! use dotstub::interop::{classify, MarshallerKind, MarshallerRole};
//! use dotstub::metadata::{MarshalPolicy, TypeSignature};
//!
//! let (kind, element_kind) = classify(
//!     &TypeSignature::SzArray(Box::new(TypeSignature::I4)),
//!     None,
//!     &MarshalPolicy::auto(),
//!     MarshallerRole::Argument,
//!     false,
//! );
//! assert_eq!(kind, MarshallerKind::BlittableArray);
//! assert_eq!(element_kind, MarshallerKind::BlittableValue);
//! ```
//!
//! # Resource Discipline
//!
//! Generated stubs describe the runtime resource rules of the interop boundary
//! precisely: pins are function-scoped, unmanaged allocations have their
//! matching frees in a cleanup section that must stay reachable from
//! exceptional unwind, and `SafeHandle` reference counting brackets the native
//! call. The [`crate::MarshallingStub`] records the stream boundaries the
//! back-end needs to express that with its structured-unwind mechanism.
//!
//! # Standards Compliance
//!
//! Descriptor parsing implements the **ECMA-335 specification** (6th edition)
//! marshalling descriptor format, with the `CoreCLR` extensions used by
//! platform-invoke signatures.
//!
//! ### References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Official CLI specification
//! - [.NET Runtime](https://github.com/dotnet/runtime) - Microsoft's reference implementation
//!
//! # Error Handling
//!
//! All operations return [`Result<T, Error>`](Result); unmarshallable
//! signatures are rejected with a diagnostic before anything is emitted:
//!
//! ```rust
//! use dotstub::{Error, MarshalPolicy, StubGenerator};
//! use dotstub::metadata::{SignatureMethod, SignatureParameter, TypeSignature};
//!
//! let signature = SignatureMethod::pinvoke(
//!     SignatureParameter::returning(TypeSignature::Void),
//!     vec![SignatureParameter::new(TypeSignature::Object)],
//! );
//! match StubGenerator::forward(&signature, MarshalPolicy::auto()).generate() {
//!     Err(Error::UnsupportedSignature(reason)) => println!("rejected: {reason}"),
//!     other => panic!("expected rejection, got {other:?}"),
//! }
//! ```
//!
//! # Thread Safety
//!
//! Stub generation is single-threaded and purely local to one stub: the
//! generator owns all of its state and requires no synchronisation. Multiple
//! stubs may be generated in parallel at a higher layer, each with its own
//! generator.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the dotstub library, allowing for convenient glob imports.
///
/// # Usage Examples
///
/// ```rust
/// use dotstub::prelude::*;
///
/// let signature = SignatureMethod::pinvoke(
///     SignatureParameter::returning(TypeSignature::I4),
///     vec![],
/// );
/// let stub = StubGenerator::forward(&signature, MarshalPolicy::auto()).generate()?;
/// # Ok::<(), dotstub::Error>(())
/// ```
pub mod prelude;

/// Abstract CIL instruction emission for marshalling stubs.
///
/// The instruction model ([`assembly::Instruction`], [`assembly::Opcode`],
/// [`assembly::Operand`]), the append-only [`assembly::InstructionStream`],
/// and the [`assembly::StubAssembler`] vending locals, labels, and synthetic
/// type/helper tokens.
pub mod assembly;

/// Platform-invoke marshalling stub generation.
///
/// Kind classification ([`interop::classify`]), native-type mapping, the
/// [`interop::Home`] value-location abstraction, the five-stream bundle, the
/// marshaller emission protocol, and the [`interop::StubGenerator`]
/// orchestrator.
pub mod interop;

/// Metadata surface consumed by the stub generator.
///
/// Marshalling descriptors ([`metadata::NativeType`] with the binary parser),
/// the managed signature model ([`metadata::TypeSignature`],
/// [`metadata::SignatureMethod`]), parameter attributes, and the method-level
/// [`metadata::MarshalPolicy`].
pub mod metadata;

/// The result type used throughout dotstub.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;

pub use interop::{MarshallingStub, StubGenerator};
pub use metadata::MarshalPolicy;
