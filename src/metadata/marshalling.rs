//! Marshalling descriptors for platform-invoke stub generation.
//!
//! This module provides constants, types, and parsing logic for the native-type
//! descriptors attached to interop parameters (`MarshalAs` in source form, ECMA-335
//! II.23.2.9 in binary form). A descriptor names the native representation a managed
//! value must be converted to at the interop boundary, together with the auxiliary
//! data some representations need: an array sub-type, a constant element count, or
//! the index of a parameter carrying the count at runtime.
//!
//! # Descriptor Structure
//!
//! A binary descriptor is a blob consisting of:
//! 1. **Primary Type**: the main native type tag (one byte, [`NATIVE_TYPE`])
//! 2. **Parameters**: compressed-uint fields depending on the tag
//! 3. **Additional Types**: secondary types for array element information
//! 4. **End Marker**: optional termination indicator
//!
//! The parsed [`NativeType`] is what the marshaller-kind classifier consumes; tags
//! outside the platform-invoke subset (COM automation, WinRT, custom marshalers) are
//! represented where they are needed to report a clean rejection, and fail parsing
//! otherwise.
//!
//! # Key Components
//!
//! - [`NATIVE_TYPE`] - Byte constants for the native type tags
//! - [`NativeType`] - Parsed native type variants with their parameters
//! - [`MarshallingInfo`] - Complete descriptor representation
//! - [`MarshallingParser`] - Parser for binary descriptor blobs
//! - [`parse_marshalling_descriptor`] - Convenience entry point
//!
//! # Examples
//!
//! ```rust
//! use dotstub::metadata::{parse_marshalling_descriptor, NativeType, NATIVE_TYPE};
//!
//! // LPWSTR with no size parameter
//! let info = parse_marshalling_descriptor(&[NATIVE_TYPE::LPWSTR])?;
//! assert_eq!(
//!     info.primary_type,
//!     NativeType::LPWStr { size_param_index: None }
//! );
//! # Ok::<(), dotstub::Error>(())
//! ```

use crate::{Error::OutOfBounds, Error::RecursionLimit, Result};

#[allow(non_snake_case)]
/// Native type constants as defined in ECMA-335 II.23.2.9 and `CoreCLR` extensions.
///
/// These byte constants appear as the first byte(s) of a marshalling descriptor
/// blob, optionally followed by parameter data depending on the tag. Only the
/// subset that can reach a platform-invoke signature is listed; the remaining
/// COM/WinRT tags are rejected during parsing.
pub mod NATIVE_TYPE {
    /// End marker (0x00) - Indicates the end of a marshalling descriptor
    pub const END: u8 = 0x00;
    /// Void type (0x01) - Represents no type or void return
    pub const VOID: u8 = 0x01;
    /// Boolean type (0x02) - 4-byte Windows BOOL
    pub const BOOLEAN: u8 = 0x02;
    /// Signed 8-bit integer (0x03)
    pub const I1: u8 = 0x03;
    /// Unsigned 8-bit integer (0x04)
    pub const U1: u8 = 0x04;
    /// Signed 16-bit integer (0x05)
    pub const I2: u8 = 0x05;
    /// Unsigned 16-bit integer (0x06)
    pub const U2: u8 = 0x06;
    /// Signed 32-bit integer (0x07)
    pub const I4: u8 = 0x07;
    /// Unsigned 32-bit integer (0x08)
    pub const U4: u8 = 0x08;
    /// Signed 64-bit integer (0x09)
    pub const I8: u8 = 0x09;
    /// Unsigned 64-bit integer (0x0a)
    pub const U8: u8 = 0x0a;
    /// 32-bit floating point (0x0b)
    pub const R4: u8 = 0x0b;
    /// 64-bit floating point (0x0c)
    pub const R8: u8 = 0x0c;
    /// System character type (0x0d) - Platform-dependent character
    pub const SYSCHAR: u8 = 0x0d;
    /// COM VARIANT type (0x0e) - OLE automation variant
    pub const VARIANT: u8 = 0x0e;
    /// Currency type (0x0f) - OLE automation currency
    pub const CURRENCY: u8 = 0x0f;
    /// Decimal type (0x11) - 128-bit scaled integer
    pub const DECIMAL: u8 = 0x11;
    /// Date type (0x12) - OLE automation date (8-byte floating point)
    pub const DATE: u8 = 0x12;
    /// BSTR type (0x13) - OLE automation string
    pub const BSTR: u8 = 0x13;
    /// LPSTR type (0x14) - Null-terminated ANSI string pointer
    pub const LPSTR: u8 = 0x14;
    /// LPWSTR type (0x15) - Null-terminated Unicode string pointer
    pub const LPWSTR: u8 = 0x15;
    /// LPTSTR type (0x16) - Null-terminated platform string pointer
    pub const LPTSTR: u8 = 0x16;
    /// `IUnknown` interface (0x19) - COM `IUnknown` interface pointer
    pub const IUNKNOWN: u8 = 0x19;
    /// `IDispatch` interface (0x1a) - COM `IDispatch` interface pointer
    pub const IDISPATCH: u8 = 0x1a;
    /// Struct type (0x1b) - Native structure with optional packing/size info
    pub const STRUCT: u8 = 0x1b;
    /// Fixed array (0x1e) - By-value array with compile-time element count
    pub const FIXEDARRAY: u8 = 0x1e;
    /// Platform integer (0x1f) - Pointer-width signed integer
    pub const INT: u8 = 0x1f;
    /// Platform unsigned integer (0x20) - Pointer-width unsigned integer
    pub const UINT: u8 = 0x20;
    /// ANSI BSTR (0x23) - ANSI version of BSTR
    pub const ANSIBSTR: u8 = 0x23;
    /// TBSTR type (0x24) - Platform-dependent BSTR
    pub const TBSTR: u8 = 0x24;
    /// Variant boolean (0x25) - COM `VARIANT_BOOL` (2-byte boolean)
    pub const VARIANTBOOL: u8 = 0x25;
    /// Function pointer (0x26) - Native function pointer
    pub const FUNC: u8 = 0x26;
    /// `AsAny` type (0x28) - Marshal as any compatible type
    pub const ASANY: u8 = 0x28;
    /// Array type (0x2a) - Variable array with element type and optional parameters
    pub const ARRAY: u8 = 0x2a;
    /// Pointer to struct (0x2b) - Pointer to a native structure
    pub const LPSTRUCT: u8 = 0x2b;
    /// UTF-8 string pointer (0x30) - Null-terminated UTF-8 string pointer
    pub const LPUTF8STR: u8 = 0x30;
    /// Maximum valid native type (0x50) - Upper bound for validation
    pub const MAX: u8 = 0x50;
}

/// Represents a complete marshalling descriptor.
///
/// A descriptor contains all the information needed to choose a marshalling
/// strategy for one parameter, field, or return value: a primary type plus
/// optional additional types for complex scenarios (array element sub-types).
#[derive(Debug, PartialEq, Clone)]
pub struct MarshallingInfo {
    /// The primary native type for this marshalling descriptor
    pub primary_type: NativeType,
    /// Additional type information for complex marshalling scenarios
    pub additional_types: Vec<NativeType>,
}

/// Parses a marshalling descriptor from bytes.
///
/// Convenience function that creates a [`MarshallingParser`] and parses a complete
/// descriptor from the provided blob: primary type, parameters, additional types,
/// and the optional end marker.
///
/// # Arguments
///
/// * `data` - The descriptor blob, in ECMA-335 II.23.2.9 format
///
/// # Errors
///
/// - [`crate::Error::Empty`] for an empty blob
/// - [`crate::Error::OutOfBounds`] for truncated parameter data
/// - [`crate::Error::Malformed`] for unknown or out-of-subset type tags
/// - [`crate::Error::RecursionLimit`] for pathologically nested array types
///
/// # Examples
///
/// ```rust
/// use dotstub::metadata::{parse_marshalling_descriptor, NativeType, NATIVE_TYPE};
///
/// // Array of I4, element count in parameter 3
/// let info = parse_marshalling_descriptor(&[NATIVE_TYPE::ARRAY, NATIVE_TYPE::I4, 0x03])?;
/// match info.primary_type {
///     NativeType::Array { num_param: Some(3), .. } => {}
///     _ => unreachable!(),
/// }
/// # Ok::<(), dotstub::Error>(())
/// ```
pub fn parse_marshalling_descriptor(data: &[u8]) -> Result<MarshallingInfo> {
    if data.is_empty() {
        return Err(crate::Error::Empty);
    }

    let mut parser = MarshallingParser::new(data);
    parser.parse_descriptor()
}

/// A native type a managed value can be marshalled to.
///
/// Each variant represents one descriptor tag together with the parameters the
/// binary format attaches to it. The variants carrying `size_param_index` map to
/// the `SizeParamIndex` field of a source-level `MarshalAs` attribute; the
/// [`NativeType::Array`] variant carries both `SizeParamIndex` (`num_param`) and
/// `SizeConst` (`num_element`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum NativeType {
    /// Void type - no value or void return
    Void,
    /// Boolean type - 4-byte Windows BOOL (0 = false, non-zero = true)
    Boolean,
    /// Signed 8-bit integer
    I1,
    /// Unsigned 8-bit integer
    U1,
    /// Signed 16-bit integer
    I2,
    /// Unsigned 16-bit integer
    U2,
    /// Signed 32-bit integer
    I4,
    /// Unsigned 32-bit integer
    U4,
    /// Signed 64-bit integer
    I8,
    /// Unsigned 64-bit integer
    U8,
    /// 32-bit floating point
    R4,
    /// 64-bit floating point
    R8,
    /// System character type - platform-dependent character encoding
    SysChar,
    /// COM VARIANT type - OLE automation variant for dynamic typing
    Variant,
    /// Currency type - OLE automation currency (64-bit scaled integer)
    Currency,
    /// Decimal type - 128-bit scaled integer
    Decimal,
    /// Date type - OLE automation date (64-bit floating point)
    Date,
    /// Platform integer - pointer-width signed integer
    Int,
    /// Platform unsigned integer - pointer-width unsigned integer
    UInt,
    /// BSTR - OLE automation string (length-prefixed Unicode string)
    BStr,
    /// LPSTR - Null-terminated ANSI string pointer with optional size parameter
    LPStr {
        /// Optional parameter index for string length
        size_param_index: Option<u32>,
    },
    /// LPWSTR - Null-terminated Unicode string pointer with optional size parameter
    LPWStr {
        /// Optional parameter index for string length
        size_param_index: Option<u32>,
    },
    /// LPTSTR - Platform-dependent string pointer
    LPTStr {
        /// Optional parameter index for string length
        size_param_index: Option<u32>,
    },
    /// LPUTF8STR - Null-terminated UTF-8 string pointer with optional size parameter
    LPUtf8Str {
        /// Optional parameter index for string length
        size_param_index: Option<u32>,
    },
    /// ANSI BSTR - ANSI version of BSTR for legacy compatibility
    AnsiBStr,
    /// TBSTR - Platform-dependent BSTR
    TBStr,
    /// Variant boolean - COM `VARIANT_BOOL` (16-bit boolean)
    VariantBool,
    /// `IUnknown` interface - base COM interface pointer
    IUnknown,
    /// `IDispatch` interface - COM automation interface pointer
    IDispatch,
    /// Native structure - C-style struct with layout information
    Struct {
        /// Optional structure packing size in bytes
        packing_size: Option<u8>,
        /// Optional total structure size in bytes
        class_size: Option<u32>,
    },
    /// Pointer to structure - the struct is passed as a pointer to its layout
    LPStruct,
    /// Function pointer - pointer to native function
    Func,
    /// As any - marshal as any compatible native type
    AsAny,
    /// By-value array - fixed-size array embedded at the marshalling site
    FixedArray {
        /// Number of elements in the fixed array
        size: u32,
        /// Optional element type specification
        element_type: Option<Box<NativeType>>,
    },
    /// Variable array - runtime-sized array with parameter-based sizing
    Array {
        /// Type of array elements
        element_type: Box<NativeType>,
        /// Optional parameter index for the array size (`SizeParamIndex`)
        num_param: Option<u32>,
        /// Optional fixed number of elements (`SizeConst`)
        num_element: Option<u32>,
    },
    /// End marker - indicates the end of a marshalling descriptor
    End,
}

impl NativeType {
    /// Returns true if this tag names an integer of the given byte width,
    /// either signedness.
    #[must_use]
    pub fn is_integer_of_width(&self, width: u8) -> bool {
        matches!(
            (self, width),
            (NativeType::I1 | NativeType::U1, 1)
                | (NativeType::I2 | NativeType::U2, 2)
                | (NativeType::I4 | NativeType::U4, 4)
                | (NativeType::I8 | NativeType::U8, 8)
        )
    }

    /// Returns the array element sub-type carried by this descriptor, if any.
    ///
    /// `End` sub-types count as absent; the element type then defaults from the
    /// managed element type during classification.
    #[must_use]
    pub fn array_sub_type(&self) -> Option<&NativeType> {
        let element = match self {
            NativeType::Array { element_type, .. } => element_type.as_ref(),
            NativeType::FixedArray {
                element_type: Some(element),
                ..
            } => element.as_ref(),
            _ => return None,
        };

        match element {
            NativeType::End => None,
            other => Some(other),
        }
    }
}

/// Maximum recursion depth for parsing marshalling descriptors.
///
/// Limits the depth of nested array type parsing so a corrupted blob cannot
/// overflow the stack. Real descriptors rarely nest beyond two levels.
const MAX_RECURSION_DEPTH: usize = 50;

/// Parser for marshalling descriptor blobs.
///
/// Stateful parser over one descriptor blob, tracking position and recursion
/// depth. The reader primitives implement the compressed-uint encoding of
/// ECMA-335 II.23.2 directly, since descriptors are the only blobs this crate
/// reads.
///
/// # Usage
///
/// ```rust
/// use dotstub::metadata::{MarshallingParser, NativeType, NATIVE_TYPE};
///
/// let mut parser = MarshallingParser::new(&[NATIVE_TYPE::I4]);
/// assert_eq!(parser.parse_native_type()?, NativeType::I4);
/// # Ok::<(), dotstub::Error>(())
/// ```
pub struct MarshallingParser<'a> {
    /// The descriptor blob being parsed
    data: &'a [u8],
    /// Current read position within the blob
    position: usize,
    /// Current recursion depth for stack overflow prevention
    depth: usize,
}

impl<'a> MarshallingParser<'a> {
    /// Creates a new parser positioned at the start of the given blob.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        MarshallingParser {
            data,
            position: 0,
            depth: 0,
        }
    }

    /// True while unread bytes remain.
    fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Returns the next byte without consuming it.
    fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(OutOfBounds);
        }
        Ok(self.data[self.position])
    }

    /// Reads one byte.
    fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek_byte()?;
        self.position += 1;
        Ok(byte)
    }

    /// Reads an ECMA-335 II.23.2 compressed unsigned integer (1, 2 or 4 bytes).
    fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_u8()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_u8()?;
            return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_u8()?);
            let b2 = u32::from(self.read_u8()?);
            let b3 = u32::from(self.read_u8()?);
            return Ok(((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Reads an optional trailing compressed uint (absent at end of blob or
    /// before an end marker).
    fn read_optional_uint(&mut self) -> Result<Option<u32>> {
        if self.has_more_data() && self.peek_byte()? != NATIVE_TYPE::END {
            Ok(Some(self.read_compressed_uint()?))
        } else {
            Ok(None)
        }
    }

    /// Parses a single native type from the current position.
    ///
    /// # Errors
    /// Returns an error if the native type cannot be parsed or the recursion
    /// limit is exceeded.
    pub fn parse_native_type(&mut self) -> Result<NativeType> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let head_byte = self.read_u8()?;
        let parsed = match head_byte {
            NATIVE_TYPE::END | NATIVE_TYPE::MAX => NativeType::End,
            NATIVE_TYPE::VOID => NativeType::Void,
            NATIVE_TYPE::BOOLEAN => NativeType::Boolean,
            NATIVE_TYPE::I1 => NativeType::I1,
            NATIVE_TYPE::U1 => NativeType::U1,
            NATIVE_TYPE::I2 => NativeType::I2,
            NATIVE_TYPE::U2 => NativeType::U2,
            NATIVE_TYPE::I4 => NativeType::I4,
            NATIVE_TYPE::U4 => NativeType::U4,
            NATIVE_TYPE::I8 => NativeType::I8,
            NATIVE_TYPE::U8 => NativeType::U8,
            NATIVE_TYPE::R4 => NativeType::R4,
            NATIVE_TYPE::R8 => NativeType::R8,
            NATIVE_TYPE::SYSCHAR => NativeType::SysChar,
            NATIVE_TYPE::VARIANT => NativeType::Variant,
            NATIVE_TYPE::CURRENCY => NativeType::Currency,
            NATIVE_TYPE::DECIMAL => NativeType::Decimal,
            NATIVE_TYPE::DATE => NativeType::Date,
            NATIVE_TYPE::INT => NativeType::Int,
            NATIVE_TYPE::UINT => NativeType::UInt,
            NATIVE_TYPE::BSTR => NativeType::BStr,
            NATIVE_TYPE::ANSIBSTR => NativeType::AnsiBStr,
            NATIVE_TYPE::TBSTR => NativeType::TBStr,
            NATIVE_TYPE::VARIANTBOOL => NativeType::VariantBool,
            NATIVE_TYPE::IUNKNOWN => NativeType::IUnknown,
            NATIVE_TYPE::IDISPATCH => NativeType::IDispatch,
            NATIVE_TYPE::FUNC => NativeType::Func,
            NATIVE_TYPE::ASANY => NativeType::AsAny,
            NATIVE_TYPE::LPSTRUCT => NativeType::LPStruct,
            NATIVE_TYPE::LPSTR => NativeType::LPStr {
                size_param_index: self.read_optional_uint()?,
            },
            NATIVE_TYPE::LPWSTR => NativeType::LPWStr {
                size_param_index: self.read_optional_uint()?,
            },
            NATIVE_TYPE::LPTSTR => NativeType::LPTStr {
                size_param_index: self.read_optional_uint()?,
            },
            NATIVE_TYPE::LPUTF8STR => NativeType::LPUtf8Str {
                size_param_index: self.read_optional_uint()?,
            },
            NATIVE_TYPE::STRUCT => {
                // Optional packing size, then optional class size
                let packing_size =
                    if self.has_more_data() && self.peek_byte()? != NATIVE_TYPE::END {
                        Some(self.read_u8()?)
                    } else {
                        None
                    };
                let class_size = self.read_optional_uint()?;
                NativeType::Struct {
                    packing_size,
                    class_size,
                }
            }
            NATIVE_TYPE::FIXEDARRAY => {
                let size = self.read_compressed_uint()?;
                let element_type =
                    if self.has_more_data() && self.peek_byte()? != NATIVE_TYPE::END {
                        Some(Box::new(self.parse_native_type()?))
                    } else {
                        None
                    };
                NativeType::FixedArray { size, element_type }
            }
            NATIVE_TYPE::ARRAY => {
                // ARRAY Type Opt<ParamNumber> Opt<NumElement>
                let array_type = self.parse_native_type()?;
                let num_param = self.read_optional_uint()?;
                let num_element = self.read_optional_uint()?;
                NativeType::Array {
                    element_type: Box::new(array_type),
                    num_param,
                    num_element,
                }
            }
            _ => {
                return Err(malformed_error!(
                    "Invalid NATIVE_TYPE byte - {}",
                    head_byte
                ))
            }
        };

        self.depth -= 1;
        Ok(parsed)
    }

    /// Parses a complete marshalling descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor is malformed or cannot be parsed.
    pub fn parse_descriptor(&mut self) -> Result<MarshallingInfo> {
        let native_type = self.parse_native_type()?;

        let mut descriptor = MarshallingInfo {
            primary_type: native_type,
            additional_types: Vec::new(),
        };

        // Parse additional types if present
        while self.has_more_data() {
            if self.peek_byte()? == NATIVE_TYPE::END {
                self.read_u8()?; // Consume the end marker
                break;
            }

            let additional_type = self.parse_native_type()?;
            descriptor.additional_types.push(additional_type);
        }

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_parse_simple_types() {
        let test_cases = vec![
            (vec![NATIVE_TYPE::VOID], NativeType::Void),
            (vec![NATIVE_TYPE::BOOLEAN], NativeType::Boolean),
            (vec![NATIVE_TYPE::I1], NativeType::I1),
            (vec![NATIVE_TYPE::U1], NativeType::U1),
            (vec![NATIVE_TYPE::I2], NativeType::I2),
            (vec![NATIVE_TYPE::U2], NativeType::U2),
            (vec![NATIVE_TYPE::I4], NativeType::I4),
            (vec![NATIVE_TYPE::U4], NativeType::U4),
            (vec![NATIVE_TYPE::I8], NativeType::I8),
            (vec![NATIVE_TYPE::U8], NativeType::U8),
            (vec![NATIVE_TYPE::R4], NativeType::R4),
            (vec![NATIVE_TYPE::R8], NativeType::R8),
            (vec![NATIVE_TYPE::INT], NativeType::Int),
            (vec![NATIVE_TYPE::UINT], NativeType::UInt),
            (vec![NATIVE_TYPE::FUNC], NativeType::Func),
            (vec![NATIVE_TYPE::LPSTRUCT], NativeType::LPStruct),
            (vec![NATIVE_TYPE::VARIANTBOOL], NativeType::VariantBool),
        ];

        for (input, expected) in test_cases {
            let mut parser = MarshallingParser::new(&input);
            let result = parser.parse_native_type().unwrap();
            assert_eq!(result, expected);
        }
    }

    #[test]
    fn test_parse_lpstr() {
        // LPSTR with size parameter
        let input = vec![NATIVE_TYPE::LPSTR, 0x05];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::LPStr {
                size_param_index: Some(5)
            }
        );

        // LPSTR without size parameter
        let input = vec![NATIVE_TYPE::LPSTR, NATIVE_TYPE::END];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::LPStr {
                size_param_index: None
            }
        );
    }

    #[test]
    fn test_parse_array() {
        // Array with Type, Opt<num_param>, Opt<num_element>
        let input = vec![NATIVE_TYPE::ARRAY, NATIVE_TYPE::I4, 0x03, 0x01];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::Array {
                element_type: Box::new(NativeType::I4),
                num_param: Some(3),
                num_element: Some(1),
            }
        );

        // Array with Type, Opt<num_param>, NONE
        let input = vec![NATIVE_TYPE::ARRAY, NATIVE_TYPE::I4, 0x03];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::Array {
                element_type: Box::new(NativeType::I4),
                num_param: Some(3),
                num_element: None,
            }
        );

        // Array with Type, None, None
        let input = vec![NATIVE_TYPE::ARRAY, NATIVE_TYPE::I4];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::Array {
                element_type: Box::new(NativeType::I4),
                num_param: None,
                num_element: None,
            }
        );
    }

    #[test]
    fn test_parse_fixed_array() {
        // Fixed array with size and element type
        let input = vec![NATIVE_TYPE::FIXEDARRAY, 0x0A, NATIVE_TYPE::I4];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::FixedArray {
                size: 10,
                element_type: Some(Box::new(NativeType::I4))
            }
        );

        // Fixed array with size but no element type
        let input = vec![NATIVE_TYPE::FIXEDARRAY, 0x0A, NATIVE_TYPE::END];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::FixedArray {
                size: 10,
                element_type: None
            }
        );
    }

    #[test]
    fn test_parse_struct() {
        let input = vec![NATIVE_TYPE::STRUCT, 0x04, 0x20, NATIVE_TYPE::END];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::Struct {
                packing_size: Some(4),
                class_size: Some(32)
            }
        );

        let input = vec![NATIVE_TYPE::STRUCT, NATIVE_TYPE::END];
        let mut parser = MarshallingParser::new(&input);
        assert_eq!(
            parser.parse_native_type().unwrap(),
            NativeType::Struct {
                packing_size: None,
                class_size: None
            }
        );
    }

    #[test]
    fn test_parse_complete_descriptor() {
        // Simple descriptor with just one type
        let input = vec![NATIVE_TYPE::I4, NATIVE_TYPE::END];
        let descriptor = parse_marshalling_descriptor(&input).unwrap();
        assert_eq!(descriptor.primary_type, NativeType::I4);
        assert_eq!(descriptor.additional_types.len(), 0);

        // Descriptor with primary type and additional types
        let input = vec![
            NATIVE_TYPE::LPSTR,
            0x01, // LPSTR with size param 1
            NATIVE_TYPE::BOOLEAN,
            NATIVE_TYPE::END,
        ];
        let descriptor = parse_marshalling_descriptor(&input).unwrap();
        assert_eq!(
            descriptor.primary_type,
            NativeType::LPStr {
                size_param_index: Some(1)
            }
        );
        assert_eq!(descriptor.additional_types, vec![NativeType::Boolean]);
    }

    #[test]
    fn test_error_conditions() {
        // Empty input
        let result = parse_marshalling_descriptor(&[]);
        assert!(matches!(result.unwrap_err(), Error::Empty));

        // Unknown native type
        let result = parse_marshalling_descriptor(&[0xFF]);
        assert!(result.is_err());

        // 4-byte compressed integer with only one byte available
        let result = parse_marshalling_descriptor(&[NATIVE_TYPE::LPSTR, 0xC0]);
        assert!(matches!(result.unwrap_err(), Error::OutOfBounds));
    }

    #[test]
    fn test_integer_width_check() {
        assert!(NativeType::I1.is_integer_of_width(1));
        assert!(NativeType::U1.is_integer_of_width(1));
        assert!(NativeType::U4.is_integer_of_width(4));
        assert!(!NativeType::I4.is_integer_of_width(8));
        assert!(!NativeType::Boolean.is_integer_of_width(4));
    }

    #[test]
    fn test_array_sub_type() {
        let array = NativeType::Array {
            element_type: Box::new(NativeType::U2),
            num_param: None,
            num_element: None,
        };
        assert_eq!(array.array_sub_type(), Some(&NativeType::U2));

        let fixed = NativeType::FixedArray {
            size: 4,
            element_type: None,
        };
        assert_eq!(fixed.array_sub_type(), None);
        assert_eq!(NativeType::I4.array_sub_type(), None);
    }
}
