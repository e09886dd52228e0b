//! # Variable Naming Protocol
//!
//! Symbolic execution engines accept a single flat string as the name of a free variable.
//! The harness, however, thinks in terms of a dotted path (`"req.body"`), a role (`"value"`
//! or `"size"`) and a semantic kind that tells the decoder how to turn raw solver bytes back
//! into a typed value. This module maps between the two representations.
//!
//! The canonical wire shape is `"<base>.<T>#<qualifier>"` where `T` is one of the single
//! ASCII codes of [`KindTag`]. The `base` may itself contain `.`-separated path segments, so
//! decoding always splits at the *last* `.`:
//!
//! * `"req.body.s#value"` → key `"req.body"`, qualifier `"value"`, tag [`KindTag::ByteString`]
//! * `"a.xyz"` (no `#` after the tag position) → key `"a"`, qualifier `"xyz"`, tag defaults
//!   to [`KindTag::ByteArray`]
//! * `"a"` (no `.` at all) → key `"a"`, empty qualifier, tag defaults to
//!   [`KindTag::ByteArray`]
//!
//! Identifiers longer than [`MAX_IDENTIFIER_LEN`] are rejected outright. Truncating instead
//! would let two long names silently collide in the engine's variable space and corrupt the
//! generated tests.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The engine's variable-name length limit, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// The qualifier under which a value's contents are registered.
pub const VALUE_QUALIFIER: &str = "value";

/// The qualifier under which a value's length field is registered.
pub const SIZE_QUALIFIER: &str = "size";

/// The semantic kind of a marked buffer.
///
/// The discriminant of each variant is the single ASCII code that appears in the encoded
/// identifier and tells [`crate::AssignmentValue`] how to reinterpret raw solver bytes.
#[derive(
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[repr(u8)]
pub enum KindTag {
    /// Fixed 4-byte signed integer
    Integer = b'i',
    /// Native pointer-width signed integer, used only for size fields
    PlatformSizeInteger = b'l',
    /// Opaque byte sequence
    ByteString = b's',
    /// Sequence of fixed-width code units, see [`crate::value::WIDE_UNIT_WIDTH`]
    UnicodeString = b'u',
    /// Opaque bytes, the default when an identifier carries no tag
    ByteArray = b'b',
}

impl KindTag {
    /// The ASCII code of this tag as it appears in encoded identifiers.
    #[must_use]
    pub fn code(self) -> char {
        char::from(u8::from(self))
    }
}

/// The decoded form of a flat identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableName {
    /// The dotted path the caller chose for this variable
    pub key: String,
    /// The role of the registered buffer within the variable, usually
    /// [`VALUE_QUALIFIER`] or [`SIZE_QUALIFIER`]
    pub qualifier: String,
    /// How raw bytes assigned to this variable are reinterpreted
    pub tag: KindTag,
}

/// Builds the flat identifier for the given path, qualifier and tag.
///
/// Fails with [`Error::IdentifierTooLong`] when the encoded form would exceed
/// [`MAX_IDENTIFIER_LEN`]. This happens before any engine interaction, so an over-long name
/// can never leave a partially registered variable behind.
pub fn encode(base: &str, qualifier: &str, tag: KindTag) -> Result<String, Error> {
    let identifier = format!("{base}.{}#{qualifier}", tag.code());
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::identifier_too_long(format!(
            "`{base}` encodes to {} bytes, limit is {MAX_IDENTIFIER_LEN}",
            identifier.len()
        )));
    }
    Ok(identifier)
}

/// Splits a flat identifier back into its [`VariableName`] parts.
///
/// A missing or malformed tag prefix falls back to [`KindTag::ByteArray`]. An empty
/// qualifier after a well-formed `T#` prefix or an unknown tag code means the producer and
/// consumer disagree about the protocol itself; both are [`Error::InvariantViolation`].
pub fn decode(identifier: &str) -> Result<VariableName, Error> {
    let Some((key, suffix)) = identifier.rsplit_once('.') else {
        return Ok(VariableName {
            key: identifier.to_string(),
            qualifier: String::new(),
            tag: KindTag::ByteArray,
        });
    };

    let bytes = suffix.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b'#' {
        let tag = KindTag::try_from(bytes[0]).map_err(|_| {
            Error::invariant_violation(format!(
                "unknown kind tag `{}` in identifier `{identifier}`",
                char::from(bytes[0])
            ))
        })?;
        let qualifier = &suffix[2..];
        if qualifier.is_empty() {
            return Err(Error::invariant_violation(format!(
                "empty qualifier in identifier `{identifier}`"
            )));
        }
        Ok(VariableName {
            key: key.to_string(),
            qualifier: qualifier.to_string(),
            tag,
        })
    } else {
        Ok(VariableName {
            key: key.to_string(),
            qualifier: suffix.to_string(),
            tag: KindTag::ByteArray,
        })
    }
}
