//! Decoding engine-produced assignments back into typed, nested structures.
//!
//! After exploring a path, the engine hands back a flat mapping from variable identifiers
//! (as produced by [`crate::naming::encode`]) to raw byte buffers — a counterexample or
//! witness. [`AssignmentTree::insert_raw`] is called once per entry; the tree accumulates
//! across the whole pass and ends up keyed by the original dotted path names, with one
//! qualifier→value sub-mapping per variable.

use core::mem::size_of;

use hashbrown::HashMap;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::{
    naming::{self, KindTag},
    value::WIDE_UNIT_WIDTH,
    Error,
};

pub mod serialization_format;

pub use serialization_format::{AssignmentEntry, AssignmentFileReader, AssignmentFileWriter};

/// A typed value reconstructed from the raw bytes of one assignment entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentValue {
    /// Decoded from a [`KindTag::Integer`] entry
    Integer(i32),
    /// Decoded from a [`KindTag::PlatformSizeInteger`] entry
    Size(isize),
    /// Decoded from a [`KindTag::ByteString`] entry
    ByteString(Vec<u8>),
    /// Decoded from a [`KindTag::UnicodeString`] entry
    UnicodeString(Vec<u32>),
    /// Decoded from a [`KindTag::ByteArray`] entry, bytes passed through unchanged
    ByteArray(Vec<u8>),
}

impl AssignmentValue {
    /// Reinterprets `raw` according to `tag`.
    ///
    /// Fixed-width tags with a mismatched byte count are an [`Error::InvariantViolation`]:
    /// the engine assigned a buffer of the wrong shape to a variable this crate named, so
    /// the producer/consumer protocol is broken.
    pub fn from_raw(tag: KindTag, raw: &[u8]) -> Result<Self, Error> {
        match tag {
            KindTag::Integer => {
                let bytes: [u8; size_of::<i32>()] = raw.try_into().map_err(|_| {
                    Error::invariant_violation(format!(
                        "integer assignment must be {} bytes, got {}",
                        size_of::<i32>(),
                        raw.len()
                    ))
                })?;
                Ok(Self::Integer(i32::from_ne_bytes(bytes)))
            }
            KindTag::PlatformSizeInteger => {
                let bytes: [u8; size_of::<isize>()] = raw.try_into().map_err(|_| {
                    Error::invariant_violation(format!(
                        "size assignment must be {} bytes, got {}",
                        size_of::<isize>(),
                        raw.len()
                    ))
                })?;
                Ok(Self::Size(isize::from_ne_bytes(bytes)))
            }
            KindTag::ByteString => Ok(Self::ByteString(raw.to_vec())),
            KindTag::UnicodeString => {
                if raw.len() % WIDE_UNIT_WIDTH != 0 {
                    return Err(Error::invariant_violation(format!(
                        "unicode assignment of {} bytes is not a whole number of {WIDE_UNIT_WIDTH}-byte units",
                        raw.len()
                    )));
                }
                let units = raw
                    .chunks_exact(WIDE_UNIT_WIDTH)
                    .map(|chunk| u32::from_ne_bytes(chunk.try_into().unwrap()))
                    .collect();
                Ok(Self::UnicodeString(units))
            }
            KindTag::ByteArray => Ok(Self::ByteArray(raw.to_vec())),
        }
    }
}

/// A nested, typed view of one engine-produced assignment.
///
/// Maps each dotted path key to the qualifier→value mapping of its variable. Insertion
/// order is irrelevant; inserting the same `(key, qualifier)` twice keeps the most recent
/// value. A tree is built by a single writer per decoding pass.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct AssignmentTree {
    entries: HashMap<String, HashMap<String, AssignmentValue>>,
}

impl AssignmentTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one `identifier → raw bytes` entry into the tree.
    ///
    /// The identifier is split by [`naming::decode`]; the raw bytes are typed according to
    /// the decoded [`KindTag`]. A prior value for the same `(key, qualifier)` pair is
    /// overwritten.
    pub fn insert_raw(&mut self, identifier: &str, raw: &[u8]) -> Result<(), Error> {
        let name = naming::decode(identifier)?;
        let value = AssignmentValue::from_raw(name.tag, raw)?;
        trace!(
            "decoded `{identifier}` into `{}` / `{}`",
            name.key,
            name.qualifier
        );
        self.entries
            .entry(name.key)
            .or_default()
            .insert(name.qualifier, value);
        Ok(())
    }

    /// Drains an [`AssignmentFileReader`] into this tree, returning the number of decoded
    /// entries.
    pub fn decode_all(&mut self, reader: &mut AssignmentFileReader) -> Result<usize, Error> {
        let mut decoded = 0;
        while let Some(entry) = reader.next_entry() {
            let entry = entry?;
            self.insert_raw(&entry.identifier, &entry.bytes)?;
            decoded += 1;
        }
        Ok(decoded)
    }

    /// The value assigned to `qualifier` under the path `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str, qualifier: &str) -> Option<&AssignmentValue> {
        self.entries.get(key)?.get(qualifier)
    }

    /// The qualifier→value mapping of the variable at `key`, if any.
    #[must_use]
    pub fn variable(&self, key: &str) -> Option<&HashMap<String, AssignmentValue>> {
        self.entries.get(key)
    }

    /// Iterates over the path keys present in this tree.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The number of distinct path keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree holds no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use core::mem::size_of;

    use super::{AssignmentTree, AssignmentValue};
    use crate::{naming::KindTag, Error};

    #[test]
    fn entries_with_the_same_key_merge_into_one_variable() {
        let mut tree = AssignmentTree::new();
        tree.insert_raw("a.i#x", &7_i32.to_ne_bytes()).unwrap();
        tree.insert_raw("a.i#y", &9_i32.to_ne_bytes()).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get("a", "x"), Some(&AssignmentValue::Integer(7)));
        assert_eq!(tree.get("a", "y"), Some(&AssignmentValue::Integer(9)));
    }

    #[test]
    fn last_write_wins_for_the_same_qualifier() {
        let mut tree = AssignmentTree::new();
        tree.insert_raw("a.i#x", &7_i32.to_ne_bytes()).unwrap();
        tree.insert_raw("a.i#x", &11_i32.to_ne_bytes()).unwrap();
        assert_eq!(tree.get("a", "x"), Some(&AssignmentValue::Integer(11)));
        assert_eq!(tree.variable("a").unwrap().len(), 1);
    }

    #[test]
    fn value_and_size_fields_land_under_the_same_key() {
        let mut tree = AssignmentTree::new();
        tree.insert_raw("req.body.s#value", b"hello").unwrap();
        tree.insert_raw("req.body.l#size", &5_isize.to_ne_bytes())
            .unwrap();
        assert_eq!(
            tree.get("req.body", "value"),
            Some(&AssignmentValue::ByteString(b"hello".to_vec()))
        );
        assert_eq!(tree.get("req.body", "size"), Some(&AssignmentValue::Size(5)));
    }

    #[test]
    fn untagged_identifiers_decode_as_byte_arrays() {
        let mut tree = AssignmentTree::new();
        tree.insert_raw("a.xyz", &[1, 2, 3]).unwrap();
        assert_eq!(
            tree.get("a", "xyz"),
            Some(&AssignmentValue::ByteArray(vec![1, 2, 3]))
        );
    }

    #[test]
    fn unicode_bytes_are_regrouped_into_units() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&0x68_u32.to_ne_bytes());
        raw.extend_from_slice(&0x69_u32.to_ne_bytes());
        assert_eq!(
            AssignmentValue::from_raw(KindTag::UnicodeString, &raw).unwrap(),
            AssignmentValue::UnicodeString(vec![0x68, 0x69])
        );
    }

    #[test]
    fn mismatched_widths_are_invariant_violations() {
        assert!(matches!(
            AssignmentValue::from_raw(KindTag::Integer, &[1, 2, 3]),
            Err(Error::InvariantViolation(..))
        ));
        assert!(matches!(
            AssignmentValue::from_raw(KindTag::PlatformSizeInteger, &[0; size_of::<isize>() + 1]),
            Err(Error::InvariantViolation(..))
        ));
        assert!(matches!(
            AssignmentValue::from_raw(KindTag::UnicodeString, &[1, 2, 3]),
            Err(Error::InvariantViolation(..))
        ));
    }

    #[test]
    fn malformed_identifiers_propagate_from_the_name_codec() {
        let mut tree = AssignmentTree::new();
        assert!(matches!(
            tree.insert_raw("a.i#", &7_i32.to_ne_bytes()),
            Err(Error::InvariantViolation(..))
        ));
        assert!(tree.is_empty());
    }
}
