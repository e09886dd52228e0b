//! The host's dynamic value model, as consumed by the marker.
//!
//! Marking dispatches on the runtime kind of a value, so the boundary is a closed tagged
//! union rather than a trait object: the compiler checks that every kind is handled.
//! Values are shared through [`Rc`], which is where the ownership contract of the marker
//! becomes visible: container marking returns a clone of the same `Rc` (identity preserved,
//! strong count incremented), while string marking returns a freshly allocated value.

use std::rc::Rc;

use hashbrown::HashMap;

/// Width in bytes of one unicode code unit, as registered with the engine.
pub const WIDE_UNIT_WIDTH: usize = core::mem::size_of::<u32>();

/// A dynamically typed host value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// The absent value; cannot be marked concolic
    None,
    /// Fixed 4-byte signed integer
    Int(i32),
    /// Opaque byte string
    Bytes(Vec<u8>),
    /// Wide string of fixed-width code units
    Unicode(Vec<u32>),
    /// Ordered list; only its element count is tracked
    List(Vec<Rc<HostValue>>),
    /// Associative mapping; only its entry count is tracked
    Map(HashMap<String, Rc<HostValue>>),
    /// Fixed tuple; only its element count is tracked
    Tuple(Vec<Rc<HostValue>>),
}

impl HostValue {
    /// The name of this value's runtime kind, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::None => "none",
            HostValue::Int(_) => "int",
            HostValue::Bytes(_) => "bytes",
            HostValue::Unicode(_) => "unicode",
            HostValue::List(_) => "list",
            HostValue::Map(_) => "map",
            HostValue::Tuple(_) => "tuple",
        }
    }

    /// The element count of this value, if its kind has one.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            HostValue::None | HostValue::Int(_) => None,
            HostValue::Bytes(bytes) => Some(bytes.len()),
            HostValue::Unicode(units) => Some(units.len()),
            HostValue::List(items) | HostValue::Tuple(items) => Some(items.len()),
            HostValue::Map(entries) => Some(entries.len()),
        }
    }

    /// Whether this value has an element count of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use hashbrown::HashMap;

    use super::HostValue;

    #[test]
    fn lengths_exist_only_for_sized_kinds() {
        assert_eq!(HostValue::None.len(), None);
        assert_eq!(HostValue::Int(3).len(), None);
        assert_eq!(HostValue::Bytes(b"abc".to_vec()).len(), Some(3));
        assert_eq!(HostValue::Unicode(vec![104, 105]).len(), Some(2));
        assert_eq!(
            HostValue::List(vec![Rc::new(HostValue::Int(1))]).len(),
            Some(1)
        );
        assert_eq!(HostValue::Tuple(vec![]).len(), Some(0));
        assert_eq!(HostValue::Map(HashMap::new()).len(), Some(0));
    }
}
