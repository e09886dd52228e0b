//! Marking host values as concolic.
//!
//! [`ConcolicMarker`] is the write side of the naming protocol: it dispatches on a value's
//! runtime kind, validates the declared bounds against the current concrete content, builds
//! the flat identifiers through [`crate::naming`] and only then talks to the engine.
//!
//! Two contracts matter to callers:
//! * **Ordering** — every fallible step (bounds validation, identifier encoding, buffer
//!   allocation) completes before the first engine call of a marking sequence. Once the
//!   sequence starts issuing engine calls it runs to completion, so a fork can never observe
//!   a buffer registered without its constraints.
//! * **Identity** — list, map and tuple marking return the *same* value (shared ownership,
//!   strong count incremented). Byte-string and unicode marking return a *new* value built
//!   around the registered buffer; the input keeps its pre-marking content, unaliased.

use std::rc::Rc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{
    engine::{EngineGateway, Predicate},
    naming::{self, KindTag, SIZE_QUALIFIER, VALUE_QUALIFIER},
    size_policy::SizeBounds,
    value::HostValue,
    Error,
};

/// Session-wide marking configuration.
///
/// Held by the session driving the marker and passed by reference; read-only after session
/// initialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Exclusive upper bound assumed for the element count of every marked map and tuple.
    pub max_symbolic_container_size: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_symbolic_container_size: 1024,
        }
    }
}

/// Marks host values as concolic through an [`EngineGateway`].
#[derive(Debug)]
pub struct ConcolicMarker<'a, E> {
    engine: &'a mut E,
    config: &'a SessionConfig,
}

impl<'a, E> ConcolicMarker<'a, E>
where
    E: EngineGateway,
{
    /// Creates a marker over the given engine and session configuration.
    pub fn new(engine: &'a mut E, config: &'a SessionConfig) -> Self {
        Self { engine, config }
    }

    fn ensure_active(&self) -> Result<(), Error> {
        if self.engine.is_active() {
            Ok(())
        } else {
            Err(Error::engine_inactive(
                "marking requires an active symbolic execution engine",
            ))
        }
    }

    /// Marks a fixed-width integer as concolic under `<name>.i#value`.
    ///
    /// The range `[min_value, max_value]` is enforced only when `min_value <= max_value`;
    /// an inverted range disables it entirely. A current value outside an enabled range
    /// fails with [`Error::Constraint`] before any engine interaction. The returned value
    /// carries the same integer; no identity is promised either way.
    pub fn mark_int(
        &mut self,
        target: &Rc<HostValue>,
        name: &str,
        min_value: i64,
        max_value: i64,
    ) -> Result<Rc<HostValue>, Error> {
        self.ensure_active()?;
        let HostValue::Int(value) = **target else {
            return Err(Error::unsupported_type(format!(
                "expected an int, got {}",
                target.kind_name()
            )));
        };
        let identifier = naming::encode(name, VALUE_QUALIFIER, KindTag::Integer)?;

        let range_enabled = min_value <= max_value;
        if range_enabled && (i64::from(value) < min_value || i64::from(value) > max_value) {
            return Err(Error::constraint(format!(
                "`{name}` is {value}, declared range is [{min_value}, {max_value}]"
            )));
        }

        debug!("marking int `{name}` as concolic");
        trace!("registering `{identifier}`");
        self.engine.mark_concolic(&value.to_ne_bytes(), &identifier);
        if range_enabled {
            self.engine.assume(Predicate::GreaterOrEqual {
                value: value.into(),
                bound: min_value,
            });
            self.engine.assume(Predicate::LessOrEqual {
                value: value.into(),
                bound: max_value,
            });
        }

        Ok(Rc::new(HostValue::Int(value)))
    }

    /// Marks a variable-length value as concolic, dispatching on its runtime kind.
    ///
    /// Byte strings and unicode strings are marked in full, lists by element count under
    /// the given `bounds`, maps and tuples by element count under the session-wide limit.
    /// [`HostValue::None`] and scalars are not markable here.
    pub fn mark_sequence(
        &mut self,
        target: &Rc<HostValue>,
        name: &str,
        bounds: SizeBounds,
    ) -> Result<Rc<HostValue>, Error> {
        self.ensure_active()?;
        if bounds.min < 0 {
            return Err(Error::constraint(format!(
                "minimum size of `{name}` cannot be negative"
            )));
        }

        match &**target {
            HostValue::None => Err(Error::unsupported_type("cannot mark none concolic")),
            HostValue::Bytes(_) => self.mark_byte_string(target, name, bounds),
            HostValue::Unicode(_) => self.mark_unicode(target, name, bounds),
            HostValue::List(_) => self.mark_list(target, name, bounds),
            HostValue::Map(_) => self.mark_map(target, name),
            HostValue::Tuple(_) => self.mark_tuple(target, name),
            HostValue::Int(_) => Err(Error::unsupported_type(
                "ints are fixed-width, use mark_int",
            )),
        }
    }

    /// Marks a byte string as concolic under `<name>.s#value`, and its length under
    /// `<name>.l#size` when `bounds` track it.
    ///
    /// Returns a new value distinct from `target`, built around the buffer the engine now
    /// owns symbolically. The input is left as a valid snapshot of its pre-marking state.
    pub fn mark_byte_string(
        &mut self,
        target: &Rc<HostValue>,
        name: &str,
        bounds: SizeBounds,
    ) -> Result<Rc<HostValue>, Error> {
        self.ensure_active()?;
        let HostValue::Bytes(data) = &**target else {
            return Err(Error::unsupported_type(format!(
                "expected bytes, got {}",
                target.kind_name()
            )));
        };
        let value_id = naming::encode(name, VALUE_QUALIFIER, KindTag::ByteString)?;
        let size_id = self.size_identifier(name, bounds)?;
        self.check_size(name, data.len(), bounds)?;

        let mut copy = Vec::new();
        copy.try_reserve_exact(data.len())
            .map_err(|_| Error::allocation(format!("private copy of `{name}`")))?;
        copy.extend_from_slice(data);

        debug!("marking byte string `{name}` ({} bytes) as concolic", data.len());
        trace!("registering `{value_id}`");
        self.engine.mark_concolic(&copy, &value_id);

        // The engine may later bind the registered buffer to different bytes; the new
        // value owns it, the input keeps its own copy.
        let result = Rc::new(HostValue::Bytes(copy));
        if let Some(size_id) = size_id {
            self.register_size(data.len() as i64, &size_id, bounds);
        }
        Ok(result)
    }

    /// Marks a unicode string as concolic under `<name>.u#value`, and its length (in code
    /// units) under `<name>.l#size` when `bounds` track it.
    ///
    /// The registered buffer holds the native-endian code units; `bounds` are measured in
    /// code units, not bytes. Returns a new value distinct from `target`.
    pub fn mark_unicode(
        &mut self,
        target: &Rc<HostValue>,
        name: &str,
        bounds: SizeBounds,
    ) -> Result<Rc<HostValue>, Error> {
        self.ensure_active()?;
        let HostValue::Unicode(units) = &**target else {
            return Err(Error::unsupported_type(format!(
                "expected unicode, got {}",
                target.kind_name()
            )));
        };
        let value_id = naming::encode(name, VALUE_QUALIFIER, KindTag::UnicodeString)?;
        let size_id = self.size_identifier(name, bounds)?;
        self.check_size(name, units.len(), bounds)?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(units.len() * crate::value::WIDE_UNIT_WIDTH)
            .map_err(|_| Error::allocation(format!("private copy of `{name}`")))?;
        for unit in units {
            buffer.extend_from_slice(&unit.to_ne_bytes());
        }

        debug!("marking unicode `{name}` ({} units) as concolic", units.len());
        trace!("registering `{value_id}`");
        self.engine.mark_concolic(&buffer, &value_id);

        let result = Rc::new(HostValue::Unicode(units.clone()));
        if let Some(size_id) = size_id {
            self.register_size(units.len() as i64, &size_id, bounds);
        }
        drop(buffer); // transient; the result owns an independent copy
        Ok(result)
    }

    /// Marks a list's element count as concolic under `<name>.l#size` when `bounds` track
    /// it. Element contents are not marked.
    ///
    /// Returns the same value (shared ownership incremented): callers may rely on the
    /// list's identity being stable across marking.
    pub fn mark_list(
        &mut self,
        target: &Rc<HostValue>,
        name: &str,
        bounds: SizeBounds,
    ) -> Result<Rc<HostValue>, Error> {
        self.ensure_active()?;
        let HostValue::List(items) = &**target else {
            return Err(Error::unsupported_type(format!(
                "expected a list, got {}",
                target.kind_name()
            )));
        };
        let size_id = self.size_identifier(name, bounds)?;
        self.check_size(name, items.len(), bounds)?;

        debug!("marking list `{name}` ({} elements) as concolic", items.len());
        if let Some(size_id) = size_id {
            self.register_size(items.len() as i64, &size_id, bounds);
        }
        Ok(Rc::clone(target))
    }

    /// Marks a map's entry count as concolic under `<name>.l#size`.
    ///
    /// The count is always constrained to `[0, max_symbolic_container_size)`, regardless
    /// of any caller-declared bounds. Returns the same value (shared ownership
    /// incremented).
    pub fn mark_map(&mut self, target: &Rc<HostValue>, name: &str) -> Result<Rc<HostValue>, Error> {
        self.ensure_active()?;
        let HostValue::Map(entries) = &**target else {
            return Err(Error::unsupported_type(format!(
                "expected a map, got {}",
                target.kind_name()
            )));
        };
        debug!("marking map `{name}` ({} entries) as concolic", entries.len());
        self.register_count(entries.len() as i64, name)?;
        Ok(Rc::clone(target))
    }

    /// Marks a tuple's element count as concolic under `<name>.l#size`.
    ///
    /// Same contract as [`ConcolicMarker::mark_map`].
    pub fn mark_tuple(
        &mut self,
        target: &Rc<HostValue>,
        name: &str,
    ) -> Result<Rc<HostValue>, Error> {
        self.ensure_active()?;
        let HostValue::Tuple(items) = &**target else {
            return Err(Error::unsupported_type(format!(
                "expected a tuple, got {}",
                target.kind_name()
            )));
        };
        debug!("marking tuple `{name}` ({} elements) as concolic", items.len());
        self.register_count(items.len() as i64, name)?;
        Ok(Rc::clone(target))
    }

    /// Encodes the size identifier up front, so that an over-long name fails before any
    /// engine call of the sequence.
    fn size_identifier(&self, name: &str, bounds: SizeBounds) -> Result<Option<String>, Error> {
        bounds
            .tracks_size()
            .then(|| naming::encode(name, SIZE_QUALIFIER, KindTag::PlatformSizeInteger))
            .transpose()
    }

    fn check_size(&self, name: &str, size: usize, bounds: SizeBounds) -> Result<(), Error> {
        if bounds.check(size as i64) {
            Ok(())
        } else {
            Err(Error::constraint(format!(
                "`{name}` has size {size}, bounds are [{}, {}]",
                bounds.min, bounds.max
            )))
        }
    }

    fn register_size(&mut self, size: i64, identifier: &str, bounds: SizeBounds) {
        trace!("registering `{identifier}`");
        self.engine
            .mark_concolic(&(size as isize).to_ne_bytes(), identifier);
        bounds.constrain(self.engine, size);
    }

    fn register_count(&mut self, count: i64, name: &str) -> Result<(), Error> {
        let identifier = naming::encode(name, SIZE_QUALIFIER, KindTag::PlatformSizeInteger)?;
        trace!("registering `{identifier}`");
        self.engine
            .mark_concolic(&(count as isize).to_ne_bytes(), &identifier);
        self.engine.assume(Predicate::GreaterOrEqual {
            value: count,
            bound: 0,
        });
        self.engine.assume(Predicate::LessThan {
            value: count,
            bound: self.config.max_symbolic_container_size,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use hashbrown::HashMap;

    use super::{ConcolicMarker, SessionConfig};
    use crate::{
        engine::{EngineCall, NopEngineGateway, Predicate, RecordingGateway},
        size_policy::SizeBounds,
        value::HostValue,
        Error,
    };

    fn marked<'a>(
        engine: &'a mut RecordingGateway,
        config: &'a SessionConfig,
    ) -> ConcolicMarker<'a, RecordingGateway> {
        ConcolicMarker::new(engine, config)
    }

    #[test]
    fn inactive_engine_fails_before_touching_the_value() {
        let mut engine = NopEngineGateway;
        let config = SessionConfig::default();
        let mut marker = ConcolicMarker::new(&mut engine, &config);
        let target = Rc::new(HostValue::Int(7));
        assert!(matches!(
            marker.mark_int(&target, "n", 0, 10),
            Err(Error::EngineInactive(..))
        ));
        assert!(matches!(
            marker.mark_sequence(&target, "n", SizeBounds::FIXED),
            Err(Error::EngineInactive(..))
        ));
    }

    #[test]
    fn int_in_range_is_registered_and_constrained_in_order() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Int(7));
        let result = marked(&mut engine, &config)
            .mark_int(&target, "n", 1, 10)
            .unwrap();
        assert_eq!(*result, HostValue::Int(7));
        assert_eq!(
            engine.calls,
            vec![
                EngineCall::MarkConcolic {
                    identifier: "n.i#value".to_string(),
                    bytes: 7_i32.to_ne_bytes().to_vec(),
                },
                EngineCall::Assume(Predicate::GreaterOrEqual { value: 7, bound: 1 }),
                EngineCall::Assume(Predicate::LessOrEqual { value: 7, bound: 10 }),
            ]
        );
    }

    #[test]
    fn int_outside_range_fails_without_engine_calls() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Int(42));
        assert!(matches!(
            marked(&mut engine, &config).mark_int(&target, "n", 1, 10),
            Err(Error::Constraint(..))
        ));
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn inverted_range_disables_the_range_entirely() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Int(42));
        marked(&mut engine, &config)
            .mark_int(&target, "n", 10, 1)
            .unwrap();
        assert_eq!(
            engine.calls,
            vec![EngineCall::MarkConcolic {
                identifier: "n.i#value".to_string(),
                bytes: 42_i32.to_ne_bytes().to_vec(),
            }]
        );
    }

    #[test]
    fn sequence_dispatch_rejects_none_and_scalars() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let mut marker = marked(&mut engine, &config);
        assert!(matches!(
            marker.mark_sequence(&Rc::new(HostValue::None), "n", SizeBounds::FIXED),
            Err(Error::UnsupportedType(..))
        ));
        assert!(matches!(
            marker.mark_sequence(&Rc::new(HostValue::Int(1)), "n", SizeBounds::FIXED),
            Err(Error::UnsupportedType(..))
        ));
    }

    #[test]
    fn sequence_rejects_negative_minimum() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Bytes(b"abc".to_vec()));
        assert!(matches!(
            marked(&mut engine, &config).mark_sequence(&target, "n", SizeBounds::new(-1, 10)),
            Err(Error::Constraint(..))
        ));
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn byte_string_marking_end_to_end() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Bytes(b"hello".to_vec()));
        let result = marked(&mut engine, &config)
            .mark_sequence(&target, "req.body", SizeBounds::new(1, 10))
            .unwrap();

        // a new value, not the input, but with the same concrete content
        assert!(!Rc::ptr_eq(&target, &result));
        assert_eq!(*result, HostValue::Bytes(b"hello".to_vec()));
        assert_eq!(*target, HostValue::Bytes(b"hello".to_vec()));

        assert_eq!(
            engine.calls,
            vec![
                EngineCall::MarkConcolic {
                    identifier: "req.body.s#value".to_string(),
                    bytes: b"hello".to_vec(),
                },
                EngineCall::MarkConcolic {
                    identifier: "req.body.l#size".to_string(),
                    bytes: 5_isize.to_ne_bytes().to_vec(),
                },
                EngineCall::Assume(Predicate::GreaterOrEqual { value: 5, bound: 1 }),
                EngineCall::Assume(Predicate::LessOrEqual { value: 5, bound: 10 }),
            ]
        );
    }

    #[test]
    fn byte_string_size_violation_fails_without_engine_calls() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Bytes(b"hello".to_vec()));
        assert!(matches!(
            marked(&mut engine, &config).mark_byte_string(&target, "n", SizeBounds::new(6, 10)),
            Err(Error::Constraint(..))
        ));
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn byte_string_without_size_tracking_registers_only_the_value() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Bytes(b"hi".to_vec()));
        marked(&mut engine, &config)
            .mark_byte_string(&target, "n", SizeBounds::FIXED)
            .unwrap();
        assert_eq!(
            engine.calls,
            vec![EngineCall::MarkConcolic {
                identifier: "n.s#value".to_string(),
                bytes: b"hi".to_vec(),
            }]
        );
    }

    #[test]
    fn unicode_marking_registers_native_endian_units() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Unicode(vec![0x68, 0x69]));
        let result = marked(&mut engine, &config)
            .mark_sequence(&target, "s", SizeBounds::new(0, 4))
            .unwrap();
        assert!(!Rc::ptr_eq(&target, &result));
        assert_eq!(*result, HostValue::Unicode(vec![0x68, 0x69]));

        let mut expected_buffer = Vec::new();
        expected_buffer.extend_from_slice(&0x68_u32.to_ne_bytes());
        expected_buffer.extend_from_slice(&0x69_u32.to_ne_bytes());
        assert_eq!(
            engine.calls,
            vec![
                EngineCall::MarkConcolic {
                    identifier: "s.u#value".to_string(),
                    bytes: expected_buffer,
                },
                EngineCall::MarkConcolic {
                    identifier: "s.l#size".to_string(),
                    bytes: 2_isize.to_ne_bytes().to_vec(),
                },
                EngineCall::Assume(Predicate::GreaterOrEqual { value: 2, bound: 0 }),
                EngineCall::Assume(Predicate::LessOrEqual { value: 2, bound: 4 }),
            ]
        );
    }

    #[test]
    fn list_marking_preserves_identity() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::List(vec![
            Rc::new(HostValue::Int(1)),
            Rc::new(HostValue::Int(2)),
        ]));
        let result = marked(&mut engine, &config)
            .mark_sequence(&target, "xs", SizeBounds::new(0, 8))
            .unwrap();
        assert!(Rc::ptr_eq(&target, &result));
        assert_eq!(
            engine.calls,
            vec![
                EngineCall::MarkConcolic {
                    identifier: "xs.l#size".to_string(),
                    bytes: 2_isize.to_ne_bytes().to_vec(),
                },
                EngineCall::Assume(Predicate::GreaterOrEqual { value: 2, bound: 0 }),
                EngineCall::Assume(Predicate::LessOrEqual { value: 2, bound: 8 }),
            ]
        );
    }

    #[test]
    fn fixed_size_list_marking_issues_no_engine_calls() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::List(vec![]));
        let result = marked(&mut engine, &config)
            .mark_list(&target, "xs", SizeBounds::FIXED)
            .unwrap();
        assert!(Rc::ptr_eq(&target, &result));
        assert!(engine.calls.is_empty());
    }

    #[test]
    fn map_count_is_constrained_by_the_session_limit() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig {
            max_symbolic_container_size: 64,
        };
        let mut entries = HashMap::new();
        entries.insert("k".to_string(), Rc::new(HostValue::Int(1)));
        let target = Rc::new(HostValue::Map(entries));
        let result = marked(&mut engine, &config)
            .mark_sequence(&target, "m", SizeBounds::FIXED)
            .unwrap();
        assert!(Rc::ptr_eq(&target, &result));
        assert_eq!(
            engine.calls,
            vec![
                EngineCall::MarkConcolic {
                    identifier: "m.l#size".to_string(),
                    bytes: 1_isize.to_ne_bytes().to_vec(),
                },
                EngineCall::Assume(Predicate::GreaterOrEqual { value: 1, bound: 0 }),
                EngineCall::Assume(Predicate::LessThan {
                    value: 1,
                    bound: 64
                }),
            ]
        );
    }

    #[test]
    fn tuple_count_is_constrained_regardless_of_bounds() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let target = Rc::new(HostValue::Tuple(vec![Rc::new(HostValue::Int(1))]));
        // caller-supplied bounds are ignored for tuples
        let result = marked(&mut engine, &config)
            .mark_sequence(&target, "t", SizeBounds::new(5, 5))
            .unwrap();
        assert!(Rc::ptr_eq(&target, &result));
        assert_eq!(
            engine.calls,
            vec![
                EngineCall::MarkConcolic {
                    identifier: "t.l#size".to_string(),
                    bytes: 1_isize.to_ne_bytes().to_vec(),
                },
                EngineCall::Assume(Predicate::GreaterOrEqual { value: 1, bound: 0 }),
                EngineCall::Assume(Predicate::LessThan {
                    value: 1,
                    bound: 1024
                }),
            ]
        );
    }

    #[test]
    fn over_long_name_fails_before_any_engine_call() {
        let mut engine = RecordingGateway::default();
        let config = SessionConfig::default();
        let name = "x".repeat(300);
        let target = Rc::new(HostValue::Bytes(b"hello".to_vec()));
        assert!(matches!(
            marked(&mut engine, &config).mark_byte_string(&target, &name, SizeBounds::new(1, 10)),
            Err(Error::IdentifierTooLong(..))
        ));
        assert!(engine.calls.is_empty());
    }
}
