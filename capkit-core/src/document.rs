//! Store document shaping.
//!
//! The store only accepts keyed documents (JSON objects). Module values whose
//! JSON form is an object are stored as-is; anything else (a persona list,
//! for instance) is stored under a single `data` field:
//!
//! ```text
//! canvas    {"Problem": "...", "Solution": "..."}
//! personas  {"data": [{"id": "p1", "name": "Ana"}]}
//! ```
//!
//! Writes are merge-writes: [`merge_write`] folds a patch into the stored
//! document recursively, the same way both bundled stores apply `set_merge`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;

/// A keyed store document.
pub type Document = Map<String, Value>;

/// Field holding non-object module values.
pub const DATA_FIELD: &str = "data";

/// How a module value is laid out inside its store document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// The value is itself an object and is the document.
    Keyed,
    /// The value lives under [`DATA_FIELD`].
    Wrapped,
}

impl Shape {
    /// Shape a value of this JSON form is stored with.
    pub fn of(value: &Value) -> Self {
        if value.is_object() {
            Shape::Keyed
        } else {
            Shape::Wrapped
        }
    }
}

/// How a remote document is combined with a module's static defaults on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// The remote value replaces local state wholesale.
    #[default]
    Replace,
    /// Top-level fields missing (or `null`) remotely are taken from the
    /// defaults; present fields replace the defaults wholesale.
    FillMissing,
}

impl MergeStrategy {
    pub fn apply(self, initial: &Value, remote: Value) -> Value {
        match (self, initial, remote) {
            (MergeStrategy::FillMissing, Value::Object(defaults), Value::Object(remote)) => {
                let mut merged = defaults.clone();
                for (key, value) in remote {
                    if !value.is_null() {
                        merged.insert(key, value);
                    }
                }
                Value::Object(merged)
            }
            (_, _, remote) => remote,
        }
    }
}

/// Serialize a module value into a store-safe JSON value.
///
/// Fields skipped by serde never appear, and floats with no JSON form
/// (NaN, infinities) become `null` instead of failing the write.
pub fn sanitize<T: Serialize>(value: &T) -> Result<Value, CoreError> {
    Ok(serde_json::to_value(value)?)
}

/// Wrap a sanitized value into the keyed document that gets written.
pub fn wrap(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => {
            let mut doc = Document::new();
            doc.insert(DATA_FIELD.to_owned(), other);
            doc
        }
    }
}

/// Reverse of [`wrap`]. Returns `None` when a wrapped document has no
/// `data` field.
pub fn unwrap(mut document: Document, shape: Shape) -> Option<Value> {
    match shape {
        Shape::Keyed => Some(Value::Object(document)),
        Shape::Wrapped => document.remove(DATA_FIELD),
    }
}

/// Merge-write `patch` into `target`: objects merge recursively, every
/// other value (arrays included) replaces.
pub fn merge_write(target: &mut Document, patch: Document) {
    for (key, incoming) in patch {
        match (target.get_mut(&key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_write(existing, nested);
            }
            (_, incoming) => {
                target.insert(key, incoming);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn sequences_are_wrapped_and_unwrapped() {
        let value = json!([{"id": "p1"}, {"id": "p2"}]);
        let shape = Shape::of(&value);
        assert_eq!(shape, Shape::Wrapped);

        let stored = wrap(value.clone());
        assert_eq!(Value::Object(stored.clone()), json!({"data": value}));
        assert_eq!(unwrap(stored, shape), Some(value));
    }

    #[test]
    fn objects_are_stored_directly() {
        let value = json!({"Problem": "X"});
        assert_eq!(Shape::of(&value), Shape::Keyed);
        assert_eq!(Value::Object(wrap(value.clone())), value);
    }

    #[test]
    fn wrapped_document_without_data_unwraps_to_none() {
        assert_eq!(unwrap(doc(json!({"other": 1})), Shape::Wrapped), None);
    }

    #[test]
    fn sanitize_maps_non_finite_floats_to_null() {
        #[derive(Serialize)]
        struct Numbers {
            ratio: f64,
        }
        let value = sanitize(&Numbers { ratio: f64::NAN }).expect("sanitize");
        assert_eq!(value, json!({"ratio": null}));
    }

    #[test]
    fn fill_missing_takes_absent_and_null_fields_from_defaults() {
        let defaults = json!({"a": {"x": 1}, "b": [1], "c": "keep"});
        let remote = json!({"a": {"y": 2}, "c": null});
        let merged = MergeStrategy::FillMissing.apply(&defaults, remote);
        assert_eq!(merged, json!({"a": {"y": 2}, "b": [1], "c": "keep"}));
    }

    #[test]
    fn replace_ignores_defaults() {
        let merged = MergeStrategy::Replace.apply(&json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, json!({"b": 2}));
    }

    #[test]
    fn merge_write_recurses_into_objects_and_replaces_arrays() {
        let mut target = doc(json!({"a": {"x": 1, "y": 2}, "list": [1, 2, 3], "kept": true}));
        merge_write(
            &mut target,
            doc(json!({"a": {"y": 20, "z": 30}, "list": [9]})),
        );
        assert_eq!(
            Value::Object(target),
            json!({"a": {"x": 1, "y": 20, "z": 30}, "list": [9], "kept": true})
        );
    }
}
