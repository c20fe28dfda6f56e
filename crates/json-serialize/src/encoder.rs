use std::any::{Any, TypeId};

use serde::Serialize;
use serde_json::Value;

use crate::class::{JsonClass, CLASS_ID_KEY};
use crate::error::SerializeError;
use crate::registry;

/// Encoding options.
///
/// `pretty` renders human-indented text with object keys sorted; compact
/// output keeps field order. With `include_all_fields` unset, fields whose
/// name starts with `_` are dropped from every tagged object (the tag
/// itself is always kept). Plain mappings are never filtered.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub pretty: bool,
    pub include_all_fields: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            include_all_fields: false,
        }
    }
}

impl EncodeOptions {
    /// Compact output with the default field policy.
    pub fn compact() -> Self {
        Self {
            pretty: false,
            include_all_fields: false,
        }
    }
}

/// Encode a value to JSON text.
///
/// A registered type produces a tagged object; registered values nested
/// behind `Box<dyn JsonClass>` fields are tagged recursively through their
/// `Serialize` impl. Unregistered values serialize by the plain JSON rules.
/// The input is only borrowed, never mutated.
///
/// # Example
///
/// ```
/// use json_serialize::{declare, encode, EncodeOptions};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// declare::<Point>().unwrap();
///
/// let text = encode(&Point { x: 1, y: 2 }, EncodeOptions::compact()).unwrap();
/// assert_eq!(text, r#"{"x":1,"y":2,"_CLSID_":"Point"}"#);
/// ```
pub fn encode<T>(value: &T, options: EncodeOptions) -> Result<String, SerializeError>
where
    T: Serialize + Any,
{
    let registered = registry::read_global()
        .descriptor_of(TypeId::of::<T>())
        .is_some();
    let tree = if registered {
        tag_value(value)?
    } else {
        serde_json::to_value(value)?
    };
    finish(tree, options)
}

/// Encode a dynamic value to JSON text.
///
/// Unlike [`encode`], the root must be of a registered type; an undeclared
/// concrete type fails with [`SerializeError::NotSerializable`].
pub fn encode_dyn(value: &dyn JsonClass, options: EncodeOptions) -> Result<String, SerializeError> {
    finish(tag_value(value)?, options)
}

/// Encode to a JSON tree instead of text. The field policy applies; text
/// formatting concerns do not.
pub fn encode_value<T>(value: &T, include_all_fields: bool) -> Result<Value, SerializeError>
where
    T: Serialize + Any,
{
    let registered = registry::read_global()
        .descriptor_of(TypeId::of::<T>())
        .is_some();
    let mut tree = if registered {
        tag_value(value)?
    } else {
        serde_json::to_value(value)?
    };
    if !include_all_fields {
        strip_internal_fields(&mut tree);
    }
    Ok(tree)
}

fn finish(mut tree: Value, options: EncodeOptions) -> Result<String, SerializeError> {
    if !options.include_all_fields {
        strip_internal_fields(&mut tree);
    }
    if options.pretty {
        sort_keys(&mut tree);
        Ok(serde_json::to_string_pretty(&tree)?)
    } else {
        Ok(serde_json::to_string(&tree)?)
    }
}

/// Produce the tagged object for a registered value: the concrete field
/// snapshot plus the `_CLSID_` key.
pub(crate) fn tag_value(value: &dyn JsonClass) -> Result<Value, SerializeError> {
    let descriptor = registry::read_global()
        .descriptor_of(value.as_any().type_id())
        .ok_or_else(|| SerializeError::NotSerializable(value.type_name()))?;
    // The registry lock is released before the snapshot runs: nested
    // dynamic fields re-enter it through their own Serialize impls.
    let Value::Object(mut fields) = descriptor.snapshot_of(value)? else {
        return Err(SerializeError::NotSerializable(value.type_name()));
    };
    fields.insert(
        CLASS_ID_KEY.to_string(),
        Value::String(descriptor.class_id().to_string()),
    );
    Ok(Value::Object(fields))
}

/// Drop `_`-prefixed fields from every tagged object in the tree.
fn strip_internal_fields(value: &mut Value) {
    match value {
        Value::Object(fields) => {
            if fields.contains_key(CLASS_ID_KEY) {
                *fields = std::mem::take(fields)
                    .into_iter()
                    .filter(|(name, _)| name.as_str() == CLASS_ID_KEY || !name.starts_with('_'))
                    .collect();
            }
            for nested in fields.values_mut() {
                strip_internal_fields(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                strip_internal_fields(nested);
            }
        }
        _ => {}
    }
}

/// Recursively sort object keys, for stable pretty output.
fn sort_keys(value: &mut Value) {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(String, Value)> = std::mem::take(fields).into_iter().collect();
            entries.sort_by(|left, right| left.0.cmp(&right.0));
            for (_, nested) in &mut entries {
                sort_keys(nested);
            }
            *fields = entries.into_iter().collect();
        }
        Value::Array(items) => {
            for nested in items {
                sort_keys(nested);
            }
        }
        _ => {}
    }
}
