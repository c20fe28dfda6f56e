use std::any::Any;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::class::{JsonClass, CLASS_ID_KEY};
use crate::error::SerializeError;
use crate::registry;

/// Result of decoding a JSON root.
#[derive(Debug)]
pub enum Decoded {
    /// The root carried a class tag and was rebuilt as that class.
    Class(Box<dyn JsonClass>),
    /// The root was a plain mapping, array or primitive.
    Plain(Value),
}

impl Decoded {
    pub fn is_class(&self) -> bool {
        matches!(self, Decoded::Class(_))
    }

    /// The rebuilt instance, if the root was tagged.
    pub fn into_class(self) -> Option<Box<dyn JsonClass>> {
        match self {
            Decoded::Class(instance) => Some(instance),
            Decoded::Plain(_) => None,
        }
    }

    /// The raw tree, if the root was untagged.
    pub fn into_plain(self) -> Option<Value> {
        match self {
            Decoded::Class(_) => None,
            Decoded::Plain(value) => Some(value),
        }
    }
}

/// Decode JSON text.
///
/// A root object carrying `_CLSID_` is rebuilt as its registered class:
/// the resolved type is default-constructed, keys present in its field
/// table are assigned, unknown keys are silently dropped, and nested
/// dynamic fields come back with their exact concrete type. Any other root
/// is returned verbatim. An unresolvable tag anywhere in the
/// reconstruction aborts the whole decode; no partial graph is returned.
///
/// # Example
///
/// ```
/// use json_serialize::decode;
///
/// let decoded = decode(r#"{"name":"ada"}"#).unwrap();
/// assert!(!decoded.is_class());
/// ```
pub fn decode(text: &str) -> Result<Decoded, SerializeError> {
    let root: Value = serde_json::from_str(text)?;
    decode_value(root)
}

/// Decode an already-parsed JSON tree. Same rules as [`decode`].
pub fn decode_value(root: Value) -> Result<Decoded, SerializeError> {
    match root {
        Value::Object(ref fields) if fields.contains_key(CLASS_ID_KEY) => {
            Ok(Decoded::Class(revive_object(fields)?))
        }
        other => Ok(Decoded::Plain(other)),
    }
}

/// Decode text into a concrete type.
///
/// Equivalent to [`decode`] followed by a downcast; a plain root, or a tag
/// resolving to a different class, fails with
/// [`SerializeError::ClassMismatch`].
pub fn from_json<T>(text: &str) -> Result<T, SerializeError>
where
    T: Any,
{
    downcast(decode(text)?)
}

/// Decode an already-parsed JSON tree into a concrete type.
pub fn from_value<T>(value: Value) -> Result<T, SerializeError>
where
    T: Any,
{
    downcast(decode_value(value)?)
}

fn downcast<T: Any>(decoded: Decoded) -> Result<T, SerializeError> {
    let expected = std::any::type_name::<T>();
    match decoded {
        Decoded::Class(instance) => {
            let found = instance.type_name();
            match instance.into_any().downcast::<T>() {
                Ok(concrete) => Ok(*concrete),
                Err(_) => Err(SerializeError::ClassMismatch {
                    expected,
                    found: found.to_string(),
                }),
            }
        }
        Decoded::Plain(_) => Err(SerializeError::ClassMismatch {
            expected,
            found: "a plain JSON value".to_string(),
        }),
    }
}

/// Rebuild a tagged object: resolve the tag, default-construct the class,
/// assign the keys present in its field table, drop the rest.
pub(crate) fn revive_object(
    fields: &Map<String, Value>,
) -> Result<Box<dyn JsonClass>, SerializeError> {
    let tag = match fields.get(CLASS_ID_KEY) {
        Some(Value::String(tag)) => tag,
        Some(other) => return Err(SerializeError::InvalidClassId(other.to_string())),
        None => return Err(SerializeError::MissingClassTag),
    };
    let descriptor = registry::read_global().resolve(tag).map(Arc::clone)?;
    // Lock released; nested dynamic fields re-enter the registry through
    // their Deserialize impls.
    descriptor.revive_from(fields)
}
