use std::any::Any;
use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

use crate::decoder;
use crate::encoder;
use crate::error::SerializeError;

/// Reserved field name carrying the class id in every tagged object.
///
/// Caller types must not use this name for a field of their own.
pub const CLASS_ID_KEY: &str = "_CLSID_";

/// Object-safe view of a serializable value.
///
/// Blanket-implemented for every `T: Serialize + Any`, so any serializable
/// value can sit behind a `Box<dyn JsonClass>` field. Whether the value can
/// actually be encoded is decided at run time by the registry; undeclared
/// concrete types fail with
/// [`SerializeError::NotSerializable`](crate::SerializeError::NotSerializable).
pub trait JsonClass: Any {
    /// Borrow as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Consume into [`Any`] for owned downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// The Rust type name, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: Serialize + Any> JsonClass for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl fmt::Debug for dyn JsonClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonClass<{}>", self.type_name())
    }
}

/// Serializing a dynamic value emits its tagged object: the field snapshot
/// of the concrete type plus the `_CLSID_` key. This is the hook that tags
/// registered values at any nesting depth.
impl Serialize for dyn JsonClass {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let tagged = encoder::tag_value(self).map_err(serde::ser::Error::custom)?;
        tagged.serialize(serializer)
    }
}

/// Deserializing a dynamic value reads the `_CLSID_` tag, resolves it in
/// the registry, and revives the exact concrete type that was encoded.
impl<'de> Deserialize<'de> for Box<dyn JsonClass> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Object(ref fields) => {
                decoder::revive_object(fields).map_err(serde::de::Error::custom)
            }
            _ => Err(serde::de::Error::custom(SerializeError::MissingClassTag)),
        }
    }
}
