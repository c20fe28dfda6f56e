use std::any::Any;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::class_id::ClassId;
use crate::decoder;
use crate::encoder::{self, EncodeOptions};
use crate::error::SerializeError;
use crate::registry::{self, ClassDescriptor};

/// Register `T` in the process-wide registry under its own type name,
/// version 0.
///
/// The default-instance probe runs before the registry is touched, so a
/// rejected type is never resolvable. A type whose default value holds
/// non-empty dynamic fields must be declared after the classes those
/// fields contain. Generic types should use [`declare_as`] with an
/// explicit id.
///
/// # Example
///
/// ```
/// use json_serialize::{declare, JsonSerialize};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
/// struct Greeting {
///     who: String,
/// }
///
/// declare::<Greeting>().unwrap();
///
/// let greeting = Greeting { who: "World".into() };
/// let text = greeting.to_json().unwrap();
/// assert_eq!(Greeting::from_json(&text).unwrap(), greeting);
/// ```
pub fn declare<T>() -> Result<(), SerializeError>
where
    T: Default + Serialize + DeserializeOwned + Any,
{
    declare_as::<T>(ClassId::new(short_type_name::<T>())?)
}

/// Register `T` in the process-wide registry under an explicit id.
///
/// ```
/// use json_serialize::{declare_as, ClassId};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Rect {
///     w: f64,
///     h: f64,
/// }
///
/// declare_as::<Rect>(ClassId::versioned("shapes.Rect", 2).unwrap()).unwrap();
/// ```
pub fn declare_as<T>(class_id: ClassId) -> Result<(), SerializeError>
where
    T: Default + Serialize + DeserializeOwned + Any,
{
    let descriptor = ClassDescriptor::of::<T>(class_id)?;
    registry::write_global().register(descriptor)
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head_end = full.find('<').unwrap_or(full.len());
    match full[..head_end].rfind("::") {
        Some(separator) => &full[separator + 2..],
        None => full,
    }
}

/// Serialization operations attached to every eligible type.
///
/// Blanket-implemented; whether a call succeeds is decided by the registry
/// at run time, exactly as with the free functions these forward to.
pub trait JsonSerialize: Serialize + Any + Sized {
    /// Serialize self with the default options (pretty, public fields
    /// only).
    fn to_json(&self) -> Result<String, SerializeError> {
        encoder::encode(self, EncodeOptions::default())
    }

    /// Serialize self with explicit options.
    fn to_json_with(&self, options: EncodeOptions) -> Result<String, SerializeError> {
        encoder::encode(self, options)
    }

    /// Rebuild an instance from JSON text. Accepts any text whose tag
    /// resolves and downcasts to `Self`; other classes fail with
    /// [`SerializeError::ClassMismatch`].
    fn from_json(text: &str) -> Result<Self, SerializeError> {
        decoder::from_json(text)
    }

    /// Rebuild an instance from an already-parsed JSON tree.
    fn from_json_value(value: Value) -> Result<Self, SerializeError> {
        decoder::from_value(value)
    }
}

impl<T: Serialize + Any + Sized> JsonSerialize for T {}
