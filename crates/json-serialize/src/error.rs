use thiserror::Error;

/// Errors raised by registration, encoding and decoding.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// A class id was registered twice. The first registration stays in
    /// place.
    #[error("class '{0}' is already registered")]
    DuplicateClass(String),

    /// Registration probe failed: the default instance of the type does
    /// not serialize to a JSON object, so decoding could never rebuild it
    /// by field assignment.
    #[error("type '{0}' cannot be registered: its default instance does not serialize to a JSON object")]
    NonObjectClass(&'static str),

    /// A `_CLSID_` tag matched no registered base name.
    #[error("class id '{0}' is not registered")]
    UnresolvedClass(String),

    /// A dynamic value's concrete type has no registration.
    #[error("type '{0}' is not registered for serialization")]
    NotSerializable(&'static str),

    /// Malformed class id: empty base, `:` inside the base, a non-string
    /// tag, or a version suffix that is not a non-negative integer.
    #[error("invalid class id '{0}'")]
    InvalidClassId(String),

    /// A typed decode produced an instance of a different class.
    #[error("expected an instance of '{expected}', found {found}")]
    ClassMismatch {
        expected: &'static str,
        found: String,
    },

    /// Content of a dynamic field carried no `_CLSID_` tag.
    #[error("value is not a tagged class object")]
    MissingClassTag,

    /// Underlying JSON error: malformed input text, or a field value whose
    /// shape does not fit the target field.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
