use std::fmt;
use std::str::FromStr;

use crate::error::SerializeError;

/// Identifier of a registered class: a free-form `base` name plus a
/// non-negative `version`.
///
/// The canonical wire form is `base` for version 0 and `base:version`
/// otherwise, so data written before a type was ever versioned keeps its
/// original tag. The base must not contain `:` (the first `:` in a tag is
/// the separator).
///
/// # Example
///
/// ```
/// use json_serialize::ClassId;
///
/// let id = ClassId::new("Person").unwrap();
/// assert_eq!(id.to_string(), "Person");
///
/// let id = ClassId::versioned("Person", 2).unwrap();
/// assert_eq!(id.to_string(), "Person:2");
/// assert_eq!("Person:2".parse::<ClassId>().unwrap(), id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassId {
    base: String,
    version: u32,
}

impl ClassId {
    /// Create a version-0 id. Fails if `base` is empty or contains `:`.
    pub fn new(base: impl Into<String>) -> Result<Self, SerializeError> {
        Self::versioned(base, 0)
    }

    /// Create a versioned id. Fails if `base` is empty or contains `:`.
    pub fn versioned(base: impl Into<String>, version: u32) -> Result<Self, SerializeError> {
        let base = base.into();
        if base.is_empty() || base.contains(':') {
            return Err(SerializeError::InvalidClassId(base));
        }
        Ok(Self { base, version })
    }

    /// Parse a wire-form tag. The first `:` separates base from version;
    /// the suffix must parse as a non-negative integer.
    pub fn parse(tag: &str) -> Result<Self, SerializeError> {
        match tag.split_once(':') {
            None => Self::versioned(tag, 0),
            Some((base, suffix)) => {
                let version = suffix
                    .parse::<u32>()
                    .map_err(|_| SerializeError::InvalidClassId(tag.to_string()))?;
                Self::versioned(base, version)
            }
        }
    }

    /// The version-independent name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The version number; 0 means unversioned.
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version == 0 {
            f.write_str(&self.base)
        } else {
            write!(f, "{}:{}", self.base, self.version)
        }
    }
}

impl FromStr for ClassId {
    type Err = SerializeError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::parse(tag)
    }
}
