//! Class-tagged JSON serialization.
//!
//! Values of registered types are encoded as JSON objects carrying a
//! reserved `_CLSID_` field, so decoding can rebuild the exact concrete
//! type that was written, including values held behind
//! [`Box<dyn JsonClass>`](JsonClass) fields, without per-type codec code.
//! Identifiers carry an optional version; decoding a stale or unknown
//! version falls back to the newest registration of the same base name, so
//! old data keeps loading as types evolve.
//!
//! Declare every serializable type once at startup, then use the free
//! functions or the [`JsonSerialize`] helpers:
//!
//! # Example
//!
//! ```
//! use json_serialize::{declare, JsonSerialize};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Account {
//!     owner: String,
//!     balance: i64,
//! }
//!
//! declare::<Account>().unwrap();
//!
//! let account = Account { owner: "ada".into(), balance: 100 };
//! let text = account.to_json().unwrap();
//! let restored = Account::from_json(&text).unwrap();
//! assert_eq!(restored, account);
//! ```

pub mod class;
pub mod class_id;
pub mod declare;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod registry;

// Re-export the core public API
pub use class::{JsonClass, CLASS_ID_KEY};
pub use class_id::ClassId;
pub use declare::{declare, declare_as, JsonSerialize};
pub use decoder::{decode, decode_value, from_json, from_value, Decoded};
pub use encoder::{encode, encode_dyn, encode_value, EncodeOptions};
pub use error::SerializeError;
pub use registry::{ClassDescriptor, Registry};
