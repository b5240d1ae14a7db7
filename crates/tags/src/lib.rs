//! Tag extraction and validation.
//!
//! Wraps an external tag extraction library behind the [`TagReader`] trait and
//! provides the [`is_valid`] predicate that decides whether a tag is complete
//! enough to appear in the index artifact.

pub mod error;
mod models;
pub mod reader;
mod validate;

pub use crate::models::{TagData, TagKind, TagRecord};
#[cfg(feature = "lofty")]
pub use crate::reader::LoftyReader;
pub use crate::reader::TagReader;
#[cfg(feature = "mock")]
pub use crate::reader::{MockReader, MockTag};
pub use crate::validate::is_valid;
use std::sync::Arc;

pub type ReaderHandle = Arc<dyn TagReader>;
