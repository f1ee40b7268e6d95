//! Document locations and loading for the OWS configuration engine.
//!
//! Provides normalized path handling, resolution of configuration "working
//! directories" (local or object storage), and JSON document loading.

pub mod error;
pub mod loader;
pub mod location;
pub mod path;

pub use error::{Error, Result};
pub use loader::{DocumentLoader, ObjectStore};
pub use location::{ConfigLocation, DocumentRef, file_loc, is_truthy};
pub use path::NormalizedPath;
