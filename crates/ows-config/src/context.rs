//! Mutable state threaded through one configuration load

use crate::function::FunctionRegistry;
use crate::index::EntryIndex;
use crate::metadata::MetadataRegistry;

/// Registries an entry may read or populate while it is constructed.
///
/// Borrowed mutably for the duration of a load; afterwards the index and
/// metadata are owned by the resulting configuration and only read.
#[derive(Debug)]
pub struct LoadContext<'a> {
    pub index: &'a mut EntryIndex,
    pub metadata: &'a mut MetadataRegistry,
    pub functions: &'a FunctionRegistry,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        index: &'a mut EntryIndex,
        metadata: &'a mut MetadataRegistry,
        functions: &'a FunctionRegistry,
    ) -> Self {
        Self {
            index,
            metadata,
            functions,
        }
    }
}
