//! Declarative configuration resolution for an OGC web service.
//!
//! Turns a tree of raw configuration documents into validated layer and
//! style objects:
//!
//! - [`inclusion`] splices in documents referenced by `include` directives,
//!   with cycle detection.
//! - [`inherit`] applies `inherits` directives by deep-merging a child over a
//!   parent found through the [`index`].
//! - [`entry`] implements the two-phase lifecycle: parse first, then make
//!   ready against a [`datacube`] index.
//! - [`metadata`] keeps display text out of the entries so it can be
//!   translated or overridden.
//! - [`function`] resolves configured function references.
//!
//! [`OwsConfig`] ties these together; [`load_config`] is the usual entry
//! point.

pub mod bands;
pub mod context;
pub mod datacube;
pub mod entry;
pub mod error;
pub mod flags;
pub mod function;
pub mod global;
pub mod inclusion;
pub mod index;
pub mod inherit;
pub mod layer;
pub mod legend;
pub mod logging;
pub mod mask;
pub mod merge;
pub mod metadata;
pub mod node;
pub mod settings;
pub mod style;

pub use bands::BandIndex;
pub use context::LoadContext;
pub use datacube::{DatacubeIndex, MeasurementInfo, ProductInfo, StaticIndex};
pub use entry::{ConfigEntry, Deferred, EntryCore, EntryState};
pub use error::{ConfigError, Result};
pub use flags::{FlagBand, FlagProductGroup};
pub use function::{
    BandMapper, Capability, FunctionCall, FunctionOwner, FunctionReference, FunctionRegistry,
    FunctionSpec, FunctionTarget,
};
pub use global::OwsConfig;
pub use inclusion::{InclusionExpander, ObjectRegistry};
pub use index::{EntryIndex, EntryKind, IndexRecord, IndexedEntry, KeyValues};
pub use inherit::expand_inherit;
pub use layer::{LAYER, LayerScope, NamedLayer};
pub use mask::{FlagsDefinition, MaskRule, RuleCondition};
pub use merge::deep_merge;
pub use metadata::{MessageCatalog, MetadataOwner, MetadataRegistry, Translator};
pub use node::RawConfigNode;
pub use settings::{ConfigSource, LoaderSettings, load_config, read_config};
pub use legend::{Legend, RampStop, TickValue};
pub use style::{STYLE, StyleDef, ValueMapRule};
