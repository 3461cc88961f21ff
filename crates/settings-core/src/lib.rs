//! Layered settings resolution engine.
//!
//! Settings arrive as ordered, prioritized layers of raw values. The merge
//! engine flattens them (highest priority wins, ties go to the layer added
//! last) and the resolver evaluates templates, references and deferred
//! expressions against the merged mapping, memoizing every result and
//! rejecting cyclic definitions.
//!
//! ```
//! use settings_core::{Layer, LayerStore, RawValue, resolve_all};
//! use serde_json::json;
//!
//! let mut store = LayerStore::new();
//! store.push(Layer::new("defaults", 0)
//!     .with("LOCAL_PATH", "/var/app")
//!     .with("LOG_DIR", "{LOCAL_PATH}/logs")
//!     .with("USE_SSL", false)).unwrap();
//! store.push(Layer::new("local", 10)
//!     .with("LOCAL_PATH", "/data")
//!     .with("INSECURE", RawValue::deferred(["USE_SSL"], |deps| {
//!         Ok(json!(!deps["USE_SSL"].as_bool().unwrap_or(false)))
//!     }))).unwrap();
//!
//! let settings = resolve_all(&store.merge()).unwrap();
//! assert_eq!(settings.get_str("LOG_DIR"), Some("/data/logs"));
//! assert_eq!(settings.get_bool("INSECURE"), Some(true));
//! ```

mod error;
mod layer;
mod merge;
mod resolver;
pub mod template;
mod value;

pub use error::{LayerError, ResolveError};
pub use layer::{Layer, LayerStore};
pub use merge::{merge, MergedEntry, MergedMapping};
pub use resolver::{resolve, resolve_all, ResolutionCache, ResolvedSettings, Resolver};
pub use template::{Template, TemplateError};
pub use value::{
    normalize_path, Deferred, Dependencies, ExpressionFn, PathKind, RawValue, DIR_MARKER,
    EXPAND_MARKER, PATH_MARKER, RAW_MARKER, REF_MARKER,
};
