//! Pipeline layer over the lower-level crates.
//! Exposes the stable entry points used by the CLI.

pub mod apply;
pub mod charset;
pub mod extract;
pub mod migrate;
pub mod snapshot;
pub mod store;
pub mod util;
pub mod validate;

pub use dllloc_core::{Result, TranslatableSpan, TranslationRecord};
pub use dllloc_validate::ValidationMessage;
pub use store::CorpusKind;

/// Per-file map keyed by root-relative source path (`/` separated).
pub type FileMap<T> = std::collections::BTreeMap<String, Vec<T>>;
