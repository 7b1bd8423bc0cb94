//! Document-to-document operations
//!
//! High-level transforms over loaded documents: importing pages across
//! documents under a caller-supplied ordering, and structural
//! deduplication of identical indirect objects. Both come in one-shot and
//! progressive forms.

mod import;
mod optimize;

pub use import::{import_pages, start_import_pages};
pub use optimize::{dedupe_objects, optimize, start_optimize};
