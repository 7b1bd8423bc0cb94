//! # stride-pdf
//!
//! Resumable, pause-aware PDF loading and saving over a mutable indirect
//! object graph.
//!
//! Every long-running transform — loading, saving, page import,
//! optimization — is a [`progress::Progressive`] operation: the host calls
//! [`progress::Progressive::resume`] repeatedly, one bounded increment at
//! a time, and reads [`progress::Progressive::rate_of_progress`] between
//! calls. There is no internal thread pool and no hidden async runtime;
//! scheduling belongs entirely to the host, which can run one increment
//! per UI frame or drive an operation to completion in a tight loop.
//!
//! ## Features
//!
//! - **Progressive load/save**: pull-based `resume` protocol with
//!   cooperative pausing and retry-after-more-data semantics for
//!   partially-downloaded sources
//! - **Object graph sessions**: indirect object table, page list, and
//!   trailer record behind a shared [`Document`] handle
//! - **Incremental save**: append-only updates preserving the original
//!   bytes, classic xref tables or cross-reference streams
//! - **Password encryption**: standard security handler (RC4 40/128-bit),
//!   user/owner password classification, permission bits
//! - **Page import**: cross-document page copies ordered by a
//!   [`range::PageRange`]
//!
//! ## Quick start
//!
//! ```rust
//! use stride_pdf::{Document, MemorySink, Result, SaveFlags};
//!
//! # fn main() -> Result<()> {
//! // Build a three-page document.
//! let doc = Document::new();
//! doc.insert_page(0, 612.0, 792.0)?;
//! doc.insert_page(1, 612.0, 792.0)?;
//! doc.insert_page(2, 612.0, 792.0)?;
//!
//! // Save it to memory, then load it back.
//! let sink = MemorySink::new();
//! doc.save_to_writer(sink.clone(), SaveFlags::empty())?;
//!
//! let reloaded = Document::load_from_memory(sink.contents(), "")?;
//! assert_eq!(reloaded.page_count()?, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving an operation by hand
//!
//! ```rust
//! use stride_pdf::{Document, LoadOptions, MemorySink, SaveFlags};
//! use stride_pdf::io::MemorySource;
//!
//! # fn main() -> stride_pdf::Result<()> {
//! let doc = Document::new();
//! doc.insert_page(0, 595.0, 842.0)?;
//! let sink = MemorySink::new();
//! doc.save_to_writer(sink.clone(), SaveFlags::empty())?;
//!
//! let source = Box::new(MemorySource::new(sink.contents()));
//! let (loading, mut operation) = Document::start_load(source, "", LoadOptions::default(), None);
//! while !operation.is_finished() {
//!     operation.resume()?;
//!     // Interleave other work here; progress is monotone.
//!     let _ = operation.rate_of_progress();
//! }
//! assert_eq!(loading.page_count()?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//!
//! A [`Document`] and its operations are single-threaded by construction
//! (handles are not `Send`). Process documents concurrently by giving
//! each thread its own document.

pub mod capabilities;
pub mod document;
pub mod encryption;
pub mod error;
pub mod io;
pub mod objects;
pub mod operations;
pub mod parser;
pub mod progress;
pub mod range;
pub mod writer;

// Core session types
pub use document::{Document, LoadOptions, LoadState};
pub use error::{PdfError, Result};

// Object model
pub use objects::{Dictionary, Object, ObjectId, Stream};

// Progressive protocol
pub use progress::{PauseHandler, Progressive, ProgressiveTask, StepOutcome};

// I/O seams
pub use io::{ByteSource, FileSource, MemorySink, MemorySource, PartialSource, RangeHint};

// Encryption surface
pub use encryption::{
    EncryptType, EncryptionStrength, PasswordType, Permissions, SecuritySettings,
};

// Saving
pub use writer::SaveFlags;

// Ranges and operations
pub use capabilities::{Capabilities, Module};
pub use operations::{import_pages, optimize, start_import_pages, start_optimize};
pub use range::PageRange;

/// Current version of stride-pdf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
