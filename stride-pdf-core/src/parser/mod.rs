//! PDF parsing
//!
//! A deliberately compact parser: tokenizer, object parser, header, and
//! cross-reference handling (classic tables and xref streams, with `/Prev`
//! revision chaining). It reads everything the writer can produce,
//! including encrypted and incrementally-updated files. Compressed object
//! streams are out of scope and rejected with a format error.

pub mod header;
pub mod lexer;
pub mod objects;
pub mod xref;

pub use header::{parse_header, PdfVersion};
pub use lexer::{Lexer, Token};
pub use objects::{parse_indirect_object, parse_object};
pub use xref::{find_startxref, parse_section, XRefEntry, XRefSection};
