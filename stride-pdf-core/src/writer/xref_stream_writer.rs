//! Cross-reference stream encoding (ISO 32000-1 section 7.5.8)
//!
//! Packs xref entries into the binary row format and wraps them in a
//! stream object whose dictionary doubles as the trailer. Rows are
//! emitted unfiltered; the entry data is small and this keeps the
//! encoding independent of the compression feature.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, Stream};
use crate::parser::XRefEntry;
use std::collections::BTreeMap;

/// Field widths: 1-byte type, 4-byte offset, 2-byte generation.
const WIDTHS: [usize; 3] = [1, 4, 2];

pub struct XRefStreamWriter;

impl XRefStreamWriter {
    /// Build the xref stream object for `entries`. Keys in `trailer`
    /// (Root, Info, ID, Prev, Encrypt, Size) are carried into the stream
    /// dictionary.
    pub fn build(entries: &BTreeMap<u32, XRefEntry>, trailer: &Dictionary) -> Result<Stream> {
        if entries.is_empty() {
            return Err(PdfError::Param(
                "Cannot build an empty xref stream".to_string(),
            ));
        }

        let mut rows = Vec::with_capacity(entries.len() * WIDTHS.iter().sum::<usize>());
        let mut index = Vec::new();
        let numbers: Vec<u32> = entries.keys().copied().collect();

        let mut run_start = 0usize;
        while run_start < numbers.len() {
            let mut run_end = run_start + 1;
            while run_end < numbers.len() && numbers[run_end] == numbers[run_end - 1] + 1 {
                run_end += 1;
            }
            index.push(Object::Integer(numbers[run_start] as i64));
            index.push(Object::Integer((run_end - run_start) as i64));
            for &number in &numbers[run_start..run_end] {
                let entry = &entries[&number];
                if entry.in_use && entry.offset > u32::MAX as u64 {
                    return Err(PdfError::Param(format!(
                        "Object {number} offset {} exceeds xref stream field width",
                        entry.offset
                    )));
                }
                rows.push(if entry.in_use { 1 } else { 0 });
                rows.extend_from_slice(&(entry.offset as u32).to_be_bytes());
                rows.extend_from_slice(&entry.generation.to_be_bytes());
            }
            run_start = run_end;
        }

        let mut dict = trailer.clone();
        dict.set("Type", Object::name("XRef"));
        if dict.get_integer("Size").is_none() {
            let size = numbers.last().copied().unwrap_or(0) as i64 + 1;
            dict.set("Size", size);
        }
        dict.set(
            "W",
            Object::Array(WIDTHS.iter().map(|&w| Object::Integer(w as i64)).collect()),
        );
        dict.set("Index", Object::Array(index));

        Ok(Stream::with_dictionary(dict, rows))
    }
}
