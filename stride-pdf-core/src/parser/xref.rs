//! Cross-reference parsing (ISO 32000-1 sections 7.5.4 and 7.5.8)
//!
//! Both encodings are handled: the classic `xref` table and the
//! cross-reference stream. A section carries its trailer dictionary;
//! revision chaining through `/Prev` is driven by the loader, which parses
//! newest-first and keeps the first entry seen for each object number.

use crate::error::{PdfError, Result};
use crate::objects::Object;
use crate::parser::lexer::{Lexer, Token};
use crate::parser::objects::parse_indirect_object;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XRefEntry {
    /// Byte offset of the object (in-use entries).
    pub offset: u64,
    pub generation: u16,
    pub in_use: bool,
}

#[derive(Debug, Clone)]
pub struct XRefSection {
    pub entries: BTreeMap<u32, XRefEntry>,
    pub trailer: crate::objects::Dictionary,
}

impl XRefSection {
    /// Offset of the previous revision's xref, if this file has been
    /// incrementally updated.
    pub fn prev(&self) -> Option<u64> {
        self.trailer
            .get_integer("Prev")
            .and_then(|p| u64::try_from(p).ok())
    }

    /// Fold this (older) section's entries into `merged`, keeping entries
    /// already present from newer revisions.
    pub fn merge_into(&self, merged: &mut BTreeMap<u32, XRefEntry>) {
        for (&number, entry) in &self.entries {
            merged.entry(number).or_insert(*entry);
        }
    }
}

/// Find the `startxref` offset in the file's tail window.
pub fn find_startxref(tail: &[u8]) -> Result<u64> {
    let keyword = b"startxref";
    let position = tail
        .windows(keyword.len())
        .rposition(|window| window == keyword)
        .ok_or_else(|| PdfError::Format("Missing startxref".to_string()))?;

    let mut lexer = Lexer::new(&tail[position + keyword.len()..]);
    match lexer.next_token()? {
        Token::Integer(offset) if offset >= 0 => Ok(offset as u64),
        _ => Err(PdfError::Format("Invalid startxref offset".to_string())),
    }
}

/// Parse the xref section beginning at the start of `data`.
pub fn parse_section(data: &[u8]) -> Result<XRefSection> {
    let mut lexer = Lexer::new(data);
    if matches!(lexer.peek_token(), Ok(Token::Keyword(ref k)) if k == "xref") {
        lexer.expect_keyword("xref")?;
        parse_classic_table(&mut lexer)
    } else {
        parse_xref_stream(&mut lexer)
    }
}

fn parse_classic_table(lexer: &mut Lexer<'_>) -> Result<XRefSection> {
    let mut entries = BTreeMap::new();

    loop {
        match lexer.next_token()? {
            Token::Keyword(ref k) if k == "trailer" => break,
            Token::Integer(first) if first >= 0 => {
                let count = match lexer.next_token()? {
                    Token::Integer(c) if c >= 0 => c as u32,
                    other => {
                        return Err(PdfError::Format(format!(
                            "Invalid xref subsection count: {other:?}"
                        )))
                    }
                };
                for i in 0..count {
                    let entry = parse_classic_entry(lexer)?;
                    entries.insert(first as u32 + i, entry);
                }
            }
            other => {
                return Err(PdfError::Format(format!(
                    "Unexpected token in xref table: {other:?}"
                )))
            }
        }
    }

    let trailer = match crate::parser::objects::parse_object(lexer)? {
        Object::Dictionary(dict) => dict,
        _ => return Err(PdfError::Format("Trailer is not a dictionary".to_string())),
    };

    Ok(XRefSection { entries, trailer })
}

fn parse_classic_entry(lexer: &mut Lexer<'_>) -> Result<XRefEntry> {
    let offset = match lexer.next_token()? {
        Token::Integer(o) if o >= 0 => o as u64,
        other => {
            return Err(PdfError::Format(format!(
                "Invalid xref entry offset: {other:?}"
            )))
        }
    };
    let generation = match lexer.next_token()? {
        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
        other => {
            return Err(PdfError::Format(format!(
                "Invalid xref entry generation: {other:?}"
            )))
        }
    };
    let in_use = match lexer.next_token()? {
        Token::Keyword(ref k) if k == "n" => true,
        Token::Keyword(ref k) if k == "f" => false,
        other => {
            return Err(PdfError::Format(format!(
                "Invalid xref entry flag: {other:?}"
            )))
        }
    };
    Ok(XRefEntry {
        offset,
        generation,
        in_use,
    })
}

fn parse_xref_stream(lexer: &mut Lexer<'_>) -> Result<XRefSection> {
    let (_, object) = parse_indirect_object(lexer)?;
    let stream = object
        .as_stream()
        .ok_or_else(|| PdfError::Format("Expected xref stream".to_string()))?;
    let dict = stream.dictionary();

    if dict.get_name("Type") != Some("XRef") {
        return Err(PdfError::Format(
            "Object at startxref is not an xref table or stream".to_string(),
        ));
    }

    let size = dict
        .get_integer("Size")
        .ok_or_else(|| PdfError::Format("XRef stream missing /Size".to_string()))?;

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|w| w.as_array())
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.as_integer())
                .map(|w| w as usize)
                .collect()
        })
        .ok_or_else(|| PdfError::Format("XRef stream missing /W".to_string()))?;
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(PdfError::Format(format!(
            "Invalid xref stream /W: {widths:?}"
        )));
    }

    // Default index is a single run covering every object.
    let index: Vec<i64> = match dict.get("Index").and_then(|i| i.as_array()) {
        Some(values) => values.iter().filter_map(|v| v.as_integer()).collect(),
        None => vec![0, size],
    };
    if index.len() % 2 != 0 {
        return Err(PdfError::Format("Invalid xref stream /Index".to_string()));
    }

    let data = stream.decoded_data()?;
    let row_width: usize = widths.iter().sum();
    if row_width == 0 {
        return Err(PdfError::Format("Empty xref stream rows".to_string()));
    }

    let mut entries = BTreeMap::new();
    let mut rows = data.chunks_exact(row_width);
    for run in index.chunks(2) {
        let (start, count) = (run[0], run[1]);
        for number in start..start + count {
            let row = rows
                .next()
                .ok_or_else(|| PdfError::Format("Truncated xref stream".to_string()))?;
            let (kind_bytes, rest) = row.split_at(widths[0]);
            let (second, third) = rest.split_at(widths[1]);

            // A zero-width type field defaults to type 1 (in-use).
            let kind = if widths[0] == 0 {
                1
            } else {
                be_number(kind_bytes)
            };
            match kind {
                0 => {
                    entries.insert(
                        number as u32,
                        XRefEntry {
                            offset: 0,
                            generation: be_number(third) as u16,
                            in_use: false,
                        },
                    );
                }
                1 => {
                    entries.insert(
                        number as u32,
                        XRefEntry {
                            offset: be_number(second),
                            generation: be_number(third) as u16,
                            in_use: true,
                        },
                    );
                }
                2 => {
                    return Err(PdfError::Format(
                        "Compressed object streams are not supported".to_string(),
                    ))
                }
                other => {
                    return Err(PdfError::Format(format!(
                        "Unknown xref stream entry type {other}"
                    )))
                }
            }
        }
    }

    Ok(XRefSection {
        entries,
        trailer: dict.clone(),
    })
}

fn be_number(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
