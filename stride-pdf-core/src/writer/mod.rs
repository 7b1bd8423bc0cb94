//! PDF serialization
//!
//! [`PdfWriter`] emits objects to any sink while tracking byte positions
//! for the cross-reference section. It has no opinion about *which*
//! objects to write or in what order; the save tasks in
//! [`crate::document`] drive it, which is what keeps full, incremental,
//! and linearized-layout saves on one code path.

mod xref_stream_writer;

pub use xref_stream_writer::XRefStreamWriter;

use crate::encryption::StandardSecurityHandler;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId, Stream};
use crate::parser::{PdfVersion, XRefEntry};
use bitflags::bitflags;
use std::collections::BTreeMap;
use std::io::Write;

bitflags! {
    /// How a document is saved. `SaveFlags::empty()` is a normal full
    /// rewrite.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SaveFlags: u32 {
        /// Append changed objects after the original bytes instead of
        /// rewriting the file.
        const INCREMENTAL = 1 << 0;
        /// Drop unchanged original bytes. Combined with `INCREMENTAL`
        /// this emits only the appended delta.
        const NO_ORIGINAL = 1 << 1;
        /// Encode the cross-reference as a stream instead of the classic
        /// table.
        const XREF_STREAM = 1 << 2;
        /// Order output so the first page's objects come first. Mutually
        /// exclusive with every other flag except
        /// `NO_UPDATE_METADATA_DATE`.
        const LINEARIZED = 1 << 3;
        /// Drop structurally identical duplicate objects.
        const REMOVE_REDUNDANT_OBJECTS = 1 << 4;
        /// Do not touch the info dictionary's modification timestamp.
        const NO_UPDATE_METADATA_DATE = 1 << 5;
    }
}

impl SaveFlags {
    /// Reject combinations the format cannot express.
    pub fn validate(self) -> Result<()> {
        if self.contains(SaveFlags::LINEARIZED) {
            let rest = self - SaveFlags::LINEARIZED - SaveFlags::NO_UPDATE_METADATA_DATE;
            if !rest.is_empty() {
                return Err(PdfError::Param(format!(
                    "Linearized save cannot be combined with {rest:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Serialize a single object value (no indirect wrapper).
pub fn serialize_object(object: &Object) -> Vec<u8> {
    let mut out = Vec::new();
    write_object_value(&mut out, object);
    out
}

fn write_object_value(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Real(value) => out.extend_from_slice(format_real(*value).as_bytes()),
        Object::String(bytes) => write_hex_string(out, bytes),
        Object::Name(name) => write_name(out, name),
        Object::Array(elements) => {
            out.push(b'[');
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object_value(out, element);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => {
            write_dictionary(out, stream.dictionary());
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(stream.data());
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference(id) => {
            out.extend_from_slice(format!("{} {} R", id.number(), id.generation()).as_bytes())
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<< ");
    for (key, value) in dict.iter() {
        write_name(out, key);
        out.push(b' ');
        write_object_value(out, value);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for &byte in name.as_bytes() {
        let is_delimiter = matches!(
            byte,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        );
        let is_whitespace = matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ');
        if byte == b'#' || is_delimiter || is_whitespace || !(33..=126).contains(&byte) {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
}

fn write_hex_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'<');
    for byte in bytes {
        out.extend_from_slice(format!("{byte:02X}").as_bytes());
    }
    out.push(b'>');
}

fn format_real(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let mut text = format!("{value:.6}");
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
        text
    }
}

/// Encrypts strings and stream data while objects are serialized. The
/// encryption dictionary object itself stays in the clear.
pub struct Encryptor {
    handler: StandardSecurityHandler,
    file_key: Vec<u8>,
    plaintext_object: Option<ObjectId>,
}

impl Encryptor {
    pub fn new(
        handler: StandardSecurityHandler,
        file_key: Vec<u8>,
        plaintext_object: Option<ObjectId>,
    ) -> Self {
        Self {
            handler,
            file_key,
            plaintext_object,
        }
    }

    /// Clone `object` with every string and stream payload encrypted
    /// under the key for `id`.
    pub fn encrypt_object(&self, id: ObjectId, object: &Object) -> Object {
        if self.plaintext_object == Some(id) {
            return object.clone();
        }
        self.transform(id, object)
    }

    fn transform(&self, id: ObjectId, object: &Object) -> Object {
        match object {
            Object::String(bytes) => {
                Object::String(self.handler.encrypt_bytes(&self.file_key, id, bytes))
            }
            Object::Array(elements) => Object::Array(
                elements
                    .iter()
                    .map(|element| self.transform(id, element))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.transform_dict(id, dict)),
            Object::Stream(stream) => {
                let data = self.handler.encrypt_bytes(&self.file_key, id, stream.data());
                let dict = self.transform_dict(id, stream.dictionary());
                Object::Stream(Stream::with_dictionary(dict, data))
            }
            other => other.clone(),
        }
    }

    fn transform_dict(&self, id: ObjectId, dict: &Dictionary) -> Dictionary {
        dict.iter()
            .map(|(key, value)| (key.clone(), self.transform(id, value)))
            .collect()
    }
}

/// Position-tracking object writer.
pub struct PdfWriter<W: Write> {
    writer: W,
    position: u64,
    entries: BTreeMap<u32, XRefEntry>,
}

impl<W: Write> PdfWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_base_position(writer, 0)
    }

    /// Start counting positions at `base` without emitting the first
    /// `base` bytes. Used when an incremental delta is emitted without
    /// the original bytes it will be appended to.
    pub fn with_base_position(writer: W, base: u64) -> Self {
        Self {
            writer,
            position: base,
            entries: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn write_header(&mut self, version: PdfVersion) -> Result<()> {
        self.write_raw(format!("%PDF-{version}\n").as_bytes())?;
        // Binary marker comment so transports treat the file as binary.
        self.write_raw(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])
    }

    /// Write one indirect object and record its cross-reference entry.
    pub fn write_object(&mut self, id: ObjectId, object: &Object) -> Result<()> {
        self.entries.insert(
            id.number(),
            XRefEntry {
                offset: self.position,
                generation: id.generation(),
                in_use: true,
            },
        );
        self.write_raw(format!("{} {} obj\n", id.number(), id.generation()).as_bytes())?;
        self.write_raw(&serialize_object(object))?;
        self.write_raw(b"\nendobj\n")
    }

    /// Record a freed object in the cross-reference section.
    pub fn mark_free(&mut self, number: u32, generation: u16) {
        self.entries.insert(
            number,
            XRefEntry {
                offset: 0,
                generation,
                in_use: false,
            },
        );
    }

    /// Write the classic xref table, trailer, and file tail. Returns the
    /// xref offset.
    pub fn write_classic_xref(&mut self, trailer: &Dictionary) -> Result<u64> {
        let xref_offset = self.position;
        self.write_raw(b"xref\n")?;

        let numbers: Vec<u32> = self.entries.keys().copied().collect();
        let entries = self.entries.clone();
        let mut run_start = 0usize;
        while run_start < numbers.len() {
            let mut run_end = run_start + 1;
            while run_end < numbers.len() && numbers[run_end] == numbers[run_end - 1] + 1 {
                run_end += 1;
            }
            let count = run_end - run_start;
            self.write_raw(format!("{} {}\n", numbers[run_start], count).as_bytes())?;
            for &number in &numbers[run_start..run_end] {
                let entry = entries[&number];
                let flag = if entry.in_use { 'n' } else { 'f' };
                self.write_raw(
                    format!("{:010} {:05} {} \n", entry.offset, entry.generation, flag).as_bytes(),
                )?;
            }
            run_start = run_end;
        }

        self.write_raw(b"trailer\n")?;
        self.write_raw(&serialize_object(&Object::Dictionary(trailer.clone())))?;
        self.write_tail(xref_offset)?;
        Ok(xref_offset)
    }

    /// Write the cross-reference as a stream object. `stream_id` must be
    /// an unused object number; `trailer` carries the usual trailer keys,
    /// which move into the stream dictionary. Returns the xref offset.
    pub fn write_xref_stream(&mut self, stream_id: ObjectId, trailer: &Dictionary) -> Result<u64> {
        let xref_offset = self.position;
        // The stream indexes itself.
        self.entries.insert(
            stream_id.number(),
            XRefEntry {
                offset: xref_offset,
                generation: stream_id.generation(),
                in_use: true,
            },
        );
        let stream = XRefStreamWriter::build(&self.entries, trailer)?;
        // Bypass write_object: the entry above already points here.
        self.write_raw(
            format!("{} {} obj\n", stream_id.number(), stream_id.generation()).as_bytes(),
        )?;
        self.write_raw(&serialize_object(&Object::Stream(stream)))?;
        self.write_raw(b"\nendobj\n")?;
        self.write_tail(xref_offset)?;
        Ok(xref_offset)
    }

    fn write_tail(&mut self, xref_offset: u64) -> Result<()> {
        self.write_raw(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
