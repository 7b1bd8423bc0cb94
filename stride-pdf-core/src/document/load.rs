//! Progressive document loading
//!
//! Loading is one task advanced in bounded increments: header, xref
//! discovery, one xref section per step (following `/Prev` through prior
//! revisions), password authentication, then a batch of objects per step,
//! and finally the page tree walk. Every increment reads a bounded byte
//! range through the [`ByteSource`], so a partially-downloaded source
//! surfaces [`crate::PdfError::DataNotReady`] at the exact increment that
//! needs the missing range, and the identical call can be retried after
//! the bytes arrive.

use crate::document::{Document, LoadState, LoadedEncryption};
use crate::encryption::{EncryptionDictionary, PasswordType, StandardSecurityHandler};
use crate::error::{PdfError, Result};
use crate::io::ByteSource;
use crate::objects::{Dictionary, Object, ObjectId, Stream};
use crate::parser::{self, PdfVersion, XRefEntry};
use crate::progress::{progress_ratio, ProgressiveTask, StepOutcome};
use std::collections::BTreeMap;

/// Objects parsed per `resume` increment.
const OBJECTS_PER_STEP: usize = 16;
/// Window scanned at the end of the file for `startxref`.
const TAIL_WINDOW: u64 = 1024;
/// Revision chain length guard.
const MAX_REVISIONS: usize = 512;

/// Options for loading.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Pre-materialize every stream's decoded bytes while loading. Purely
    /// a memory-for-speed trade; behavior is otherwise identical.
    pub cache_streams: bool,
}

impl LoadOptions {
    pub fn with_cache_streams(mut self, cache_streams: bool) -> Self {
        self.cache_streams = cache_streams;
        self
    }
}

enum LoadPhase {
    Header,
    LocateXref,
    ReadXrefChain,
    Authenticate,
    ReadObjects,
    BuildPages,
}

pub(crate) struct LoadTask {
    doc: Document,
    source: Option<Box<dyn ByteSource>>,
    password: String,
    options: LoadOptions,
    phase: LoadPhase,

    source_len: u64,
    version: PdfVersion,
    startxref: u64,
    next_xref: Option<u64>,
    visited_xrefs: Vec<u64>,
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Option<Dictionary>,
    /// (number, offset, end) for every in-use object, ascending by offset.
    extents: Vec<(u32, u64, u64)>,
    cursor: usize,
    encryption: Option<LoadedEncryption>,
}

impl LoadTask {
    pub(crate) fn new(
        doc: Document,
        source: Box<dyn ByteSource>,
        password: String,
        options: LoadOptions,
    ) -> Self {
        Self {
            doc,
            source: Some(source),
            password,
            options,
            phase: LoadPhase::Header,
            source_len: 0,
            version: PdfVersion::new(1, 7),
            startxref: 0,
            next_xref: None,
            visited_xrefs: Vec::new(),
            entries: BTreeMap::new(),
            trailer: None,
            extents: Vec::new(),
            cursor: 0,
            encryption: None,
        }
    }

    fn source(&mut self) -> &mut dyn ByteSource {
        self.source
            .as_mut()
            .expect("byte source taken before load finished")
            .as_mut()
    }

    fn step_header(&mut self) -> Result<StepOutcome> {
        self.source_len = self.source().len()?;
        if self.source_len < 32 {
            return Err(PdfError::Format("File too short to be a PDF".to_string()));
        }
        let head = self.source().read_range(0, 16)?;
        self.version = parser::parse_header(&head)?;
        tracing::debug!(version = %self.version, len = self.source_len, "header parsed");
        self.phase = LoadPhase::LocateXref;
        Ok(StepOutcome::Continue(3))
    }

    fn step_locate_xref(&mut self) -> Result<StepOutcome> {
        let window = TAIL_WINDOW.min(self.source_len);
        let offset = self.source_len - window;
        let tail = self.source().read_range(offset, window as usize)?;
        self.startxref = parser::find_startxref(&tail)?;
        if self.startxref >= self.source_len {
            return Err(PdfError::Format(format!(
                "startxref offset {} past end of file",
                self.startxref
            )));
        }
        self.next_xref = Some(self.startxref);
        self.phase = LoadPhase::ReadXrefChain;
        Ok(StepOutcome::Continue(6))
    }

    fn step_xref_chain(&mut self) -> Result<StepOutcome> {
        let offset = match self.next_xref {
            Some(offset) => offset,
            None => {
                self.compute_extents();
                self.phase = LoadPhase::Authenticate;
                return Ok(StepOutcome::Continue(18));
            }
        };
        if self.visited_xrefs.contains(&offset) || self.visited_xrefs.len() >= MAX_REVISIONS {
            return Err(PdfError::Format(
                "Cross-reference chain loops".to_string(),
            ));
        }
        if offset >= self.source_len {
            return Err(PdfError::Format(format!(
                "Cross-reference offset {offset} past end of file"
            )));
        }

        let read_len = (self.source_len - offset) as usize;
        let data = self.source().read_range(offset, read_len)?;
        let section = parser::parse_section(&data)?;

        self.visited_xrefs.push(offset);
        self.next_xref = section.prev();
        section.merge_into(&mut self.entries);
        if self.trailer.is_none() {
            self.trailer = Some(section.trailer.clone());
        }
        tracing::debug!(
            offset,
            entries = section.entries.len(),
            "xref section parsed"
        );
        Ok(StepOutcome::Continue(
            (6 + 2 * self.visited_xrefs.len()).min(16) as u8,
        ))
    }

    fn compute_extents(&mut self) {
        let mut boundaries: Vec<u64> = self
            .entries
            .values()
            .filter(|entry| entry.in_use)
            .map(|entry| entry.offset)
            .chain(self.visited_xrefs.iter().copied())
            .collect();
        boundaries.push(self.source_len);
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut extents: Vec<(u32, u64, u64)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.in_use)
            .map(|(&number, entry)| {
                let end = boundaries
                    .iter()
                    .find(|&&b| b > entry.offset)
                    .copied()
                    .unwrap_or(self.source_len);
                (number, entry.offset, end)
            })
            .collect();
        extents.sort_by_key(|&(_, offset, _)| offset);
        self.extents = extents;
    }

    fn step_authenticate(&mut self) -> Result<StepOutcome> {
        let trailer = self
            .trailer
            .as_ref()
            .ok_or_else(|| PdfError::Format("Missing trailer".to_string()))?
            .clone();

        let file_id = trailer
            .get("ID")
            .and_then(|id| id.as_array())
            .and_then(|ids| ids.first())
            .and_then(|first| first.as_string_bytes())
            .map(|bytes| bytes.to_vec());

        let encrypt_entry = trailer.get("Encrypt").cloned();
        if let Some(encrypt_entry) = encrypt_entry {
            let (encrypt_object, encrypt_dict) = match encrypt_entry {
                Object::Reference(id) => {
                    let object = self.read_object_at_entry(id.number())?;
                    let dict = object
                        .as_dict()
                        .cloned()
                        .ok_or_else(|| {
                            PdfError::Format("Encrypt entry is not a dictionary".to_string())
                        })?;
                    (Some(id), dict)
                }
                Object::Dictionary(dict) => (None, dict),
                _ => {
                    return Err(PdfError::Format(
                        "Encrypt entry is not a dictionary".to_string(),
                    ))
                }
            };

            let dict = EncryptionDictionary::from_dictionary(&encrypt_dict)?;
            let handler = StandardSecurityHandler::from_revision(dict.r, dict.length)?;
            let permissions = dict.permissions();
            let id_ref = file_id.as_deref();

            let (password_type, file_key) = if let Some(key) =
                handler.owner_file_key(&self.password, &dict.o, &dict.u, permissions, id_ref)
            {
                (PasswordType::Owner, key)
            } else if handler.authenticate_user_password(
                &self.password,
                &dict.o,
                &dict.u,
                permissions,
                id_ref,
            ) {
                let key =
                    handler.compute_encryption_key(&self.password, &dict.o, permissions, id_ref);
                (PasswordType::User, key)
            } else {
                return Err(PdfError::Password);
            };

            tracing::debug!(?password_type, revision = dict.r, "password accepted");
            self.encryption = Some(LoadedEncryption {
                dict,
                file_key,
                password_type,
                encrypt_object,
            });
        }

        {
            let mut inner = self.doc.inner.borrow_mut();
            inner.file_id = file_id;
        }
        self.phase = LoadPhase::ReadObjects;
        Ok(StepOutcome::Continue(20))
    }

    fn read_object_at_entry(&mut self, number: u32) -> Result<Object> {
        let &(_, offset, end) = self
            .extents
            .iter()
            .find(|&&(n, _, _)| n == number)
            .ok_or_else(|| {
                PdfError::Format(format!("Object {number} missing from cross-reference"))
            })?;
        let data = self.source().read_range(offset, (end - offset) as usize)?;
        let (id, object) = parser::parse_indirect_object(&mut parser::Lexer::new(&data))?;
        if id.number() != number {
            return Err(PdfError::Format(format!(
                "Cross-reference names object {number} but found {id}"
            )));
        }
        Ok(object)
    }

    fn step_read_objects(&mut self) -> Result<StepOutcome> {
        let total = self.extents.len();
        let batch_end = (self.cursor + OBJECTS_PER_STEP).min(total);

        while self.cursor < batch_end {
            let (number, offset, end) = self.extents[self.cursor];
            let data = self.source().read_range(offset, (end - offset) as usize)?;
            let (id, mut object) =
                parser::parse_indirect_object(&mut parser::Lexer::new(&data))?;
            if id.number() != number {
                return Err(PdfError::Format(format!(
                    "Cross-reference names object {number} but found {id}"
                )));
            }

            // Cross-reference streams describe the file layout, not the
            // document; they are not carried into the object table.
            if object.as_dict().and_then(|dict| dict.get_name("Type")) == Some("XRef") {
                self.cursor += 1;
                continue;
            }

            if let Some(encryption) = &self.encryption {
                if encryption.encrypt_object != Some(id) {
                    let handler = encryption.handler()?;
                    object = decrypt_object(&handler, &encryption.file_key, id, &object);
                }
            }
            if self.options.cache_streams {
                if let Object::Stream(stream) = &mut object {
                    stream.cache_decoded()?;
                }
            }

            let mut inner = self.doc.inner.borrow_mut();
            inner.objects.insert(number, object);
            if id.generation() != 0 {
                inner.generations.insert(number, id.generation());
            }
            self.cursor += 1;
        }

        if self.cursor == total {
            self.phase = LoadPhase::BuildPages;
        }
        Ok(StepOutcome::Continue(
            20 + (progress_ratio(self.cursor, total) as u32 * 75 / 100) as u8,
        ))
    }

    fn step_build_pages(&mut self) -> Result<StepOutcome> {
        let trailer = self
            .trailer
            .take()
            .ok_or_else(|| PdfError::Format("Missing trailer".to_string()))?;
        let root_id = trailer
            .get_reference("Root")
            .ok_or_else(|| PdfError::Format("Trailer has no /Root".to_string()))?;
        let info_id = trailer.get_reference("Info");

        let mut inner = self.doc.inner.borrow_mut();

        let catalog = inner
            .objects
            .get(&root_id.number())
            .and_then(|obj| obj.as_dict())
            .ok_or_else(|| PdfError::Format("Catalog missing or not a dictionary".to_string()))?;
        let pages_root_id = catalog
            .get_reference("Pages")
            .ok_or_else(|| PdfError::Format("Catalog has no /Pages".to_string()))?;

        let pages = collect_pages(&inner.objects, pages_root_id)?;
        tracing::debug!(pages = pages.len(), "page tree walked");

        inner.catalog_id = root_id;
        inner.pages_root_id = pages_root_id;
        inner.info_id = info_id;
        inner.pages = pages;
        inner.version = self.version;
        inner.next_number = inner.objects.keys().max().copied().unwrap_or(0) + 1;
        inner.last_xref_offset = Some(self.startxref);
        inner.encryption = self.encryption.take();
        inner.cache_streams = self.options.cache_streams;
        inner.source_len = self.source_len;
        inner.source = self.source.take();
        inner.dirty.clear();
        inner.state = LoadState::Loaded;
        Ok(StepOutcome::Finished)
    }

    fn step_inner(&mut self) -> Result<StepOutcome> {
        match self.phase {
            LoadPhase::Header => self.step_header(),
            LoadPhase::LocateXref => self.step_locate_xref(),
            LoadPhase::ReadXrefChain => self.step_xref_chain(),
            LoadPhase::Authenticate => self.step_authenticate(),
            LoadPhase::ReadObjects => self.step_read_objects(),
            LoadPhase::BuildPages => self.step_build_pages(),
        }
    }
}

impl ProgressiveTask for LoadTask {
    fn step(&mut self) -> Result<StepOutcome> {
        match self.step_inner() {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if !err.is_recoverable() {
                    self.doc.inner.borrow_mut().state = LoadState::Failed;
                }
                Err(err)
            }
        }
    }
}

/// Depth-first page tree walk, in display order.
fn collect_pages(
    objects: &BTreeMap<u32, Object>,
    root: ObjectId,
) -> Result<Vec<ObjectId>> {
    const MAX_DEPTH: usize = 64;
    let mut pages = Vec::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((node_id, depth)) = stack.pop() {
        if depth > MAX_DEPTH {
            return Err(PdfError::Format("Page tree too deep".to_string()));
        }
        let node = objects
            .get(&node_id.number())
            .and_then(|obj| obj.as_dict())
            .ok_or_else(|| {
                PdfError::Format(format!("Page tree node {node_id} missing"))
            })?;
        match node.get_name("Type") {
            Some("Pages") => {
                let kids = node
                    .get("Kids")
                    .and_then(|kids| kids.as_array())
                    .ok_or_else(|| PdfError::Format("Pages node has no /Kids".to_string()))?;
                // Reverse so the stack pops kids in document order.
                for kid in kids.iter().rev() {
                    let kid_id = kid.as_reference().ok_or_else(|| {
                        PdfError::Format("Page tree kid is not a reference".to_string())
                    })?;
                    stack.push((kid_id, depth + 1));
                }
            }
            Some("Page") => pages.push(node_id),
            other => {
                return Err(PdfError::Format(format!(
                    "Unexpected page tree node type {other:?}"
                )))
            }
        }
    }
    Ok(pages)
}

/// Recursively decrypt the strings and stream payloads of one object.
fn decrypt_object(
    handler: &StandardSecurityHandler,
    file_key: &[u8],
    id: ObjectId,
    object: &Object,
) -> Object {
    match object {
        Object::String(bytes) => Object::String(handler.decrypt_bytes(file_key, id, bytes)),
        Object::Array(elements) => Object::Array(
            elements
                .iter()
                .map(|element| decrypt_object(handler, file_key, id, element))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(decrypt_dict(handler, file_key, id, dict)),
        Object::Stream(stream) => {
            let data = handler.decrypt_bytes(file_key, id, stream.data());
            let dict = decrypt_dict(handler, file_key, id, stream.dictionary());
            Object::Stream(Stream::with_dictionary(dict, data))
        }
        other => other.clone(),
    }
}

fn decrypt_dict(
    handler: &StandardSecurityHandler,
    file_key: &[u8],
    id: ObjectId,
    dict: &Dictionary,
) -> Dictionary {
    dict.iter()
        .map(|(key, value)| (key.clone(), decrypt_object(handler, file_key, id, value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_pages_flat_tree() {
        let mut objects = BTreeMap::new();
        let mut root = Dictionary::new();
        root.set("Type", Object::name("Pages"));
        root.set(
            "Kids",
            Object::Array(vec![
                Object::Reference(ObjectId::new(3, 0)),
                Object::Reference(ObjectId::new(4, 0)),
            ]),
        );
        root.set("Count", 2);
        objects.insert(2, Object::Dictionary(root));
        for number in [3u32, 4] {
            let mut page = Dictionary::new();
            page.set("Type", Object::name("Page"));
            objects.insert(number, Object::Dictionary(page));
        }

        let pages = collect_pages(&objects, ObjectId::new(2, 0)).unwrap();
        assert_eq!(pages, vec![ObjectId::new(3, 0), ObjectId::new(4, 0)]);
    }

    #[test]
    fn test_collect_pages_nested_tree() {
        let mut objects = BTreeMap::new();

        let mut root = Dictionary::new();
        root.set("Type", Object::name("Pages"));
        root.set(
            "Kids",
            Object::Array(vec![
                Object::Reference(ObjectId::new(3, 0)),
                Object::Reference(ObjectId::new(10, 0)),
            ]),
        );
        objects.insert(2, Object::Dictionary(root));

        let mut inner_node = Dictionary::new();
        inner_node.set("Type", Object::name("Pages"));
        inner_node.set(
            "Kids",
            Object::Array(vec![
                Object::Reference(ObjectId::new(4, 0)),
                Object::Reference(ObjectId::new(5, 0)),
            ]),
        );
        objects.insert(3, Object::Dictionary(inner_node));

        for number in [4u32, 5, 10] {
            let mut page = Dictionary::new();
            page.set("Type", Object::name("Page"));
            objects.insert(number, Object::Dictionary(page));
        }

        let pages = collect_pages(&objects, ObjectId::new(2, 0)).unwrap();
        assert_eq!(
            pages,
            vec![
                ObjectId::new(4, 0),
                ObjectId::new(5, 0),
                ObjectId::new(10, 0)
            ]
        );
    }

    #[test]
    fn test_collect_pages_missing_node_is_format_error() {
        let objects = BTreeMap::new();
        assert!(matches!(
            collect_pages(&objects, ObjectId::new(2, 0)),
            Err(PdfError::Format(_))
        ));
    }
}
