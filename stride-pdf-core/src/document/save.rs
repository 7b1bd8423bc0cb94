//! Progressive document saving
//!
//! A save is planned once (snapshot of the objects to write, trailer
//! record, encryption decision), then emitted in bounded increments: for
//! an incremental save the original bytes are copied through first, then
//! a batch of objects per step, then the cross-reference section in the
//! requested encoding.
//!
//! Partial output from an abandoned save is not cleaned up here; the sink
//! belongs to the caller.

use crate::document::{Document, LoadState};
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::PdfVersion;
use crate::progress::{progress_ratio, ProgressiveTask, StepOutcome};
use crate::writer::{serialize_object, Encryptor, PdfWriter, SaveFlags};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// Objects serialized per `resume` increment.
const OBJECTS_PER_STEP: usize = 8;
/// Original bytes copied per increment of an incremental save.
const COPY_CHUNK: u64 = 64 * 1024;

enum SavePhase {
    Prepare,
    CopyOriginal,
    WriteObjects,
    WriteXref,
}

struct SavePlan {
    order: Vec<ObjectId>,
    objects: BTreeMap<u32, Object>,
    trailer: Dictionary,
    encryptor: Option<Encryptor>,
    incremental: bool,
    version: PdfVersion,
    freed: Vec<(u32, u16)>,
    xref_stream_id: Option<ObjectId>,
    source_len: u64,
}

pub(crate) struct SaveTask {
    doc: Document,
    sink: Option<Box<dyn Write>>,
    flags: SaveFlags,
    phase: SavePhase,
    writer: Option<PdfWriter<Box<dyn Write>>>,
    plan: Option<SavePlan>,
    copy_offset: u64,
    cursor: usize,
    finished: bool,
}

impl SaveTask {
    pub(crate) fn new(doc: Document, sink: Box<dyn Write>, flags: SaveFlags) -> Self {
        Self {
            doc,
            sink: Some(sink),
            flags,
            phase: SavePhase::Prepare,
            writer: None,
            plan: None,
            copy_offset: 0,
            cursor: 0,
            finished: false,
        }
    }

    fn step_prepare(&mut self) -> Result<StepOutcome> {
        let mut inner = self.doc.inner.borrow_mut();

        if !self.flags.contains(SaveFlags::NO_UPDATE_METADATA_DATE) {
            let now = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
            let (_, info) = inner.info_object_mut();
            if info.get("CreationDate").is_none() {
                info.set("CreationDate", Object::string(now.clone()));
            }
            info.set("ModDate", Object::string(now));
        }

        let mut objects = inner.objects.clone();
        let mut freed: Vec<(u32, u16)> =
            inner.freed.iter().map(|(&n, &g)| (n, g)).collect();

        // A security change cannot be expressed as an append: every
        // object's bytes change. Same for a raised file version, which
        // lives in the header.
        let security_changed = inner.pending_security.is_some()
            || (inner.security_removed && inner.encryption.is_some());
        let mut incremental = self.flags.contains(SaveFlags::INCREMENTAL);
        if incremental && (inner.source.is_none() || inner.version_raised || security_changed) {
            tracing::debug!(
                version_raised = inner.version_raised,
                security_changed,
                "incremental save downgraded to full rewrite"
            );
            incremental = false;
        }

        if self.flags.contains(SaveFlags::REMOVE_REDUNDANT_OBJECTS) {
            let mut protected: BTreeSet<u32> = [
                inner.catalog_id.number(),
                inner.pages_root_id.number(),
            ]
            .into_iter()
            .collect();
            protected.extend(inner.pages.iter().map(|id| id.number()));
            protected.extend(inner.info_id.map(|id| id.number()));
            protected.extend(
                inner
                    .encryption
                    .as_ref()
                    .and_then(|enc| enc.encrypt_object)
                    .map(|id| id.number()),
            );
            let removed = crate::operations::dedupe_objects(&mut objects, &protected);
            for number in removed {
                freed.push((number, 1));
            }
            // Deduplication rewrites references, so it forces a rewrite.
            // The snapshot alone is deduplicated; the in-memory document
            // keeps its objects.
            incremental = false;
        }

        // File identifier: keep the loaded first element stable, refresh
        // the second.
        let fingerprint = fingerprint_objects(&objects);
        let id0 = inner.file_id.clone().unwrap_or_else(|| fingerprint.clone());
        if inner.file_id.is_none() {
            inner.file_id = Some(id0.clone());
        }

        // Encryption for this save.
        let mut encryptor = None;
        let mut encrypt_entry: Option<Object> = None;
        if let Some(settings) = inner.pending_security.clone() {
            let (dict, key) = settings.prepare(Some(&id0));
            let number = inner.allocate_number();
            let encrypt_id = ObjectId::new(number, 0);
            objects.insert(number, Object::Dictionary(dict.to_dictionary()));
            encrypt_entry = Some(Object::Reference(encrypt_id));
            encryptor = Some(Encryptor::new(settings.handler(), key, Some(encrypt_id)));
        } else if !inner.security_removed {
            if let Some(loaded) = &inner.encryption {
                let handler = loaded.handler()?;
                match loaded.encrypt_object {
                    Some(encrypt_id) => {
                        encrypt_entry = Some(Object::Reference(encrypt_id));
                        encryptor = Some(Encryptor::new(
                            handler,
                            loaded.file_key.clone(),
                            Some(encrypt_id),
                        ));
                    }
                    None => {
                        encrypt_entry =
                            Some(Object::Dictionary(loaded.dict.to_dictionary()));
                        encryptor =
                            Some(Encryptor::new(handler, loaded.file_key.clone(), None));
                    }
                }
            }
        }

        let order: Vec<ObjectId> = if incremental {
            inner
                .dirty
                .iter()
                .filter(|&&number| objects.contains_key(&number))
                .map(|&number| ObjectId::new(number, inner.generation_of(number)))
                .collect()
        } else if self.flags.contains(SaveFlags::LINEARIZED) {
            linearized_order(&objects, inner.pages.first().copied())
        } else {
            objects.keys().map(|&number| ObjectId::new(number, 0)).collect()
        };

        let max_number = objects.keys().max().copied().unwrap_or(0);
        let xref_stream_id = if self.flags.contains(SaveFlags::XREF_STREAM) {
            let number = inner.allocate_number().max(max_number + 1);
            Some(ObjectId::new(number, 0))
        } else {
            None
        };

        let mut trailer = Dictionary::new();
        let size = xref_stream_id
            .map(|id| id.number())
            .unwrap_or(max_number)
            .max(max_number) as i64
            + 1;
        trailer.set("Size", size);
        trailer.set("Root", inner.catalog_id);
        if let Some(info_id) = inner.info_id {
            trailer.set("Info", info_id);
        }
        trailer.set(
            "ID",
            Object::Array(vec![Object::String(id0), Object::String(fingerprint)]),
        );
        if let Some(entry) = encrypt_entry {
            trailer.set("Encrypt", entry);
        }
        if incremental {
            if let Some(prev) = inner.last_xref_offset {
                trailer.set("Prev", prev as i64);
            }
        }

        let plan = SavePlan {
            order,
            objects,
            trailer,
            encryptor,
            incremental,
            version: inner.version,
            freed,
            xref_stream_id,
            source_len: inner.source_len,
        };

        let sink = self.sink.take().expect("sink consumed twice");
        let mut writer = if plan.incremental && self.flags.contains(SaveFlags::NO_ORIGINAL) {
            PdfWriter::with_base_position(sink, plan.source_len)
        } else {
            PdfWriter::new(sink)
        };

        self.phase = if plan.incremental {
            if self.flags.contains(SaveFlags::NO_ORIGINAL) {
                SavePhase::WriteObjects
            } else {
                SavePhase::CopyOriginal
            }
        } else {
            writer.write_header(plan.version)?;
            SavePhase::WriteObjects
        };

        tracing::debug!(
            objects = plan.order.len(),
            incremental = plan.incremental,
            encrypted = plan.encryptor.is_some(),
            "save planned"
        );
        self.writer = Some(writer);
        self.plan = Some(plan);
        Ok(StepOutcome::Continue(5))
    }

    fn step_copy_original(&mut self) -> Result<StepOutcome> {
        let plan = self.plan.as_ref().expect("save plan missing");
        let total = plan.source_len;
        let writer = self.writer.as_mut().expect("writer missing");

        let remaining = total - self.copy_offset;
        let chunk = remaining.min(COPY_CHUNK);
        if chunk > 0 {
            let mut inner = self.doc.inner.borrow_mut();
            let source = inner
                .source
                .as_mut()
                .ok_or_else(|| PdfError::InvalidState("No source for incremental save".to_string()))?;
            let data = source.read_range(self.copy_offset, chunk as usize)?;
            writer.write_raw(&data)?;
            self.copy_offset += chunk;
        }

        if self.copy_offset == total {
            // Separate the appended revision from the original tail.
            writer.write_raw(b"\n")?;
            self.phase = SavePhase::WriteObjects;
        }
        Ok(StepOutcome::Continue(
            5 + (progress_ratio(self.copy_offset as usize, total as usize) as u32 * 25 / 100) as u8,
        ))
    }

    fn step_write_objects(&mut self) -> Result<StepOutcome> {
        let plan = self.plan.as_ref().expect("save plan missing");
        let writer = self.writer.as_mut().expect("writer missing");
        let total = plan.order.len();
        let batch_end = (self.cursor + OBJECTS_PER_STEP).min(total);

        while self.cursor < batch_end {
            let id = plan.order[self.cursor];
            let object = plan
                .objects
                .get(&id.number())
                .ok_or_else(|| PdfError::Unknown(format!("Planned object {id} vanished")))?;
            match &plan.encryptor {
                Some(encryptor) => {
                    writer.write_object(id, &encryptor.encrypt_object(id, object))?
                }
                None => writer.write_object(id, object)?,
            }
            self.cursor += 1;
        }

        if self.cursor == total {
            self.phase = SavePhase::WriteXref;
        }
        Ok(StepOutcome::Continue(
            30 + (progress_ratio(self.cursor, total) as u32 * 65 / 100) as u8,
        ))
    }

    fn step_write_xref(&mut self) -> Result<StepOutcome> {
        let plan = self.plan.as_ref().expect("save plan missing");
        let mut writer = self.writer.take().expect("writer missing");

        if !plan.incremental {
            writer.mark_free(0, 65535);
        }
        for &(number, generation) in &plan.freed {
            writer.mark_free(number, generation);
        }

        match plan.xref_stream_id {
            Some(stream_id) => writer.write_xref_stream(stream_id, &plan.trailer)?,
            None => writer.write_classic_xref(&plan.trailer)?,
        };
        writer.finish()?;

        self.finished = true;
        self.doc.inner.borrow_mut().state = LoadState::Loaded;
        Ok(StepOutcome::Finished)
    }

    fn step_inner(&mut self) -> Result<StepOutcome> {
        match self.phase {
            SavePhase::Prepare => self.step_prepare(),
            SavePhase::CopyOriginal => self.step_copy_original(),
            SavePhase::WriteObjects => self.step_write_objects(),
            SavePhase::WriteXref => self.step_write_xref(),
        }
    }
}

impl ProgressiveTask for SaveTask {
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

impl Drop for SaveTask {
    /// An abandoned save leaves the document usable again. The document's
    /// content was never touched; only the sink holds partial output, and
    /// that is the caller's to clean up.
    fn drop(&mut self) {
        if !self.finished {
            let mut inner = self.doc.inner.borrow_mut();
            if inner.state == LoadState::Saving {
                inner.state = LoadState::Loaded;
            }
        }
    }
}

/// Stable 16-byte digest of the object table, used for the file
/// identifier.
fn fingerprint_objects(objects: &BTreeMap<u32, Object>) -> Vec<u8> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    for (number, object) in objects {
        hasher.update(number.to_le_bytes());
        hasher.update(serialize_object(object));
    }
    hasher.finalize()[..16].to_vec()
}

/// Object order for a linearized-layout save: the first page and
/// everything it references come first, the rest in ascending order.
fn linearized_order(
    objects: &BTreeMap<u32, Object>,
    first_page: Option<ObjectId>,
) -> Vec<ObjectId> {
    let mut front = Vec::new();
    let mut seen = BTreeSet::new();

    if let Some(first_page) = first_page {
        let mut queue = vec![first_page];
        while let Some(id) = queue.pop() {
            if !seen.insert(id.number()) || !objects.contains_key(&id.number()) {
                continue;
            }
            front.push(id);
            if let Some(object) = objects.get(&id.number()) {
                let mut refs = Vec::new();
                collect_references(object, &mut refs);
                queue.extend(refs);
            }
        }
    }

    for &number in objects.keys() {
        if !seen.contains(&number) {
            front.push(ObjectId::new(number, 0));
        }
    }
    front
}

/// References inside an object value. The `Parent` back-pointer is
/// skipped: following it from a page would drag the whole tree forward
/// and defeat the first-page-first layout.
fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(elements) => {
            for element in elements {
                collect_references(element, out);
            }
        }
        Object::Dictionary(dict) => {
            for (key, value) in dict.iter() {
                if key != "Parent" {
                    collect_references(value, out);
                }
            }
        }
        Object::Stream(stream) => {
            for (key, value) in stream.dictionary().iter() {
                if key != "Parent" {
                    collect_references(value, out);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let mut objects = BTreeMap::new();
        objects.insert(1, Object::Integer(5));
        let a = fingerprint_objects(&objects);
        let b = fingerprint_objects(&objects);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        objects.insert(1, Object::Integer(6));
        assert_ne!(fingerprint_objects(&objects), a);
    }

    #[test]
    fn test_linearized_order_puts_first_page_first() {
        let mut objects = BTreeMap::new();
        objects.insert(1, Object::Dictionary(Dictionary::new())); // catalog
        objects.insert(2, Object::Dictionary(Dictionary::new())); // pages root

        let mut page = Dictionary::new();
        page.set("Parent", ObjectId::new(2, 0));
        page.set("Contents", ObjectId::new(7, 0));
        objects.insert(5, Object::Dictionary(page));
        objects.insert(7, Object::string("content"));

        let order = linearized_order(&objects, Some(ObjectId::new(5, 0)));
        let numbers: Vec<u32> = order.iter().map(|id| id.number()).collect();
        assert_eq!(numbers[0], 5);
        assert!(numbers[1] == 7);
        // Parent was not followed.
        assert_eq!(numbers.len(), 4);
        assert_eq!(&numbers[2..], &[1, 2]);
    }

    #[test]
    fn test_collect_references_skips_parent() {
        let mut dict = Dictionary::new();
        dict.set("Parent", ObjectId::new(2, 0));
        dict.set("Next", ObjectId::new(3, 0));
        let mut refs = Vec::new();
        collect_references(&Object::Dictionary(dict), &mut refs);
        assert_eq!(refs, vec![ObjectId::new(3, 0)]);
    }
}
