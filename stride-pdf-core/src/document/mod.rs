//! Document sessions
//!
//! A [`Document`] owns the mutable object graph of one PDF: the indirect
//! object table, the trailer record, the page list, and the
//! password/encryption state. It is a shared handle — `clone` is shallow
//! and equality compares identity, not content — so progressive load and
//! save operations can hold the document they work on while the caller
//! keeps its own handle.
//!
//! Lifecycle: a document is *unloaded* (while a progressive load is still
//! running it is *loading*), then *loaded*, or *failed*. Most operations
//! require the loaded state and fail with
//! [`crate::PdfError::InvalidState`] otherwise. Saving never transitions a
//! loaded document away from loaded on success; it is a side-effecting
//! export.
//!
//! A single document must be driven from one thread; handles are not
//! `Send`, which makes the cooperative single-threaded model a
//! compile-time guarantee rather than a documentation footnote.

mod load;
mod save;

pub use load::LoadOptions;

use crate::encryption::{
    EncryptType, EncryptionDictionary, PasswordType, SecuritySettings, StandardSecurityHandler,
};
use crate::error::{PdfError, Result};
use crate::io::{ByteSource, FileSource, MemorySource};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::PdfVersion;
use crate::progress::{PauseHandler, Progressive};
use crate::writer::SaveFlags;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Saving,
    Failed,
}

/// Encryption state carried over from loading an encrypted file.
pub(crate) struct LoadedEncryption {
    pub(crate) dict: EncryptionDictionary,
    pub(crate) file_key: Vec<u8>,
    pub(crate) password_type: PasswordType,
    /// Object holding the encryption dictionary, kept in the clear.
    pub(crate) encrypt_object: Option<ObjectId>,
}

impl LoadedEncryption {
    pub(crate) fn handler(&self) -> Result<StandardSecurityHandler> {
        StandardSecurityHandler::from_revision(self.dict.r, self.dict.length)
    }
}

pub(crate) struct DocumentInner {
    pub(crate) state: LoadState,
    pub(crate) version: PdfVersion,
    pub(crate) version_raised: bool,
    pub(crate) objects: BTreeMap<u32, Object>,
    pub(crate) generations: BTreeMap<u32, u16>,
    pub(crate) next_number: u32,
    pub(crate) dirty: BTreeSet<u32>,
    pub(crate) freed: BTreeMap<u32, u16>,
    pub(crate) catalog_id: ObjectId,
    pub(crate) pages_root_id: ObjectId,
    pub(crate) info_id: Option<ObjectId>,
    pub(crate) pages: Vec<ObjectId>,
    pub(crate) file_id: Option<Vec<u8>>,
    pub(crate) encryption: Option<LoadedEncryption>,
    pub(crate) pending_security: Option<SecuritySettings>,
    pub(crate) security_removed: bool,
    pub(crate) cache_streams: bool,
    pub(crate) source: Option<Box<dyn ByteSource>>,
    pub(crate) source_len: u64,
    pub(crate) source_path: Option<PathBuf>,
    pub(crate) last_xref_offset: Option<u64>,
}

impl DocumentInner {
    fn new_editable() -> Self {
        let catalog_id = ObjectId::new(1, 0);
        let pages_root_id = ObjectId::new(2, 0);

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", pages_root_id);

        let mut pages_root = Dictionary::new();
        pages_root.set("Type", Object::name("Pages"));
        pages_root.set("Kids", Object::Array(Vec::new()));
        pages_root.set("Count", 0);

        let mut objects = BTreeMap::new();
        objects.insert(catalog_id.number(), Object::Dictionary(catalog));
        objects.insert(pages_root_id.number(), Object::Dictionary(pages_root));

        Self {
            state: LoadState::Loaded,
            version: PdfVersion::new(1, 7),
            version_raised: false,
            dirty: objects.keys().copied().collect(),
            objects,
            generations: BTreeMap::new(),
            next_number: 3,
            freed: BTreeMap::new(),
            catalog_id,
            pages_root_id,
            info_id: None,
            pages: Vec::new(),
            file_id: None,
            encryption: None,
            pending_security: None,
            security_removed: false,
            cache_streams: false,
            source: None,
            source_len: 0,
            source_path: None,
            last_xref_offset: None,
        }
    }

    fn new_unloaded() -> Self {
        let mut inner = Self::new_editable();
        inner.state = LoadState::Unloaded;
        inner.objects.clear();
        inner.dirty.clear();
        inner.next_number = 1;
        inner
    }

    pub(crate) fn require_loaded(&self) -> Result<()> {
        match self.state {
            LoadState::Loaded => Ok(()),
            other => Err(PdfError::InvalidState(format!(
                "Operation requires a loaded document (state: {other:?})"
            ))),
        }
    }

    pub(crate) fn generation_of(&self, number: u32) -> u16 {
        self.generations.get(&number).copied().unwrap_or(0)
    }

    pub(crate) fn allocate_number(&mut self) -> u32 {
        let number = self.next_number;
        self.next_number += 1;
        number
    }

    /// Rewrite the flat page tree objects from the `pages` list.
    pub(crate) fn sync_page_tree(&mut self) {
        let kids: Vec<Object> = self.pages.iter().map(|&id| Object::Reference(id)).collect();
        let count = self.pages.len() as i64;
        let root_id = self.pages_root_id;

        if let Some(root) = self
            .objects
            .get_mut(&root_id.number())
            .and_then(|obj| obj.as_dict_mut())
        {
            root.set("Kids", Object::Array(kids));
            root.set("Count", count);
        }
        self.dirty.insert(root_id.number());

        for &page_id in &self.pages.clone() {
            if let Some(page) = self
                .objects
                .get_mut(&page_id.number())
                .and_then(|obj| obj.as_dict_mut())
            {
                if page.get_reference("Parent") != Some(root_id) {
                    page.set("Parent", root_id);
                    self.dirty.insert(page_id.number());
                }
            }
        }
    }

    /// The info dictionary object, created on first use.
    pub(crate) fn info_object_mut(&mut self) -> (ObjectId, &mut Dictionary) {
        let id = match self.info_id {
            Some(id) => id,
            None => {
                let id = ObjectId::new(self.allocate_number(), 0);
                self.objects
                    .insert(id.number(), Object::Dictionary(Dictionary::new()));
                self.info_id = Some(id);
                id
            }
        };
        self.dirty.insert(id.number());
        let dict = self
            .objects
            .get_mut(&id.number())
            .and_then(|obj| obj.as_dict_mut())
            .expect("info object is a dictionary");
        (id, dict)
    }
}

/// A PDF document session. See the module docs for lifecycle and
/// threading rules.
pub struct Document {
    pub(crate) inner: Rc<RefCell<DocumentInner>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("state", &self.inner.borrow().state)
            .finish_non_exhaustive()
    }
}

impl Clone for Document {
    /// Shallow: both handles alias the same document.
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl PartialEq for Document {
    /// Identity, not structural equality: two handles are equal when they
    /// alias the same underlying document.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Document {}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A fresh, empty, editable document with an empty page list.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DocumentInner::new_editable())),
        }
    }

    pub(crate) fn new_loading() -> Self {
        let doc = Self {
            inner: Rc::new(RefCell::new(DocumentInner::new_unloaded())),
        };
        doc.inner.borrow_mut().state = LoadState::Loading;
        doc
    }

    pub fn state(&self) -> LoadState {
        self.inner.borrow().state
    }

    // ----- Loading -------------------------------------------------------

    /// Load a document from a file, driving the progressive load to
    /// completion. An empty password means "no password".
    pub fn load_from_path(path: impl AsRef<Path>, password: &str) -> Result<Document> {
        let source = FileSource::open(path.as_ref())?;
        let doc = Self::load_from_source(Box::new(source), password, LoadOptions::default())?;
        doc.inner.borrow_mut().source_path = Some(path.as_ref().to_path_buf());
        Ok(doc)
    }

    /// Load a document from bytes already in memory.
    pub fn load_from_memory(data: Vec<u8>, password: &str) -> Result<Document> {
        Self::load_from_source(
            Box::new(MemorySource::new(data)),
            password,
            LoadOptions::default(),
        )
    }

    /// Load from any byte source, driving the progressive load to
    /// completion.
    pub fn load_from_source(
        source: Box<dyn ByteSource>,
        password: &str,
        options: LoadOptions,
    ) -> Result<Document> {
        let (doc, mut operation) = Self::start_load(source, password, options, None);
        operation.run_to_completion()?;
        Ok(doc)
    }

    /// Begin a progressive load. Drive the returned operation with
    /// [`Progressive::resume`] until its rate reaches 100; the document
    /// handle becomes loaded at that point. A
    /// [`crate::PdfError::DataNotReady`] from `resume` means the source
    /// needs more bytes — feed it and resume again.
    pub fn start_load(
        source: Box<dyn ByteSource>,
        password: &str,
        options: LoadOptions,
        pause: Option<Rc<dyn PauseHandler>>,
    ) -> (Document, Progressive) {
        let doc = Document::new_loading();
        let task = load::LoadTask::new(doc.clone(), source, password.to_string(), options);
        (doc, Progressive::new(Box::new(task), pause))
    }

    // ----- Saving --------------------------------------------------------

    /// Save to a file, driving the progressive save to completion.
    ///
    /// Saving onto the file the document was loaded from is rejected: the
    /// session may still hold read handles on that file. Save to a
    /// temporary path, release the session, then swap.
    pub fn save_as_path(&self, path: impl AsRef<Path>, flags: SaveFlags) -> Result<()> {
        let mut operation = self.start_save_as_path(path, flags)?;
        operation.run_to_completion()
    }

    /// Save into any writer, driving the progressive save to completion.
    pub fn save_to_writer<W: std::io::Write + 'static>(
        &self,
        sink: W,
        flags: SaveFlags,
    ) -> Result<()> {
        let mut operation = self.start_save_as(Box::new(sink), flags, None)?;
        operation.run_to_completion()
    }

    pub fn start_save_as_path(
        &self,
        path: impl AsRef<Path>,
        flags: SaveFlags,
    ) -> Result<Progressive> {
        self.reject_self_overwrite(path.as_ref())?;
        let file = std::fs::File::create(path.as_ref())?;
        self.start_save_as(Box::new(std::io::BufWriter::new(file)), flags, None)
    }

    /// Begin a progressive save into `sink`.
    pub fn start_save_as(
        &self,
        sink: Box<dyn std::io::Write>,
        flags: SaveFlags,
        pause: Option<Rc<dyn PauseHandler>>,
    ) -> Result<Progressive> {
        flags.validate()?;
        {
            let mut inner = self.inner.borrow_mut();
            inner.require_loaded()?;
            inner.state = LoadState::Saving;
        }
        let task = save::SaveTask::new(self.clone(), sink, flags);
        Ok(Progressive::new(Box::new(task), pause))
    }

    fn reject_self_overwrite(&self, path: &Path) -> Result<()> {
        let inner = self.inner.borrow();
        if let Some(source_path) = &inner.source_path {
            let same = match (path.canonicalize(), source_path.canonicalize()) {
                (Ok(a), Ok(b)) => a == b,
                _ => path == source_path.as_path(),
            };
            if same {
                return Err(PdfError::Param(format!(
                    "Cannot save over the loaded source file {}",
                    source_path.display()
                )));
            }
        }
        Ok(())
    }

    // ----- Object table --------------------------------------------------

    /// Register a direct object in the object table and return its new
    /// object number. Passing a reference to an object already in the
    /// table returns that number unchanged — an object cannot become
    /// indirect twice.
    pub fn add_indirect_object(&self, object: Object) -> Result<ObjectId> {
        let mut inner = self.inner.borrow_mut();
        inner.require_loaded()?;
        if let Object::Reference(id) = &object {
            if inner.objects.contains_key(&id.number()) {
                return Ok(*id);
            }
            return Err(PdfError::Param(format!(
                "Reference {id} does not name an object in this document"
            )));
        }
        let number = inner.allocate_number();
        inner.objects.insert(number, object);
        inner.dirty.insert(number);
        Ok(ObjectId::new(number, 0))
    }

    pub fn get_indirect_object(&self, number: u32) -> Option<Object> {
        self.inner.borrow().objects.get(&number).cloned()
    }

    /// Replace an object in the table.
    pub fn set_indirect_object(&self, id: ObjectId, object: Object) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.require_loaded()?;
        if !inner.objects.contains_key(&id.number()) {
            return Err(PdfError::Param(format!(
                "Object {id} does not exist in this document"
            )));
        }
        inner.objects.insert(id.number(), object);
        inner.dirty.insert(id.number());
        Ok(())
    }

    pub fn delete_indirect_object(&self, number: u32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.require_loaded()?;
        if number == inner.catalog_id.number() || number == inner.pages_root_id.number() {
            return Err(PdfError::Param(format!(
                "Object {number} is structural and cannot be deleted"
            )));
        }
        if inner.objects.remove(&number).is_none() {
            return Err(PdfError::Param(format!(
                "Object {number} does not exist in this document"
            )));
        }
        let generation = inner.generation_of(number).saturating_add(1);
        inner.freed.insert(number, generation);
        inner.dirty.remove(&number);
        if let Some(position) = inner.pages.iter().position(|id| id.number() == number) {
            inner.pages.remove(position);
            inner.sync_page_tree();
        }
        Ok(())
    }

    pub fn object_count(&self) -> usize {
        self.inner.borrow().objects.len()
    }

    // ----- Pages ---------------------------------------------------------

    pub fn page_count(&self) -> Result<usize> {
        let inner = self.inner.borrow();
        inner.require_loaded()?;
        Ok(inner.pages.len())
    }

    /// Insert a blank page of the given size (in points) at `index`.
    pub fn insert_page(&self, index: usize, width: f64, height: f64) -> Result<ObjectId> {
        let mut inner = self.inner.borrow_mut();
        inner.require_loaded()?;
        if index > inner.pages.len() {
            return Err(PdfError::Param(format!(
                "Page index {index} out of bounds (document has {} pages)",
                inner.pages.len()
            )));
        }
        if !(width > 0.0 && height > 0.0) {
            return Err(PdfError::Param(format!(
                "Invalid page size {width}x{height}"
            )));
        }

        let mut page = Dictionary::new();
        page.set("Type", Object::name("Page"));
        page.set("Parent", inner.pages_root_id);
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width),
                Object::Real(height),
            ]),
        );

        let number = inner.allocate_number();
        let id = ObjectId::new(number, 0);
        inner.objects.insert(number, Object::Dictionary(page));
        inner.dirty.insert(number);
        inner.pages.insert(index, id);
        inner.sync_page_tree();
        Ok(id)
    }

    pub fn remove_page(&self, index: usize) -> Result<()> {
        let number = {
            let inner = self.inner.borrow();
            inner.require_loaded()?;
            match inner.pages.get(index) {
                Some(id) => id.number(),
                None => {
                    return Err(PdfError::Param(format!(
                        "Page index {index} out of bounds (document has {} pages)",
                        inner.pages.len()
                    )))
                }
            }
        };
        self.delete_indirect_object(number)
    }

    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.borrow().pages.clone()
    }

    // ----- Metadata ------------------------------------------------------

    pub fn set_title(&self, title: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.require_loaded()?;
        let (_, info) = inner.info_object_mut();
        info.set("Title", Object::string(title));
        Ok(())
    }

    pub fn title(&self) -> Option<String> {
        let inner = self.inner.borrow();
        let info_id = inner.info_id?;
        inner
            .objects
            .get(&info_id.number())
            .and_then(|obj| obj.as_dict())
            .and_then(|dict| dict.get_string_bytes("Title"))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    // ----- File version --------------------------------------------------

    /// Declared file version in two-digit encoding (17 = PDF 1.7).
    pub fn file_version(&self) -> u8 {
        self.inner.borrow().version.as_int()
    }

    /// Raise the declared file version. Lowering it is rejected: a save
    /// can never claim an older version than its content. Raising the
    /// version forces the next save to be a full rewrite even when an
    /// incremental save was requested, because an appended update cannot
    /// change the header token.
    pub fn set_file_version(&self, version: u8) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.require_loaded()?;
        let new_version = PdfVersion::from_int(version)?;
        if new_version < inner.version {
            return Err(PdfError::Param(format!(
                "File version cannot be lowered from {} to {}",
                inner.version, new_version
            )));
        }
        if new_version > inner.version {
            inner.version = new_version;
            inner.version_raised = true;
        }
        Ok(())
    }

    // ----- Passwords and encryption --------------------------------------

    /// Classify a candidate password against the document's encryption
    /// metadata. Pure: mutates nothing, works in any state. A document
    /// that accepts the same string as both passwords reports `Owner`;
    /// use [`Document::is_user_password`] for the finer check.
    pub fn check_password(&self, candidate: &str) -> PasswordType {
        let inner = self.inner.borrow();
        let Some(encryption) = &inner.encryption else {
            return PasswordType::NoPassword;
        };
        let Ok(handler) = encryption.handler() else {
            return PasswordType::Invalid;
        };
        let dict = &encryption.dict;
        let file_id = inner.file_id.as_deref();
        if handler.authenticate_owner_password(
            candidate,
            &dict.o,
            &dict.u,
            dict.permissions(),
            file_id,
        ) {
            PasswordType::Owner
        } else if handler.authenticate_user_password(
            candidate,
            &dict.o,
            &dict.u,
            dict.permissions(),
            file_id,
        ) {
            PasswordType::User
        } else {
            PasswordType::Invalid
        }
    }

    pub fn is_user_password(&self, candidate: &str) -> bool {
        let inner = self.inner.borrow();
        let Some(encryption) = &inner.encryption else {
            return false;
        };
        let Ok(handler) = encryption.handler() else {
            return false;
        };
        let dict = &encryption.dict;
        handler.authenticate_user_password(
            candidate,
            &dict.o,
            &dict.u,
            dict.permissions(),
            inner.file_id.as_deref(),
        )
    }

    pub fn is_owner_password(&self, candidate: &str) -> bool {
        let inner = self.inner.borrow();
        let Some(encryption) = &inner.encryption else {
            return false;
        };
        let Ok(handler) = encryption.handler() else {
            return false;
        };
        let dict = &encryption.dict;
        handler.authenticate_owner_password(
            candidate,
            &dict.o,
            &dict.u,
            dict.permissions(),
            inner.file_id.as_deref(),
        )
    }

    /// Derive the user password from the owner password. Only the
    /// standard password scheme supports this; other schemes fail with
    /// [`crate::PdfError::SecurityHandler`].
    pub fn get_user_password(&self, owner_password: &str) -> Result<String> {
        let inner = self.inner.borrow();
        let encryption = inner
            .encryption
            .as_ref()
            .ok_or_else(|| PdfError::InvalidState("Document is not encrypted".to_string()))?;
        if encryption.dict.encrypt_type() != EncryptType::Password {
            return Err(PdfError::SecurityHandler(encryption.dict.filter.clone()));
        }
        let handler = encryption.handler()?;
        let dict = &encryption.dict;
        let recovered = handler
            .recover_user_password(
                owner_password,
                &dict.o,
                &dict.u,
                dict.permissions(),
                inner.file_id.as_deref(),
            )
            .ok_or(PdfError::Password)?;
        Ok(String::from_utf8_lossy(&recovered).into_owned())
    }

    /// Scheme of the loaded document's encryption.
    pub fn encrypt_type(&self) -> EncryptType {
        let inner = self.inner.borrow();
        match &inner.encryption {
            Some(encryption) => encryption.dict.encrypt_type(),
            None => EncryptType::None,
        }
    }

    /// Permissions granted by the loaded document's encryption. An
    /// unencrypted document grants everything.
    pub fn permissions(&self) -> crate::encryption::Permissions {
        let inner = self.inner.borrow();
        match &inner.encryption {
            Some(encryption) => encryption.dict.permissions(),
            None => crate::encryption::Permissions::all(),
        }
    }

    /// How the password supplied at load time classified.
    pub fn password_type(&self) -> PasswordType {
        let inner = self.inner.borrow();
        match &inner.encryption {
            Some(encryption) => encryption.password_type,
            None => PasswordType::NoPassword,
        }
    }

    /// Set encryption for the *next* save. Loaded content is already
    /// plaintext in memory; this does not re-protect it until saved.
    pub fn set_security_handler(&self, settings: SecuritySettings) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.require_loaded()?;
        inner.pending_security = Some(settings);
        inner.security_removed = false;
        Ok(())
    }

    /// Save without encryption from now on.
    pub fn remove_security(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.require_loaded()?;
        inner.pending_security = None;
        inner.security_removed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_is_loaded_and_empty() {
        let doc = Document::new();
        assert_eq!(doc.state(), LoadState::Loaded);
        assert_eq!(doc.page_count().unwrap(), 0);
        assert_eq!(doc.file_version(), 17);
    }

    #[test]
    fn test_handles_share_identity() {
        let doc = Document::new();
        let alias = doc.clone();
        let other = Document::new();

        assert_eq!(doc, alias);
        assert_ne!(doc, other);

        alias.insert_page(0, 612.0, 792.0).unwrap();
        assert_eq!(doc.page_count().unwrap(), 1);
    }

    #[test]
    fn test_insert_page_updates_tree() {
        let doc = Document::new();
        let first = doc.insert_page(0, 612.0, 792.0).unwrap();
        let second = doc.insert_page(1, 612.0, 792.0).unwrap();
        // Insert between the two.
        let middle = doc.insert_page(1, 595.0, 842.0).unwrap();

        assert_eq!(doc.page_ids(), vec![first, middle, second]);
        let root = doc
            .get_indirect_object(doc.inner.borrow().pages_root_id.number())
            .unwrap();
        let root_dict = root.as_dict().unwrap();
        assert_eq!(root_dict.get_integer("Count"), Some(3));
        assert_eq!(
            root_dict.get("Kids").and_then(|k| k.as_array()).map(|a| a.len()),
            Some(3)
        );
    }

    #[test]
    fn test_insert_page_out_of_bounds() {
        let doc = Document::new();
        assert!(matches!(
            doc.insert_page(1, 612.0, 792.0),
            Err(PdfError::Param(_))
        ));
        assert!(matches!(
            doc.insert_page(0, 0.0, 792.0),
            Err(PdfError::Param(_))
        ));
    }

    #[test]
    fn test_remove_page() {
        let doc = Document::new();
        doc.insert_page(0, 612.0, 792.0).unwrap();
        doc.insert_page(1, 612.0, 792.0).unwrap();
        doc.remove_page(0).unwrap();
        assert_eq!(doc.page_count().unwrap(), 1);
        assert!(matches!(doc.remove_page(5), Err(PdfError::Param(_))));
    }

    #[test]
    fn test_add_indirect_object_assigns_fresh_numbers() {
        let doc = Document::new();
        let a = doc.add_indirect_object(Object::Integer(1)).unwrap();
        let b = doc.add_indirect_object(Object::Integer(2)).unwrap();
        assert!(a.number() > 0);
        assert_ne!(a.number(), b.number());
    }

    #[test]
    fn test_add_indirect_object_is_idempotent_for_references() {
        let doc = Document::new();
        let count_before = doc.object_count();
        let id = doc.add_indirect_object(Object::string("payload")).unwrap();
        assert_eq!(doc.object_count(), count_before + 1);

        // Re-adding the already-indirect object returns the same number
        // without growing the table.
        let again = doc.add_indirect_object(Object::Reference(id)).unwrap();
        assert_eq!(again, id);
        assert_eq!(doc.object_count(), count_before + 1);
    }

    #[test]
    fn test_add_indirect_object_rejects_dangling_reference() {
        let doc = Document::new();
        let dangling = Object::Reference(ObjectId::new(999, 0));
        assert!(matches!(
            doc.add_indirect_object(dangling),
            Err(PdfError::Param(_))
        ));
    }

    #[test]
    fn test_delete_indirect_object() {
        let doc = Document::new();
        let id = doc.add_indirect_object(Object::Integer(5)).unwrap();
        doc.delete_indirect_object(id.number()).unwrap();
        assert!(doc.get_indirect_object(id.number()).is_none());
        assert!(matches!(
            doc.delete_indirect_object(id.number()),
            Err(PdfError::Param(_))
        ));
    }

    #[test]
    fn test_structural_objects_cannot_be_deleted() {
        let doc = Document::new();
        assert!(matches!(
            doc.delete_indirect_object(1),
            Err(PdfError::Param(_))
        ));
    }

    #[test]
    fn test_file_version_is_monotone() {
        let doc = Document::new();
        assert_eq!(doc.file_version(), 17);
        doc.set_file_version(20).unwrap();
        assert_eq!(doc.file_version(), 20);
        assert!(matches!(
            doc.set_file_version(14),
            Err(PdfError::Param(_))
        ));
        assert!(matches!(
            doc.set_file_version(99),
            Err(PdfError::Param(_))
        ));
    }

    #[test]
    fn test_unencrypted_password_queries() {
        let doc = Document::new();
        assert_eq!(doc.check_password("anything"), PasswordType::NoPassword);
        assert!(!doc.is_user_password(""));
        assert!(!doc.is_owner_password(""));
        assert_eq!(doc.encrypt_type(), EncryptType::None);
        assert!(doc.permissions().contains(crate::encryption::Permissions::PRINT));
    }

    #[test]
    fn test_title_round_trip() {
        let doc = Document::new();
        assert!(doc.title().is_none());
        doc.set_title("Quarterly report").unwrap();
        assert_eq!(doc.title().as_deref(), Some("Quarterly report"));
    }
}
