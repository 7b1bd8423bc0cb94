//! Redundant object removal
//!
//! Structurally identical indirect objects are collapsed onto one object
//! number and every reference is rewritten. Page objects and the
//! document's structural objects never participate: each page must stay
//! its own object even when two blank pages serialize identically.
//!
//! This is the licensed Optimizer module's entry point; the
//! `REMOVE_REDUNDANT_OBJECTS` save flag reuses [`dedupe_objects`] on the
//! save snapshot without a license check, since it never mutates the
//! document.

use crate::capabilities::{Capabilities, Module};
use crate::document::Document;
use crate::error::Result;
use crate::objects::{Dictionary, Object, ObjectId};
use crate::progress::{PauseHandler, Progressive, ProgressiveTask, StepOutcome};
use crate::writer::serialize_object;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Dedup passes before the fixpoint search gives up.
const MAX_PASSES: usize = 16;

/// Remove structurally identical duplicates from `objects`, excluding
/// `protected` numbers. Returns the removed object numbers.
///
/// Runs to a fixpoint: collapsing two duplicates can make their referrers
/// identical in turn.
pub fn dedupe_objects(
    objects: &mut BTreeMap<u32, Object>,
    protected: &BTreeSet<u32>,
) -> Vec<u32> {
    let mut removed = Vec::new();
    for _ in 0..MAX_PASSES {
        let pass = dedupe_pass(objects, protected);
        if pass.is_empty() {
            break;
        }
        removed.extend(pass);
    }
    removed
}

fn dedupe_pass(objects: &mut BTreeMap<u32, Object>, protected: &BTreeSet<u32>) -> Vec<u32> {
    // First occurrence (lowest number) of each serialized form wins.
    let mut canonical: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
    let mut remap: BTreeMap<u32, u32> = BTreeMap::new();

    for (&number, object) in objects.iter() {
        if protected.contains(&number) {
            continue;
        }
        let form = serialize_object(object);
        match canonical.get(&form) {
            Some(&keeper) => {
                remap.insert(number, keeper);
            }
            None => {
                canonical.insert(form, number);
            }
        }
    }

    if remap.is_empty() {
        return Vec::new();
    }

    let removed: Vec<u32> = remap.keys().copied().collect();
    for number in &removed {
        objects.remove(number);
    }
    for object in objects.values_mut() {
        *object = rewrite_references(object, &remap);
    }
    removed
}

fn rewrite_references(object: &Object, remap: &BTreeMap<u32, u32>) -> Object {
    match object {
        Object::Reference(id) => match remap.get(&id.number()) {
            Some(&keeper) => Object::Reference(ObjectId::new(keeper, id.generation())),
            None => object.clone(),
        },
        Object::Array(elements) => Object::Array(
            elements
                .iter()
                .map(|element| rewrite_references(element, remap))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(rewrite_dict(dict, remap)),
        Object::Stream(stream) => {
            let dict = rewrite_dict(stream.dictionary(), remap);
            Object::Stream(crate::objects::Stream::with_dictionary(
                dict,
                stream.data().to_vec(),
            ))
        }
        other => other.clone(),
    }
}

fn rewrite_dict(dict: &Dictionary, remap: &BTreeMap<u32, u32>) -> Dictionary {
    dict.iter()
        .map(|(key, value)| (key.clone(), rewrite_references(value, remap)))
        .collect()
}

/// Collapse duplicate objects inside `doc`. Requires the Optimizer
/// module. Returns the number of objects removed.
pub fn optimize(doc: &Document, capabilities: &Capabilities) -> Result<usize> {
    let before = doc.object_count();
    let mut operation = start_optimize(doc, capabilities, None)?;
    operation.run_to_completion()?;
    Ok(before - doc.object_count())
}

/// Progressive variant of [`optimize`]: one dedup pass per `resume`
/// increment until a pass removes nothing.
pub fn start_optimize(
    doc: &Document,
    capabilities: &Capabilities,
    pause: Option<Rc<dyn PauseHandler>>,
) -> Result<Progressive> {
    capabilities.require(Module::Optimizer)?;
    doc.inner.borrow().require_loaded()?;
    let task = OptimizeTask {
        doc: doc.clone(),
        passes: 0,
    };
    Ok(Progressive::new(Box::new(task), pause))
}

struct OptimizeTask {
    doc: Document,
    passes: usize,
}

impl ProgressiveTask for OptimizeTask {
    fn step(&mut self) -> Result<StepOutcome> {
        let mut inner = self.doc.inner.borrow_mut();

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

        let removed = dedupe_pass(&mut inner.objects, &protected);
        self.passes += 1;

        if removed.is_empty() || self.passes >= MAX_PASSES {
            // Reference rewriting may have touched any object: everything
            // left is dirty for the next incremental save.
            let numbers: Vec<u32> = inner.objects.keys().copied().collect();
            inner.dirty.extend(numbers);
            tracing::debug!(passes = self.passes, "optimization complete");
            return Ok(StepOutcome::Finished);
        }

        for number in removed {
            let generation = inner.generation_of(number).saturating_add(1);
            inner.freed.insert(number, generation);
            inner.dirty.remove(&number);
        }
        Ok(StepOutcome::Continue((self.passes * 20).min(95) as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_collapses_identical_objects() {
        let mut objects = BTreeMap::new();
        objects.insert(1, Object::string("same"));
        objects.insert(2, Object::string("same"));
        objects.insert(3, Object::string("different"));
        objects.insert(
            4,
            Object::Array(vec![
                Object::Reference(ObjectId::new(2, 0)),
                Object::Reference(ObjectId::new(3, 0)),
            ]),
        );

        let removed = dedupe_objects(&mut objects, &BTreeSet::new());
        assert_eq!(removed, vec![2]);
        assert!(!objects.contains_key(&2));
        // The reference to 2 now points at 1.
        assert_eq!(
            objects[&4].as_array().unwrap()[0],
            Object::Reference(ObjectId::new(1, 0))
        );
    }

    #[test]
    fn test_dedupe_reaches_fixpoint_through_referrers() {
        let mut objects = BTreeMap::new();
        objects.insert(1, Object::string("leaf"));
        objects.insert(2, Object::string("leaf"));
        // 3 and 4 differ only in which duplicate leaf they reference.
        objects.insert(3, Object::Array(vec![Object::Reference(ObjectId::new(1, 0))]));
        objects.insert(4, Object::Array(vec![Object::Reference(ObjectId::new(2, 0))]));

        let removed = dedupe_objects(&mut objects, &BTreeSet::new());
        assert_eq!(removed, vec![2, 4]);
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn test_protected_objects_survive() {
        let mut objects = BTreeMap::new();
        objects.insert(1, Object::string("page"));
        objects.insert(2, Object::string("page"));
        let protected: BTreeSet<u32> = [1, 2].into_iter().collect();

        let removed = dedupe_objects(&mut objects, &protected);
        assert!(removed.is_empty());
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn test_optimize_requires_license() {
        let doc = Document::new();
        let err = start_optimize(&doc, &Capabilities::none(), None).unwrap_err();
        assert!(matches!(
            err,
            crate::PdfError::ModuleRight(Module::Optimizer)
        ));
    }

    #[test]
    fn test_optimize_document() {
        let doc = Document::new();
        doc.insert_page(0, 612.0, 792.0).unwrap();
        let a = doc.add_indirect_object(Object::string("dup")).unwrap();
        let b = doc.add_indirect_object(Object::string("dup")).unwrap();
        assert_ne!(a, b);
        let before = doc.object_count();

        let caps = Capabilities::none().with(Module::Optimizer);
        optimize(&doc, &caps).unwrap();
        assert_eq!(doc.object_count(), before - 1);
        // Identical blank pages are protected and survive.
        assert_eq!(doc.page_count().unwrap(), 1);
    }
}
