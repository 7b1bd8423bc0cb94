//! Page import
//!
//! Copies pages from one document into another. The page range decides
//! both which pages are taken and the order they appear in the
//! destination, so `{4, 0, 2}` imports three pages in exactly that order
//! regardless of their order in the source.

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::progress::{progress_ratio, PauseHandler, Progressive, ProgressiveTask, StepOutcome};
use crate::range::PageRange;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Import the pages selected by `range` from `source` into `dest`,
/// appending them in range order. Returns the number of pages imported.
pub fn import_pages(dest: &Document, source: &Document, range: &PageRange) -> Result<usize> {
    let mut operation = start_import_pages(dest, source, range, None)?;
    operation.run_to_completion()?;
    Ok(range.ordered_unique().len())
}

/// Progressive variant of [`import_pages`]: one page is copied per
/// `resume` increment.
pub fn start_import_pages(
    dest: &Document,
    source: &Document,
    range: &PageRange,
    pause: Option<Rc<dyn PauseHandler>>,
) -> Result<Progressive> {
    if dest == source {
        return Err(PdfError::Param(
            "Cannot import pages from a document into itself".to_string(),
        ));
    }
    dest.inner.borrow().require_loaded()?;
    source.inner.borrow().require_loaded()?;

    let indices = range.resolve(source.page_count()?)?;
    if indices.is_empty() {
        return Err(PdfError::Param("Page range is empty".to_string()));
    }

    let task = ImportTask {
        dest: dest.clone(),
        source: source.clone(),
        indices,
        cursor: 0,
    };
    Ok(Progressive::new(Box::new(task), pause))
}

struct ImportTask {
    dest: Document,
    source: Document,
    indices: Vec<usize>,
    cursor: usize,
}

impl ProgressiveTask for ImportTask {
    fn step(&mut self) -> Result<StepOutcome> {
        let index = self.indices[self.cursor];
        copy_page(&self.dest, &self.source, index)?;
        self.cursor += 1;

        if self.cursor == self.indices.len() {
            tracing::debug!(pages = self.indices.len(), "page import complete");
            Ok(StepOutcome::Finished)
        } else {
            Ok(StepOutcome::Continue(progress_ratio(
                self.cursor,
                self.indices.len(),
            )))
        }
    }
}

/// Deep-copy one page and everything it references into `dest`,
/// renumbering as it goes.
fn copy_page(dest: &Document, source: &Document, index: usize) -> Result<()> {
    let source_inner = source.inner.borrow();
    let page_id = *source_inner.pages.get(index).ok_or_else(|| {
        PdfError::Param(format!(
            "Page index {index} out of bounds (document has {} pages)",
            source_inner.pages.len()
        ))
    })?;

    // Everything reachable from the page, minus the Parent back-pointer.
    let mut reachable = Vec::new();
    let mut queue = vec![page_id.number()];
    while let Some(number) = queue.pop() {
        if reachable.contains(&number) {
            continue;
        }
        let Some(object) = source_inner.objects.get(&number) else {
            continue;
        };
        reachable.push(number);
        let mut refs = Vec::new();
        collect_child_references(object, &mut refs);
        queue.extend(refs.into_iter().map(|id| id.number()));
    }

    let mut dest_inner = dest.inner.borrow_mut();
    let mut remap: BTreeMap<u32, ObjectId> = BTreeMap::new();
    for &number in &reachable {
        let new_number = dest_inner.allocate_number();
        remap.insert(number, ObjectId::new(new_number, 0));
    }

    let dest_root = dest_inner.pages_root_id;
    for &number in &reachable {
        let object = &source_inner.objects[&number];
        let mut copied = remap_object(object, &remap, dest_root);
        // The page itself hangs off the destination tree.
        if number == page_id.number() {
            if let Some(dict) = copied.as_dict_mut() {
                dict.set("Parent", dest_root);
            }
        }
        let new_id = remap[&number];
        dest_inner.objects.insert(new_id.number(), copied);
        dest_inner.dirty.insert(new_id.number());
    }

    let new_page_id = remap[&page_id.number()];
    dest_inner.pages.push(new_page_id);
    dest_inner.sync_page_tree();
    Ok(())
}

/// References in an object's children, excluding `Parent` back-pointers.
fn collect_child_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(elements) => {
            for element in elements {
                collect_child_references(element, out);
            }
        }
        Object::Dictionary(dict) => {
            for (key, value) in dict.iter() {
                if key != "Parent" {
                    collect_child_references(value, out);
                }
            }
        }
        Object::Stream(stream) => {
            for (key, value) in stream.dictionary().iter() {
                if key != "Parent" {
                    collect_child_references(value, out);
                }
            }
        }
        _ => {}
    }
}

/// Clone with every reference rewritten through `remap`. A reference to
/// something outside the copied set (only `Parent` qualifies) is pointed
/// at the destination page tree root.
fn remap_object(object: &Object, remap: &BTreeMap<u32, ObjectId>, dest_root: ObjectId) -> Object {
    match object {
        Object::Reference(id) => match remap.get(&id.number()) {
            Some(&new_id) => Object::Reference(new_id),
            None => Object::Reference(dest_root),
        },
        Object::Array(elements) => Object::Array(
            elements
                .iter()
                .map(|element| remap_object(element, remap, dest_root))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, remap, dest_root)),
        Object::Stream(stream) => {
            let dict = remap_dict(stream.dictionary(), remap, dest_root);
            Object::Stream(crate::objects::Stream::with_dictionary(
                dict,
                stream.data().to_vec(),
            ))
        }
        other => other.clone(),
    }
}

fn remap_dict(
    dict: &Dictionary,
    remap: &BTreeMap<u32, ObjectId>,
    dest_root: ObjectId,
) -> Dictionary {
    dict.iter()
        .map(|(key, value)| (key.clone(), remap_object(value, remap, dest_root)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_pages(count: usize) -> Document {
        let doc = Document::new();
        for i in 0..count {
            doc.insert_page(i, 612.0, 792.0).unwrap();
        }
        doc
    }

    #[test]
    fn test_import_appends_in_range_order() {
        let source = doc_with_pages(5);
        // Tag each source page with its index so order is observable.
        for (i, id) in source.page_ids().into_iter().enumerate() {
            let mut page = source
                .get_indirect_object(id.number())
                .unwrap()
                .as_dict()
                .cloned()
                .unwrap();
            page.set("PieceInfo", i as i64);
            source
                .set_indirect_object(id, Object::Dictionary(page))
                .unwrap();
        }

        let dest = Document::new();
        let mut range = PageRange::new();
        range.add_single(4);
        range.add_single(0);
        range.add_single(2);

        let imported = import_pages(&dest, &source, &range).unwrap();
        assert_eq!(imported, 3);
        assert_eq!(dest.page_count().unwrap(), 3);

        let tags: Vec<i64> = dest
            .page_ids()
            .into_iter()
            .map(|id| {
                dest.get_indirect_object(id.number())
                    .unwrap()
                    .as_dict()
                    .unwrap()
                    .get_integer("PieceInfo")
                    .unwrap()
            })
            .collect();
        assert_eq!(tags, vec![4, 0, 2]);
    }

    #[test]
    fn test_import_duplicate_indices_collapse_last_wins() {
        let source = doc_with_pages(3);
        let dest = Document::new();
        let mut range = PageRange::new();
        range.add_single(0);
        range.add_single(2);
        range.add_single(0);

        import_pages(&dest, &source, &range).unwrap();
        assert_eq!(dest.page_count().unwrap(), 2);
    }

    #[test]
    fn test_import_out_of_bounds_is_param_error() {
        let source = doc_with_pages(2);
        let dest = Document::new();
        let mut range = PageRange::new();
        range.add_single(7);
        assert!(matches!(
            import_pages(&dest, &source, &range),
            Err(PdfError::Param(_))
        ));
        // Nothing was committed.
        assert_eq!(dest.page_count().unwrap(), 0);
    }

    #[test]
    fn test_import_into_self_rejected() {
        let doc = doc_with_pages(2);
        let range = PageRange::all(2);
        assert!(matches!(
            import_pages(&doc, &doc, &range),
            Err(PdfError::Param(_))
        ));
    }

    #[test]
    fn test_progressive_import_one_page_per_step() {
        let source = doc_with_pages(4);
        let dest = Document::new();
        let range = PageRange::all(4);

        let mut operation = start_import_pages(&dest, &source, &range, None).unwrap();
        operation.resume().unwrap();
        assert_eq!(dest.page_count().unwrap(), 1);
        operation.run_to_completion().unwrap();
        assert_eq!(dest.page_count().unwrap(), 4);
        assert_eq!(operation.rate_of_progress(), 100);
    }
}
