//! The progressive protocol end to end: cooperative pause, the
//! retry-with-more-data loop over a partially available source, and
//! progress monotonicity under arbitrary step counts.

use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use stride_pdf::{
    Document, LoadOptions, MemorySink, PartialSource, PauseHandler, PdfError, RangeHint,
    SaveFlags,
};

struct TogglePause {
    paused: Cell<bool>,
}

impl PauseHandler for TogglePause {
    fn should_pause(&self) -> bool {
        self.paused.get()
    }
}

fn sample_bytes(pages: usize) -> Vec<u8> {
    let doc = Document::new();
    for i in 0..pages {
        doc.insert_page(i, 612.0, 792.0).unwrap();
    }
    let sink = MemorySink::new();
    doc.save_to_writer(sink.clone(), SaveFlags::NO_UPDATE_METADATA_DATE)
        .unwrap();
    sink.contents()
}

#[test]
fn paused_save_resumes_to_identical_output() {
    let unpaused_out = {
        let doc = Document::new();
        doc.insert_page(0, 612.0, 792.0).unwrap();
        let sink = MemorySink::new();
        doc.save_to_writer(sink.clone(), SaveFlags::NO_UPDATE_METADATA_DATE)
            .unwrap();
        sink.contents()
    };

    let doc = Document::new();
    doc.insert_page(0, 612.0, 792.0).unwrap();
    let pause = Rc::new(TogglePause {
        paused: Cell::new(false),
    });
    let sink = MemorySink::new();
    let mut operation = doc
        .start_save_as(
            Box::new(sink.clone()),
            SaveFlags::NO_UPDATE_METADATA_DATE,
            Some(pause.clone() as Rc<dyn PauseHandler>),
        )
        .unwrap();

    // One increment, then pause for a while.
    operation.resume().unwrap();
    let rate_at_pause = operation.rate_of_progress();
    pause.paused.set(true);
    for _ in 0..10 {
        operation.resume().unwrap();
        assert_eq!(operation.rate_of_progress(), rate_at_pause);
    }

    // Un-pause and finish; the output matches an unpaused run.
    pause.paused.set(false);
    while !operation.is_finished() {
        operation.resume().unwrap();
    }
    assert_eq!(operation.rate_of_progress(), 100);
    assert_eq!(sink.contents(), unpaused_out);
}

#[test]
fn resume_after_completion_fails_with_invalid_state() {
    let doc = Document::new();
    doc.insert_page(0, 612.0, 792.0).unwrap();
    let sink = MemorySink::new();
    let mut operation = doc
        .start_save_as(Box::new(sink), SaveFlags::empty(), None)
        .unwrap();
    while !operation.is_finished() {
        operation.resume().unwrap();
    }
    assert!(matches!(
        operation.resume(),
        Err(PdfError::InvalidState(_))
    ));
    assert_eq!(operation.rate_of_progress(), 100);
}

struct RecordingHint {
    requests: RefCell<Vec<(u64, u64)>>,
}

impl RangeHint for RecordingHint {
    fn request(&self, offset: u64, length: u64) {
        self.requests.borrow_mut().push((offset, length));
    }
}

#[test]
fn partial_source_load_retries_until_fed() {
    let bytes = sample_bytes(3);

    let hint = Rc::new(RecordingHint {
        requests: RefCell::new(Vec::new()),
    });
    let source = Rc::new(RefCell::new(PartialSource::new(
        bytes.len() as u64,
        Some(hint.clone() as Rc<dyn RangeHint>),
    )));

    let (doc, mut operation) = Document::start_load(
        Box::new(source.clone()),
        "",
        LoadOptions::default(),
        None,
    );

    let mut retries = 0;
    while !operation.is_finished() {
        match operation.resume() {
            Ok(()) => {}
            Err(PdfError::DataNotReady { offset, length }) => {
                // The hint callback saw the same range the error names.
                let last = *hint.requests.borrow().last().unwrap();
                assert_eq!(last, (offset, length));
                assert!(!operation.is_failed());

                // Feed exactly the requested range and retry.
                let start = offset as usize;
                let end = (offset + length) as usize;
                source
                    .borrow_mut()
                    .feed(offset, &bytes[start..end])
                    .unwrap();
                retries += 1;
                assert!(retries < 10_000, "load never converged");
            }
            Err(other) => panic!("unexpected load error: {other:?}"),
        }
    }

    assert_eq!(operation.rate_of_progress(), 100);
    assert!(retries > 0, "partial source never reported missing data");
    assert_eq!(doc.page_count().unwrap(), 3);
}

#[test]
fn partial_source_loads_without_the_whole_file() {
    // Feed only what loading actually asks for; for a small document the
    // requested ranges cover essentially the file, but the protocol never
    // requires a single contiguous up-front download.
    let bytes = sample_bytes(2);
    let source = Rc::new(RefCell::new(PartialSource::new(bytes.len() as u64, None)));

    let (doc, mut operation) =
        Document::start_load(Box::new(source.clone()), "", LoadOptions::default(), None);

    loop {
        match operation.resume() {
            Ok(()) if operation.is_finished() => break,
            Ok(()) => {}
            Err(PdfError::DataNotReady { offset, length }) => {
                let start = offset as usize;
                let end = (offset + length) as usize;
                source
                    .borrow_mut()
                    .feed(offset, &bytes[start..end])
                    .unwrap();
            }
            Err(other) => panic!("unexpected load error: {other:?}"),
        }
    }
    assert_eq!(doc.page_count().unwrap(), 2);
}

#[test]
fn abandoned_save_leaves_document_usable() {
    let doc = Document::new();
    doc.insert_page(0, 612.0, 792.0).unwrap();

    {
        let sink = MemorySink::new();
        let mut operation = doc
            .start_save_as(Box::new(sink), SaveFlags::empty(), None)
            .unwrap();
        operation.resume().unwrap();
        // Dropped here: abandonment is the only cancellation.
    }

    // The document is still loaded and can be saved again.
    let sink = MemorySink::new();
    doc.save_to_writer(sink.clone(), SaveFlags::empty()).unwrap();
    let reloaded = Document::load_from_memory(sink.contents(), "").unwrap();
    assert_eq!(reloaded.page_count().unwrap(), 1);
}

proptest! {
    #[test]
    fn progress_is_monotone_for_any_page_count(pages in 1usize..24) {
        let doc = Document::new();
        for i in 0..pages {
            doc.insert_page(i, 612.0, 792.0).unwrap();
        }
        let sink = MemorySink::new();
        let mut operation = doc
            .start_save_as(Box::new(sink.clone()), SaveFlags::empty(), None)
            .unwrap();

        let mut last = 0u8;
        let mut steps = 0u32;
        while !operation.is_finished() {
            operation.resume().unwrap();
            let rate = operation.rate_of_progress();
            prop_assert!(rate >= last);
            last = rate;
            steps += 1;
            prop_assert!(steps < 10_000);
        }
        prop_assert_eq!(last, 100);

        let reloaded = Document::load_from_memory(sink.contents(), "").unwrap();
        prop_assert_eq!(reloaded.page_count().unwrap(), pages);
    }
}
