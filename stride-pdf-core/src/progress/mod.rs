//! Resumable long-running operations
//!
//! Every long-running transform in this crate (load, save, import,
//! optimize) is exposed as a [`Progressive`]: a unit of work advanced one
//! bounded increment at a time by repeated [`Progressive::resume`] calls.
//! The host drives the loop, so scheduling stays entirely in its hands —
//! one increment per UI frame, per event-loop turn, or a tight loop via
//! [`Progressive::run_to_completion`].
//!
//! There is no cancel primitive. A host abandons an operation by dropping
//! it; partially written output is the host's to clean up.
//!
//! # Example
//!
//! ```rust
//! use stride_pdf::progress::{Progressive, ProgressiveTask, StepOutcome};
//! use stride_pdf::Result;
//!
//! struct CountTo { current: u32, target: u32 }
//!
//! impl ProgressiveTask for CountTo {
//!     fn step(&mut self) -> Result<StepOutcome> {
//!         self.current += 1;
//!         if self.current >= self.target {
//!             Ok(StepOutcome::Finished)
//!         } else {
//!             Ok(StepOutcome::Continue(progress_ratio(
//!                 self.current as usize,
//!                 self.target as usize,
//!             )))
//!         }
//!     }
//! }
//! # use stride_pdf::progress::progress_ratio;
//!
//! let mut op = Progressive::new(Box::new(CountTo { current: 0, target: 4 }), None);
//! while !op.is_finished() {
//!     op.resume().unwrap();
//! }
//! assert_eq!(op.rate_of_progress(), 100);
//! ```

use crate::error::{PdfError, Result};
use std::rc::Rc;

/// Polled cooperation point. A handler that returns `true` asks the
/// operation to stop advancing; the host resumes by calling
/// [`Progressive::resume`] again once the handler reports `false`.
///
/// Handlers are borrowed for the lifetime of the operation — the caller
/// keeps its own handle and releases it after the operation is dropped.
pub trait PauseHandler {
    fn should_pause(&self) -> bool;
}

/// What one increment of work produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// More work remains. The payload is the task's progress estimate in
    /// `[0, 100)`; values of 100 and above are clamped to 99 so only a
    /// finished task reports completion.
    Continue(u8),
    /// The task is done.
    Finished,
}

/// One bounded increment of a resumable operation.
///
/// Implementations choose their own checkpoint granularity; the only
/// contract is that a single `step` returns promptly and that a fatal
/// error leaves the task unable to make further progress.
pub trait ProgressiveTask {
    fn step(&mut self) -> Result<StepOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationState {
    Running,
    Finished,
    Failed,
}

/// A resumable, pause-aware long-running operation.
pub struct Progressive {
    task: Box<dyn ProgressiveTask>,
    pause: Option<Rc<dyn PauseHandler>>,
    rate: u8,
    state: OperationState,
}

impl std::fmt::Debug for Progressive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progressive")
            .field("rate", &self.rate)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Progressive {
    pub fn new(task: Box<dyn ProgressiveTask>, pause: Option<Rc<dyn PauseHandler>>) -> Self {
        Self {
            task,
            pause,
            rate: 0,
            state: OperationState::Running,
        }
    }

    /// Progress in `[0, 100]`. Non-decreasing across `resume` calls;
    /// 100 means the operation finished.
    pub fn rate_of_progress(&self) -> u8 {
        self.rate
    }

    pub fn is_finished(&self) -> bool {
        self.state == OperationState::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.state == OperationState::Failed
    }

    /// Advance the operation by one increment.
    ///
    /// Once the operation has finished or failed, further calls return
    /// [`PdfError::InvalidState`]. If the pause handler signals a pause,
    /// this returns `Ok(())` without advancing. A
    /// [`PdfError::DataNotReady`] from the task is surfaced but leaves the
    /// operation resumable; any other task error is terminal.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            OperationState::Finished => {
                return Err(PdfError::InvalidState(
                    "operation already completed".to_string(),
                ))
            }
            OperationState::Failed => {
                return Err(PdfError::InvalidState(
                    "operation already failed".to_string(),
                ))
            }
            OperationState::Running => {}
        }

        if let Some(pause) = &self.pause {
            if pause.should_pause() {
                tracing::debug!(rate = self.rate, "progressive operation paused");
                return Ok(());
            }
        }

        match self.task.step() {
            Ok(StepOutcome::Continue(rate)) => {
                self.rate = self.rate.max(rate.min(99));
                Ok(())
            }
            Ok(StepOutcome::Finished) => {
                self.rate = 100;
                self.state = OperationState::Finished;
                Ok(())
            }
            Err(err) if err.is_recoverable() => Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "progressive operation failed");
                self.state = OperationState::Failed;
                Err(err)
            }
        }
    }

    /// Drive `resume` until completion. Intended for the one-shot
    /// convenience entry points, which install no pause handler; with a
    /// handler that reports a pause this returns [`PdfError::InvalidState`]
    /// rather than spinning.
    pub fn run_to_completion(&mut self) -> Result<()> {
        while !self.is_finished() {
            let before = self.rate;
            self.resume()?;
            if !self.is_finished() && self.rate == before && self.is_paused() {
                return Err(PdfError::InvalidState(
                    "operation paused while driven to completion".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.pause
            .as_ref()
            .map(|p| p.should_pause())
            .unwrap_or(false)
    }
}

/// Scale `done` out of `total` into a progress rate capped at 99.
pub fn progress_ratio(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 99;
    }
    (((done * 100) / total).min(99)) as u8
}
