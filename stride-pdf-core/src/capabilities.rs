//! Licensed optional modules
//!
//! Some operations belong to optional product modules and must be licensed
//! before they may run. The set of licensed modules is an explicit value
//! handed to the operations that need it, so tests and embedders can grant
//! capabilities without touching process-wide state.

use std::fmt;

/// Optional product modules that require a license grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Ocr,
    Comparison,
    Optimizer,
    Rms,
    LayoutRecognition,
    Accessibility,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Module::Ocr => "OCR",
            Module::Comparison => "Comparison",
            Module::Optimizer => "Optimizer",
            Module::Rms => "RMS",
            Module::LayoutRecognition => "LayoutRecognition",
            Module::Accessibility => "Accessibility",
        };
        f.write_str(name)
    }
}

/// The set of licensed modules for this embedding.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    licensed: Vec<Module>,
}

impl Capabilities {
    /// No optional modules licensed.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every optional module licensed.
    pub fn all() -> Self {
        Self {
            licensed: vec![
                Module::Ocr,
                Module::Comparison,
                Module::Optimizer,
                Module::Rms,
                Module::LayoutRecognition,
                Module::Accessibility,
            ],
        }
    }

    /// Grant a single module, builder style.
    pub fn with(mut self, module: Module) -> Self {
        if !self.licensed.contains(&module) {
            self.licensed.push(module);
        }
        self
    }

    pub fn has(&self, module: Module) -> bool {
        self.licensed.contains(&module)
    }

    /// Fail with [`crate::PdfError::ModuleRight`] unless `module` is licensed.
    ///
    /// Gated operations call this before doing any work, so an unlicensed
    /// call never produces partial side effects.
    pub fn require(&self, module: Module) -> crate::Result<()> {
        if self.has(module) {
            Ok(())
        } else {
            Err(crate::PdfError::ModuleRight(module))
        }
    }
}
