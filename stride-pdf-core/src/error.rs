use crate::capabilities::Module;
use thiserror::Error;

/// Error taxonomy shared by every fallible operation in the crate.
///
/// Most kinds are fatal for the operation that raised them. Two are not:
/// [`PdfError::DataNotReady`] asks the caller to supply more bytes and retry,
/// and a pause signalled through a pause handler is not an error at all
/// (the progressive operation simply returns without advancing).
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed PDF: {0}")]
    Format(String),

    #[error("Password rejected")]
    Password,

    #[error("Unsupported security handler: {0}")]
    SecurityHandler(String),

    #[error("No usable credential for certificate encryption: {0}")]
    Certificate(String),

    /// More bytes are required before the operation can continue. The
    /// offset/length pair names the range the byte source still needs;
    /// feed it and call the operation again.
    #[error("Data not ready: need {length} bytes at offset {offset}")]
    DataNotReady { offset: u64, length: u64 },

    #[error("Invalid parameter: {0}")]
    Param(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Module not licensed: {0}")]
    ModuleRight(Module),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl PdfError {
    /// Whether retrying after supplying more input can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PdfError::DataNotReady { .. })
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_error_display() {
        let error = PdfError::Format("truncated xref".to_string());
        assert_eq!(error.to_string(), "Malformed PDF: truncated xref");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);

        match pdf_error {
            PdfError::Io(ref err) => assert_eq!(err.kind(), ErrorKind::NotFound),
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_data_not_ready_is_recoverable() {
        let error = PdfError::DataNotReady {
            offset: 4096,
            length: 512,
        };
        assert!(error.is_recoverable());
        assert!(error.to_string().contains("4096"));
    }

    #[test]
    fn test_fatal_errors_are_not_recoverable() {
        let errors = vec![
            PdfError::Format("bad".to_string()),
            PdfError::Password,
            PdfError::SecurityHandler("Adobe.PPKLite".to_string()),
            PdfError::Certificate("no matching key".to_string()),
            PdfError::Param("index out of range".to_string()),
            PdfError::InvalidState("already finished".to_string()),
            PdfError::ModuleRight(Module::Optimizer),
            PdfError::Unknown("?".to_string()),
        ];
        for error in errors {
            assert!(!error.is_recoverable());
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_module_right_names_module() {
        let error = PdfError::ModuleRight(Module::Ocr);
        assert!(error.to_string().contains("OCR"));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfError>();
    }
}
