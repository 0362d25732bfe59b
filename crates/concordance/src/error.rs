use thiserror::Error;

use crate::export::ExportError;
use crate::index::IndexError;
use crate::scan::ScanError;
use crate::source::SourceError;

pub const EXIT_INVALID_INPUT: u8 = 1;
pub const EXIT_INPUT_FILE: u8 = 2;
pub const EXIT_WRITE: u8 = 3;
pub const EXIT_ALLOCATION: u8 = 4;

/// Fatal outcome of a concordance run.
#[derive(Debug, Error)]
pub enum ConcordanceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Io(#[from] SourceError),
    #[error("allocation failure: {0}")]
    AllocationFailure(#[source] IndexError),
    #[error(transparent)]
    Write(#[from] ExportError),
}

impl ConcordanceError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConcordanceError::InvalidInput(_) => EXIT_INVALID_INPUT,
            ConcordanceError::Io(_) => EXIT_INPUT_FILE,
            ConcordanceError::Write(_) => EXIT_WRITE,
            ConcordanceError::AllocationFailure(_) => EXIT_ALLOCATION,
        }
    }
}

impl From<IndexError> for ConcordanceError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::AllocationFailure { .. } => ConcordanceError::AllocationFailure(err),
            other => ConcordanceError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ScanError> for ConcordanceError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Source(err) => err.into(),
            ScanError::Index(err) => err.into(),
        }
    }
}
