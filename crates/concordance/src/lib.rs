pub mod config;
pub mod error;
pub mod export;
pub mod index;
pub mod pipeline;
pub mod scan;
pub mod source;

pub use concordance_types::{DEFAULT_CONTEXT_WORDS, KeywordEntry, Occurrence};
pub use config::IndexerConfig;
pub use error::ConcordanceError;
pub use export::{Destination, ExportError, JsonStyle, export, to_json_string, write_json};
pub use index::{EntryId, IndexError, KeywordIndex};
pub use pipeline::{Pipeline, RunReport, Stage};
pub use scan::{ScanError, ScanOptions, ScanSummary, scan};
pub use source::{
    DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_LINE_BYTES, Line, LineSource, OpenedInput, SourceError,
    SourceLimits,
};
