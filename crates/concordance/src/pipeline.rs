use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::IndexerConfig;
use crate::error::ConcordanceError;
use crate::export::{Destination, export};
use crate::index::KeywordIndex;
use crate::scan::{ScanSummary, scan};
use crate::source::OpenedInput;

/// Where a run currently is. Runs only move forward; `Done` and `Failed` are
/// terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Idle,
    Opening,
    Validating,
    Scanning,
    Exporting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::Opening => "opening",
            Stage::Validating => "validating",
            Stage::Scanning => "scanning",
            Stage::Exporting => "exporting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        })
    }
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub keywords: usize,
    pub summary: ScanSummary,
    pub bytes_read: u64,
    pub elapsed: Duration,
}

/// Single-use driver for open → validate → scan → export.
#[derive(Debug)]
pub struct Pipeline {
    config: IndexerConfig,
    stage: Stage,
}

impl Pipeline {
    pub fn new(config: IndexerConfig) -> Self {
        Self {
            config,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Index `input` for `keywords` and write the report to `destination`.
    pub fn run<S: AsRef<str>>(
        &mut self,
        input: &Path,
        keywords: &[S],
        destination: &Destination,
    ) -> Result<RunReport, ConcordanceError> {
        self.execute(input, keywords, Some(destination))
            .map(|(_, report)| report)
    }

    /// Index `input` and hand back the finished index instead of exporting it.
    pub fn build<S: AsRef<str>>(
        &mut self,
        input: &Path,
        keywords: &[S],
    ) -> Result<(KeywordIndex, RunReport), ConcordanceError> {
        self.execute(input, keywords, None)
    }

    fn execute<S: AsRef<str>>(
        &mut self,
        input: &Path,
        keywords: &[S],
        destination: Option<&Destination>,
    ) -> Result<(KeywordIndex, RunReport), ConcordanceError> {
        if self.stage != Stage::Idle {
            return Err(ConcordanceError::InvalidInput(format!(
                "pipeline already ran (stage: {})",
                self.stage
            )));
        }
        let result = self.drive(input, keywords, destination);
        match result {
            Ok(_) => self.advance(Stage::Done),
            Err(_) => self.advance(Stage::Failed),
        }
        result
    }

    fn drive<S: AsRef<str>>(
        &mut self,
        input: &Path,
        keywords: &[S],
        destination: Option<&Destination>,
    ) -> Result<(KeywordIndex, RunReport), ConcordanceError> {
        let start = Instant::now();
        if keywords.is_empty() {
            return Err(ConcordanceError::InvalidInput(
                "at least one keyword is required".into(),
            ));
        }
        let mut index = KeywordIndex::from_keywords(keywords)?;
        debug!(
            "registered {} keywords in {} buckets",
            index.len(),
            index.bucket_count()
        );

        self.advance(Stage::Opening);
        let opened = OpenedInput::open(input)?;
        debug!("opened {}", opened.path().display());

        self.advance(Stage::Validating);
        let mut source = opened.validate(self.config.limits)?;

        self.advance(Stage::Scanning);
        let summary = scan(source.by_ref(), &mut index, &self.config.scan_options())?;
        let bytes_read = source.bytes_consumed();
        debug!(
            "scanned {} lines ({} skipped, {bytes_read} bytes), {} matches in {} ms",
            summary.lines_read,
            summary.lines_skipped,
            summary.matches,
            start.elapsed().as_millis()
        );

        if let Some(destination) = destination {
            self.advance(Stage::Exporting);
            export(&index, destination, self.config.style)?;
        }

        let report = RunReport {
            keywords: index.len(),
            summary,
            bytes_read,
            elapsed: start.elapsed(),
        };
        Ok((index, report))
    }

    fn advance(&mut self, next: Stage) {
        debug!("stage {} -> {next}", self.stage);
        self.stage = next;
    }
}
