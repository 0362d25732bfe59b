use std::num::NonZeroUsize;
use std::thread;

use concordance_text::{context_window, tokenize};
use concordance_types::{DEFAULT_CONTEXT_WORDS, Occurrence};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::index::{EntryId, IndexError, KeywordIndex};
use crate::source::{Line, SourceError};

/// Lines handed to each worker per batch in parallel mode.
const LINES_PER_WORKER: usize = 512;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScanOptions {
    /// Context radius on each side of a match, in tokens.
    pub context_words: usize,
    /// Worker threads; `1` scans on the calling thread.
    pub jobs: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            context_words: DEFAULT_CONTEXT_WORDS,
            jobs: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanSummary {
    pub lines_read: u64,
    pub lines_skipped: u64,
    pub tokens_seen: u64,
    pub matches: u64,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

type Hit = (EntryId, Occurrence);

/// Stream `lines` into `index`, recording every keyword match.
///
/// Over-long lines are logged and skipped; any other source error stops the
/// scan. Occurrences are recorded in line order whatever the job count.
pub fn scan<I>(
    lines: I,
    index: &mut KeywordIndex,
    options: &ScanOptions,
) -> Result<ScanSummary, ScanError>
where
    I: IntoIterator<Item = Result<Line, SourceError>>,
{
    let options = ScanOptions {
        jobs: options.jobs.clamp(1, available_jobs()),
        ..*options
    };
    if options.jobs > 1 {
        scan_parallel(lines.into_iter(), index, &options)
    } else {
        scan_sequential(lines.into_iter(), index, &options)
    }
}

/// Upper bound on scan workers: the parallelism the host reports, or one.
pub fn available_jobs() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn scan_sequential<I>(
    lines: I,
    index: &mut KeywordIndex,
    options: &ScanOptions,
) -> Result<ScanSummary, ScanError>
where
    I: Iterator<Item = Result<Line, SourceError>>,
{
    let mut summary = ScanSummary::default();
    let mut hits = Vec::new();
    for item in lines {
        let Some(line) = accept(item, &mut summary)? else {
            continue;
        };
        summary.tokens_seen += match_line(index, &line, options.context_words, &mut hits);
        merge(index, &mut hits, &mut summary)?;
    }
    Ok(summary)
}

fn scan_parallel<I>(
    mut lines: I,
    index: &mut KeywordIndex,
    options: &ScanOptions,
) -> Result<ScanSummary, ScanError>
where
    I: Iterator<Item = Result<Line, SourceError>>,
{
    let pool = match ThreadPoolBuilder::new().num_threads(options.jobs).build() {
        Ok(pool) => pool,
        Err(err) => {
            warn!(
                "could not start {} scan workers ({err}); scanning sequentially",
                options.jobs
            );
            return scan_sequential(lines, index, options);
        }
    };
    let batch_len = options.jobs.saturating_mul(LINES_PER_WORKER);
    debug!("scanning with {} workers", options.jobs);

    let mut summary = ScanSummary::default();
    let mut batch: Vec<Line> = Vec::with_capacity(batch_len);
    loop {
        batch.clear();
        let mut pending_error = None;
        for item in lines.by_ref() {
            match accept(item, &mut summary) {
                Ok(Some(line)) => batch.push(line),
                Ok(None) => {}
                Err(err) => {
                    pending_error = Some(err);
                    break;
                }
            }
            if batch.len() == batch_len {
                break;
            }
        }
        if batch.is_empty() && pending_error.is_none() {
            break;
        }

        let snapshot: &KeywordIndex = index;
        let results: Vec<(u64, Vec<Hit>)> = pool.install(|| {
            batch
                .par_chunks(LINES_PER_WORKER)
                .map(|chunk| {
                    let mut hits = Vec::new();
                    let mut tokens = 0;
                    for line in chunk {
                        tokens += match_line(snapshot, line, options.context_words, &mut hits);
                    }
                    (tokens, hits)
                })
                .collect()
        });

        for (tokens, mut hits) in results {
            summary.tokens_seen += tokens;
            merge(index, &mut hits, &mut summary)?;
        }
        if let Some(err) = pending_error {
            return Err(err);
        }
    }
    Ok(summary)
}

/// Count a source item, returning the line to match or `None` for a skipped
/// line.
fn accept(
    item: Result<Line, SourceError>,
    summary: &mut ScanSummary,
) -> Result<Option<Line>, ScanError> {
    match item {
        Ok(line) => {
            summary.lines_read += 1;
            Ok(Some(line))
        }
        Err(err) if err.is_recoverable() => {
            warn!("{err}; skipping");
            summary.lines_skipped += 1;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Find keyword tokens in `line`, pushing one hit per match. Returns the
/// number of tokens on the line.
fn match_line(
    index: &KeywordIndex,
    line: &Line,
    context_words: usize,
    hits: &mut Vec<Hit>,
) -> u64 {
    let tokens = tokenize(&line.text);
    for (i, token) in tokens.iter().enumerate() {
        let Some(id) = index.position(&token.text) else {
            continue;
        };
        let window = context_window(&tokens, i, context_words);
        hits.push((
            id,
            Occurrence {
                line_number: line.number,
                byte_offset: line.offset,
                column: token.offset,
                line_text: line.text.clone(),
                context_before: window.before,
                context_after: window.after,
            },
        ));
    }
    tokens.len() as u64
}

fn merge(
    index: &mut KeywordIndex,
    hits: &mut Vec<Hit>,
    summary: &mut ScanSummary,
) -> Result<(), ScanError> {
    for (id, occurrence) in hits.drain(..) {
        index.record(id, occurrence)?;
        summary.matches += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::source::LineSource;

    fn scan_text(
        text: &str,
        keywords: &[&str],
        options: ScanOptions,
    ) -> (KeywordIndex, ScanSummary) {
        let mut index = KeywordIndex::from_keywords(keywords).unwrap();
        let source = LineSource::from_reader(Cursor::new(text.as_bytes().to_vec()), 1024);
        let summary = scan(source, &mut index, &options).unwrap();
        (index, summary)
    }

    #[test]
    fn records_context_around_a_match() {
        let options = ScanOptions {
            context_words: 2,
            jobs: 1,
        };
        let (index, summary) = scan_text("the quick brown fox\n", &["fox"], options);
        let entry = index.lookup("fox").unwrap();
        assert_eq!(entry.count(), 1);
        let occ = &entry.occurrences()[0];
        assert_eq!(occ.context_before, "quick brown");
        assert_eq!(occ.context_after, "");
        assert_eq!(occ.column, 16);
        assert_eq!(occ.line_text, "the quick brown fox");
        assert_eq!(summary.tokens_seen, 4);
        assert_eq!(summary.matches, 1);
    }

    #[test]
    fn matches_every_occurrence_on_a_line() {
        let (index, _) = scan_text(
            "Error: error! ERROR?\n",
            &["error"],
            ScanOptions::default(),
        );
        let entry = index.lookup("error").unwrap();
        assert_eq!(entry.count(), 3);
        let columns: Vec<usize> = entry.occurrences().iter().map(|o| o.column).collect();
        assert_eq!(columns, vec![0, 7, 14]);
        assert_eq!(entry.occurrences()[1].context_before, "error");
        assert_eq!(entry.occurrences()[1].context_after, "error");
    }

    #[test]
    fn skips_over_long_lines_and_keeps_scanning() {
        let text = format!("fox one\n{} fox\nfox two\n", "x".repeat(2000));
        let (index, summary) = scan_text(&text, &["fox"], ScanOptions::default());
        let entry = index.lookup("fox").unwrap();
        let lines: Vec<u64> = entry.occurrences().iter().map(|o| o.line_number).collect();
        assert_eq!(lines, vec![1, 3]);
        assert_eq!(summary.lines_skipped, 1);
        assert_eq!(summary.lines_read, 2);
    }

    #[test]
    fn stops_on_fatal_source_errors() {
        let mut index = KeywordIndex::from_keywords(&["fox"]).unwrap();
        let items = vec![
            Ok(Line {
                number: 1,
                offset: 0,
                text: "fox".into(),
            }),
            Err(SourceError::Read {
                line_number: 2,
                source: std::io::Error::other("boom"),
            }),
        ];
        let err = scan(items, &mut index, &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::Source(SourceError::Read { .. })));
    }

    #[test]
    fn oversized_job_counts_are_capped() {
        let text = "fox one\nred fox\n";
        let (sequential, _) = scan_text(text, &["fox"], ScanOptions::default());
        let (capped, summary) = scan_text(
            text,
            &["fox"],
            ScanOptions {
                context_words: DEFAULT_CONTEXT_WORDS,
                jobs: usize::MAX,
            },
        );
        assert_eq!(summary.matches, 2);
        let seq: Vec<_> = sequential.entries().cloned().collect();
        let cap: Vec<_> = capped.entries().cloned().collect();
        assert_eq!(seq, cap);
    }

    #[test]
    fn parallel_scan_matches_sequential_scan() {
        let mut text = String::new();
        for i in 0..5000 {
            text.push_str(&format!("line {i} has a fox and maybe a Dog, said the fox.\n"));
            if i % 7 == 0 {
                text.push_str("nothing to see here\n");
            }
        }
        let keywords = ["fox", "dog", "cat"];
        let (sequential, seq_summary) = scan_text(&text, &keywords, ScanOptions::default());
        let (parallel, par_summary) = scan_text(
            &text,
            &keywords,
            ScanOptions {
                context_words: DEFAULT_CONTEXT_WORDS,
                jobs: 4,
            },
        );
        assert_eq!(seq_summary, par_summary);
        let seq: Vec<_> = sequential.entries().cloned().collect();
        let par: Vec<_> = parallel.entries().cloned().collect();
        assert_eq!(seq, par);
        assert_eq!(parallel.lookup("fox").unwrap().count(), 10_000);
        assert_eq!(parallel.lookup("cat").unwrap().count(), 0);
    }
}
