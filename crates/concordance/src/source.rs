use std::fs::{self, File, Metadata};
use std::io::{self, BufRead, BufReader};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_LINE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024 * 1024;
const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Size caps enforced while opening and streaming the input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SourceLimits {
    /// Longest line content accepted, terminator excluded.
    pub max_line_bytes: usize,
    pub max_file_bytes: u64,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// A line of input and where it sits in the file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Line {
    /// 1-based.
    pub number: u64,
    /// Byte offset of the first byte of the line.
    pub offset: u64,
    /// Line content without `\n` or `\r\n`.
    pub text: String,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{} is a symbolic link", .0.display())]
    Symlink(PathBuf),
    #[error("{} is not a regular file", .0.display())]
    NotRegularFile(PathBuf),
    #[error("{} was replaced while it was being opened", .0.display())]
    Replaced(PathBuf),
    #[error("{} is {size} bytes, above the {limit} byte limit", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line_number} is {len} bytes, above the {limit} byte limit")]
    LineTooLong {
        line_number: u64,
        len: u64,
        limit: usize,
    },
    #[error("failed to read line {line_number}: {source}")]
    Read {
        line_number: u64,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    /// Whether scanning can continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::LineTooLong { .. })
    }
}

/// An input file that has been opened but not yet checked against limits.
#[derive(Debug)]
pub struct OpenedInput {
    path: PathBuf,
    file: File,
    inspected: Metadata,
}

impl OpenedInput {
    /// Open `path` without following a final symlink.
    ///
    /// The path is inspected with `symlink_metadata` first; symlinks and
    /// anything that is not a regular file are refused before any handle is
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let inspected = fs::symlink_metadata(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let file_type = inspected.file_type();
        if file_type.is_symlink() {
            return Err(SourceError::Symlink(path.to_path_buf()));
        }
        if !file_type.is_file() {
            return Err(SourceError::NotRegularFile(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            inspected,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Confirm the handle still refers to the inspected regular file and that
    /// it fits `limits`, then start streaming it.
    pub fn validate(self, limits: SourceLimits) -> Result<LineSource, SourceError> {
        let opened = self.file.metadata().map_err(|source| SourceError::Open {
            path: self.path.clone(),
            source,
        })?;
        if !opened.is_file() || !same_file(&self.inspected, &opened) {
            return Err(SourceError::Replaced(self.path));
        }
        let size = opened.len();
        if size > limits.max_file_bytes {
            return Err(SourceError::FileTooLarge {
                path: self.path,
                size,
                limit: limits.max_file_bytes,
            });
        }
        debug!("streaming {} ({size} bytes)", self.path.display());
        Ok(LineSource::from_reader(
            BufReader::with_capacity(READ_BUFFER_BYTES, self.file),
            limits.max_line_bytes,
        ))
    }
}

#[cfg(unix)]
fn same_file(inspected: &Metadata, opened: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    inspected.dev() == opened.dev() && inspected.ino() == opened.ino()
}

#[cfg(not(unix))]
fn same_file(inspected: &Metadata, opened: &Metadata) -> bool {
    inspected.file_type() == opened.file_type()
}

/// Lazy iterator over the lines of a reader.
///
/// Offsets count every byte consumed, terminators and skipped lines
/// included. Over-long lines are drained without being buffered and surface
/// as [`SourceError::LineTooLong`]; iteration then carries on. A read error
/// is yielded once and ends the sequence.
#[derive(Debug)]
pub struct LineSource<R = BufReader<File>> {
    reader: R,
    max_line_bytes: usize,
    next_number: u64,
    offset: u64,
    buf: Vec<u8>,
    finished: bool,
}

struct RawLine {
    consumed: u64,
    overflow: bool,
}

impl LineSource {
    /// Open, validate and stream `path` in one step.
    pub fn open(path: impl AsRef<Path>, limits: SourceLimits) -> Result<Self, SourceError> {
        OpenedInput::open(path)?.validate(limits)
    }
}

impl<R: BufRead> LineSource<R> {
    pub fn from_reader(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            max_line_bytes,
            next_number: 1,
            offset: 0,
            buf: Vec::new(),
            finished: false,
        }
    }

    /// Total bytes consumed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.offset
    }

    fn read_raw(&mut self) -> io::Result<Option<RawLine>> {
        self.buf.clear();
        // Room for the content plus a `\r\n` terminator.
        let keep_limit = self.max_line_bytes.saturating_add(2);
        let mut consumed = 0u64;
        let mut overflow = false;
        loop {
            let available = match self.reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if available.is_empty() {
                break;
            }
            let (take, done) = match available.iter().position(|b| *b == b'\n') {
                Some(idx) => (idx + 1, true),
                None => (available.len(), false),
            };
            if !overflow {
                if self.buf.len() + take > keep_limit {
                    overflow = true;
                    self.buf.clear();
                } else {
                    self.buf.extend_from_slice(&available[..take]);
                }
            }
            self.reader.consume(take);
            consumed += take as u64;
            if done {
                break;
            }
        }
        if consumed == 0 {
            return Ok(None);
        }
        if !overflow {
            strip_terminator(&mut self.buf);
            overflow = self.buf.len() > self.max_line_bytes;
        }
        Ok(Some(RawLine { consumed, overflow }))
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = Result<Line, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let number = self.next_number;
        let raw = match self.read_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.finished = true;
                return None;
            }
            Err(source) => {
                self.finished = true;
                return Some(Err(SourceError::Read {
                    line_number: number,
                    source,
                }));
            }
        };

        let offset = self.offset;
        self.offset += raw.consumed;
        self.next_number += 1;
        if raw.overflow {
            self.buf.clear();
            return Some(Err(SourceError::LineTooLong {
                line_number: number,
                len: raw.consumed,
                limit: self.max_line_bytes,
            }));
        }

        let text = match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        Some(Ok(Line {
            number,
            offset,
            text,
        }))
    }
}

impl<R: BufRead> FusedIterator for LineSource<R> {}

fn strip_terminator(buf: &mut Vec<u8>) {
    if buf.ends_with(b"\n") {
        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }
    }
}
