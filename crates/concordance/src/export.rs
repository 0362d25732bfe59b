use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::ser::{Serialize, SerializeMap, Serializer};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::index::KeywordIndex;

const STDOUT_MARKER: &str = "-";

/// Where the report goes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    fn display_path(&self) -> PathBuf {
        match self {
            Destination::Stdout => PathBuf::from(STDOUT_MARKER),
            Destination::File(path) => path.clone(),
        }
    }
}

impl From<PathBuf> for Destination {
    /// `-` selects stdout; anything else is a file path.
    fn from(path: PathBuf) -> Self {
        if path.as_os_str() == STDOUT_MARKER {
            Destination::Stdout
        } else {
            Destination::File(path)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum JsonStyle {
    #[default]
    Pretty,
    Compact,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write report to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Keyword map in bucket order; each value carries `frequency` and
/// `occurrences`.
impl Serialize for KeywordIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for entry in self.entries() {
            map.serialize_entry(entry.keyword(), entry)?;
        }
        map.end()
    }
}

/// Serialize `index` into `writer`, followed by a newline.
pub fn write_json<W: Write>(
    index: &KeywordIndex,
    mut writer: W,
    style: JsonStyle,
) -> io::Result<()> {
    match style {
        JsonStyle::Pretty => serde_json::to_writer_pretty(&mut writer, index)?,
        JsonStyle::Compact => serde_json::to_writer(&mut writer, index)?,
    }
    writer.write_all(b"\n")?;
    writer.flush()
}

pub fn to_json_string(index: &KeywordIndex, style: JsonStyle) -> serde_json::Result<String> {
    match style {
        JsonStyle::Pretty => serde_json::to_string_pretty(index),
        JsonStyle::Compact => serde_json::to_string(index),
    }
}

/// Emit the report to `destination`.
///
/// Files are written to a uniquely named temporary file in the target's
/// directory, synced and renamed over the target, so a failed run never
/// leaves a truncated report behind.
pub fn export(
    index: &KeywordIndex,
    destination: &Destination,
    style: JsonStyle,
) -> Result<(), ExportError> {
    let result = match destination {
        Destination::Stdout => write_json(index, BufWriter::new(io::stdout().lock()), style),
        Destination::File(path) => write_atomically(index, path, style),
    };
    result.map_err(|source| ExportError::Write {
        path: destination.display_path(),
        source,
    })
}

fn write_atomically(index: &KeywordIndex, path: &Path, style: JsonStyle) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    // Dropping `temp` on any early return removes it.
    let mut temp = NamedTempFile::new_in(dir)?;
    debug!("writing report via {}", temp.path().display());
    write_json(index, BufWriter::new(temp.as_file_mut()), style)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    Ok(())
}
