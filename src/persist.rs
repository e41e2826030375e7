//! Writing a downloaded report to disk as comma-delimited text
//!
//! The artifact is decoded as UTF-8, split into lines, parsed as delimited
//! records and written back out with minimal quoting and `\r\n` row
//! terminators. Every input line gives one output row; a blank line gives an
//! empty row. Feeding the same bytes through twice yields byte-identical files.

use crate::config::{FileCollisionAction, OutputConfig};
use crate::error::{Error, Result};
use crate::utils::{get_unique_path, parent_dir};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Terminator written after every row
pub const ROW_TERMINATOR: &[u8] = b"\r\n";

/// What the persister wrote
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistSummary {
    /// File that received the rows
    pub path: PathBuf,
    /// Number of delimited rows written
    pub rows_written: usize,
    /// Number of bytes written by this run
    pub bytes_written: usize,
}

/// Re-encode artifact bytes as normalized comma-delimited rows
///
/// Returns the encoded rows and how many there are. A leading byte order mark
/// is dropped; rows may have differing field counts.
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] if the bytes are not UTF-8 and
/// [`Error::Csv`] if a record cannot be parsed.
pub fn normalize_rows(bytes: &[u8]) -> Result<(Vec<u8>, usize)> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text).as_bytes();

    let mut encoded = Vec::with_capacity(text.len() + text.len() / 16);
    let mut rows = 0;
    // Consecutive non-blank lines, handed to the csv reader in one go
    let mut pending: Option<Range<usize>> = None;

    for line in logical_lines(text) {
        if line.is_empty() {
            if let Some(run) = pending.take() {
                rows += encode_records(&text[run], &mut encoded)?;
            }
            // csv::Writer quotes a lone empty field, so the bare row is written here
            encoded.extend_from_slice(ROW_TERMINATOR);
            rows += 1;
        } else {
            pending = Some(match pending {
                Some(run) => run.start..line.end,
                None => line,
            });
        }
    }
    if let Some(run) = pending {
        rows += encode_records(&text[run], &mut encoded)?;
    }

    Ok((encoded, rows))
}

fn encode_records(text: &[u8], out: &mut Vec<u8>) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text);
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::CRLF)
        .from_writer(out);

    let mut rows = 0;
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        writer.write_byte_record(&record)?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LineState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Byte ranges of each line, without terminators
///
/// Lines end at `\n`, `\r\n` or `\r`, except inside a quoted field. A final
/// terminator does not start another line.
fn logical_lines(text: &[u8]) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut state = LineState::FieldStart;
    let mut start = 0;
    let mut i = 0;

    while i < text.len() {
        let byte = text[i];
        if state != LineState::Quoted && (byte == b'\n' || byte == b'\r') {
            lines.push(start..i);
            i += if byte == b'\r' && text.get(i + 1) == Some(&b'\n') {
                2
            } else {
                1
            };
            start = i;
            state = LineState::FieldStart;
            continue;
        }

        state = match (state, byte) {
            (LineState::FieldStart, b'"') => LineState::Quoted,
            (LineState::Quoted, b'"') => LineState::QuoteInQuoted,
            (LineState::Quoted, _) => LineState::Quoted,
            (LineState::QuoteInQuoted, b'"') => LineState::Quoted,
            (_, b',') => LineState::FieldStart,
            _ => LineState::Unquoted,
        };
        i += 1;
    }

    if start < text.len() {
        lines.push(start..text.len());
    }
    lines
}

/// Write a downloaded report to the configured output
///
/// The destination is chosen by [`get_unique_path`]. `Overwrite` goes through
/// a temporary file in the same directory that is then renamed over the
/// destination, so a failed write never leaves a half-written report behind.
/// A symlinked destination is followed and the file it points to replaced.
pub fn write_report(output: &OutputConfig, bytes: &[u8]) -> Result<PersistSummary> {
    let (encoded, rows) = normalize_rows(bytes)?;
    let target = get_unique_path(&output.path, output.on_existing)?;

    match output.on_existing {
        FileCollisionAction::Overwrite => {
            let destination = resolve_symlink(&target);
            let mut temp = new_temp_file(parent_dir(&destination))?;
            temp.write_all(&encoded)?;
            temp.as_file().sync_all()?;

            // Keep the mode of a file being replaced
            if let Ok(metadata) = fs::metadata(&destination) {
                fs::set_permissions(temp.path(), metadata.permissions())?;
            }
            temp.persist(&destination).map_err(|e| Error::Io(e.error))?;
        }
        FileCollisionAction::Append => {
            let mut file = OpenOptions::new().create(true).append(true).open(&target)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        FileCollisionAction::Rename | FileCollisionAction::Refuse => {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => Error::OutputExists {
                        path: target.clone(),
                    },
                    _ => Error::Io(e),
                })?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
    }

    debug!(action = ?output.on_existing, bytes = encoded.len(), "report written");
    info!(path = %target.display(), rows, "Saving report...");

    Ok(PersistSummary {
        path: target,
        rows_written: rows,
        bytes_written: encoded.len(),
    })
}

/// Follow a symlinked destination; dangling links are replaced as they are
fn resolve_symlink(path: &Path) -> PathBuf {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Temporary sibling file with the mode a plain create would give
fn new_temp_file(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".report-").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // The umask is applied on creation
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}
