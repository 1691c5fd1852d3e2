//! The persisted read cursor and its sidecar file.

use crate::error::TailError;
use chrono::NaiveDateTime;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Timestamp layout used in the sidecar, e.g. `2026-08-05T14:03:22.000517`.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// How far a previous run got through the target file.
///
/// Persisted as three newline-terminated plain-text lines — inode, byte
/// offset, timestamp of the last read:
///
/// ```text
/// $ cat /var/log/app.log.offset
/// 9571245
/// 104832
/// 2026-08-05T14:03:22.000517
/// ```
///
/// The sidecar is the only durable state in the crate. A missing or empty
/// sidecar is a fresh start; a malformed one is a hard error
/// ([`TailError::CorruptState`]) rather than a silent reset, since resetting
/// would re-deliver everything the previous runs already consumed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    /// Inode of the target file when the cursor was written.
    pub inode: Option<u64>,

    /// Byte offset after the last line consumed.
    pub offset: u64,

    /// Local wall-clock time of the last write. Drives the discovery of
    /// rotated archives produced since the previous run.
    pub last_read: Option<NaiveDateTime>,
}

impl Cursor {
    /// Load a cursor from the sidecar at `path`.
    ///
    /// A sidecar that does not exist or is empty yields `Cursor::default()`
    /// (offset 0, no inode, no timestamp).
    ///
    /// # Errors
    ///
    /// [`TailError::CorruptState`] if the sidecar exists but any of the three
    /// fields is missing or unparsable; [`TailError::Io`] for other
    /// filesystem errors.
    pub fn load(path: &Path) -> Result<Self, TailError> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Cursor::default()),
            Err(e) => return Err(e.into()),
        };
        if raw.is_empty() {
            return Ok(Cursor::default());
        }

        let text = String::from_utf8(raw)
            .map_err(|_| corrupt(path, "sidecar is not valid UTF-8".to_string()))?;
        let mut lines = text.lines().map(str::trim);

        let inode = next_field(&mut lines, path, "inode")?;
        let inode: u64 = inode
            .parse()
            .map_err(|_| corrupt(path, format!("invalid inode {inode:?}")))?;

        let offset = next_field(&mut lines, path, "offset")?;
        let offset: u64 = offset
            .parse()
            .map_err(|_| corrupt(path, format!("invalid offset {offset:?}")))?;

        let stamp = next_field(&mut lines, path, "timestamp")?;
        let last_read = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map_err(|_| corrupt(path, format!("invalid timestamp {stamp:?}")))?;

        Ok(Cursor {
            inode: Some(inode),
            offset,
            last_read: Some(last_read),
        })
    }

    /// Overwrite the sidecar at `path` with the given cursor fields.
    ///
    /// A plain in-place overwrite, synced before returning. There is no
    /// tmp-and-rename dance: a crash mid-write can corrupt the sidecar, which
    /// is the documented trade-off of the at-least-once delivery contract.
    pub fn save(
        path: &Path,
        inode: u64,
        offset: u64,
        last_read: NaiveDateTime,
    ) -> Result<(), TailError> {
        let mut file = File::create(path)?;
        write!(
            file,
            "{inode}\n{offset}\n{}\n",
            last_read.format(TIMESTAMP_FORMAT)
        )?;
        file.sync_data()?;
        Ok(())
    }
}

fn next_field<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    path: &Path,
    name: &str,
) -> Result<&'a str, TailError> {
    match lines.next() {
        Some(line) if !line.is_empty() => Ok(line),
        _ => Err(corrupt(path, format!("missing {name} field"))),
    }
}

fn corrupt(path: &Path, detail: String) -> TailError {
    TailError::CorruptState {
        path: path.to_path_buf(),
        detail,
    }
}
