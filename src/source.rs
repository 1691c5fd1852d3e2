use flate2::read::GzDecoder;
use log::{info, warn};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::fmt;
use std::path::{Path, PathBuf};

/// The currently open stream plus the identity it had at open time.
struct Handle {
    reader: Box<dyn BufRead>,
    inode: u64,
    /// Byte position after everything consumed so far. For gzip archives
    /// this counts decompressed bytes.
    pos: u64,
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("inode", &self.inode)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

/// Owns the single open handle and decides what to open next: the head of
/// the pending-archive queue while catching up, the live path otherwise.
///
/// `start_offset` is the persisted cursor offset at construction. It is
/// applied only to plain (non-gzip) opens and is zeroed by every reload, so
/// it only ever positions the live file's first handle in a session that
/// started without catch-up. Archives are consumed wholesale from the start.
#[derive(Debug)]
pub(crate) struct FileSource {
    live_path: PathBuf,
    pending: VecDeque<PathBuf>,
    handle: Option<Handle>,
    start_offset: u64,
}

impl FileSource {
    pub(crate) fn new(live_path: PathBuf, pending: Vec<PathBuf>, start_offset: u64) -> Self {
        FileSource {
            live_path,
            pending: pending.into(),
            handle: None,
            start_offset,
        }
    }

    /// True while rotated archives are still queued.
    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Current handle position, or `None` when no handle is open.
    pub(crate) fn position(&self) -> Option<u64> {
        self.handle.as_ref().map(|h| h.pos)
    }

    /// Read one line (terminator included) from the current handle, opening
    /// it first if necessary. An empty buffer means end of stream.
    pub(crate) fn read_line(&mut self) -> io::Result<Vec<u8>> {
        self.ensure_open()?;
        let mut line = Vec::new();
        if let Some(handle) = self.handle.as_mut() {
            let n = handle.reader.read_until(b'\n', &mut line)?;
            handle.pos += n as u64;
        }
        Ok(line)
    }

    /// Close the current handle and forget the start offset, so the next
    /// open (next archive, or the live file after rotation) reads from 0.
    pub(crate) fn reload(&mut self) {
        self.handle = None;
        self.start_offset = 0;
    }

    /// Release the handle. Safe to call when already closed.
    pub(crate) fn close(&mut self) {
        self.handle = None;
    }

    /// Decide whether the open live-file handle has gone stale.
    ///
    /// Invoked after an empty read outside catch-up mode. A missing live
    /// path or an inode mismatch means the file was rotated out from under
    /// us: reload and start over at offset 0. A same-inode size shrink below
    /// the read position means an in-place truncation — reload only when
    /// `copytruncate` handling is enabled, otherwise keep the stale position
    /// and leave a warning for the operator who opted out.
    pub(crate) fn check_rotate_truncate(&mut self, copytruncate: bool) -> io::Result<()> {
        let Some(handle) = self.handle.as_ref() else {
            return Ok(());
        };

        let meta = match fs::metadata(&self.live_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{} moved, reopening from the start", self.live_path.display());
                self.reload();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if meta.ino() != handle.inode {
            info!("{} rotated, reopening from the start", self.live_path.display());
            self.reload();
            return Ok(());
        }

        if meta.len() < handle.pos {
            if copytruncate {
                info!(
                    "{} truncated, reopening from the start",
                    self.live_path.display()
                );
                self.reload();
            } else {
                warn!(
                    "{} shrank below the current read position; continuing from a stale offset",
                    self.live_path.display()
                );
            }
        }
        Ok(())
    }

    fn ensure_open(&mut self) -> io::Result<()> {
        if self.handle.is_none() {
            let path = self
                .pending
                .pop_front()
                .unwrap_or_else(|| self.live_path.clone());
            self.handle = Some(self.open(&path)?);
        }
        Ok(())
    }

    fn open(&self, path: &Path) -> io::Result<Handle> {
        let file = File::open(path)?;
        let inode = file.metadata()?.ino();

        if path.extension().is_some_and(|ext| ext == "gz") {
            Ok(Handle {
                reader: Box::new(BufReader::new(GzDecoder::new(file))),
                inode,
                pos: 0,
            })
        } else {
            let mut file = file;
            file.seek(SeekFrom::Start(self.start_offset))?;
            Ok(Handle {
                reader: Box::new(BufReader::new(file)),
                inode,
                pos: self.start_offset,
            })
        }
    }
}
