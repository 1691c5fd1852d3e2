//! The pull-based reader that composes the cursor, the archive queue and the
//! file source into a lazy sequence of unread lines.

use crate::archive;
use crate::cursor::Cursor;
use crate::error::TailError;
use crate::source::FileSource;
use chrono::Local;
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// What to do when line bytes do not decode under the configured encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Fail the read with [`TailError::Decode`].
    Strict,
    /// Substitute U+FFFD for malformed sequences and keep going.
    Replace,
}

/// Cooperative stop flag for a [`Tailer`].
///
/// Cloneable and `Send`. Once [`shutdown`](ShutdownHandle::shutdown) is
/// called (or the underlying flag is set any other way), the next pull —
/// including every poll inside a bounded wait — stops looping, persists the
/// cursor and reports exhaustion.
///
/// The crate never touches process-wide signal state; wiring this to
/// SIGINT/SIGTERM is the caller's job. [`flag`](ShutdownHandle::flag)
/// returns the raw atomic so it can be handed to e.g.
/// `signal_hook::flag::register` directly (see `demos/follow.rs`).
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Request a stop at the next opportunity.
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether a stop has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// The underlying flag, for handing to a signal registration API.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Configures and opens a [`Tailer`].
///
/// ```no_run
/// use std::time::Duration;
/// use tailmark::Tailer;
///
/// let mut tail = Tailer::builder("/var/log/app.log")
///     .paranoid(true)
///     .wait_timeout(Some(Duration::from_secs(5)))
///     .open()?;
///
/// while let Some(line) = tail.next_line()? {
///     print!("{line}");
/// }
/// # Ok::<(), tailmark::TailError>(())
/// ```
pub struct TailerBuilder {
    live_path: PathBuf,
    offset_file: Option<PathBuf>,
    paranoid: bool,
    copytruncate: bool,
    wait_step: Duration,
    wait_timeout: Option<Duration>,
    host_name: Option<String>,
    encoding: &'static Encoding,
    decode_policy: DecodePolicy,
}

impl TailerBuilder {
    fn new(live_path: PathBuf) -> Self {
        TailerBuilder {
            live_path,
            offset_file: None,
            paranoid: false,
            copytruncate: true,
            wait_step: Duration::from_millis(500),
            wait_timeout: Some(Duration::from_secs(20)),
            host_name: None,
            encoding: UTF_8,
            decode_policy: DecodePolicy::Strict,
        }
    }

    /// Where to persist the cursor. Default: `<live path>.offset`.
    pub fn offset_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.offset_file = Some(path.into());
        self
    }

    /// Persist the cursor after every delivered line instead of only at
    /// stream exhaustion and close. Default: `false`.
    pub fn paranoid(mut self, paranoid: bool) -> Self {
        self.paranoid = paranoid;
        self
    }

    /// Detect copytruncate-style rotation (same inode, size shrinks below
    /// the read position) and restart from offset 0 when it happens.
    /// When disabled, a shrunk file only produces a warning and reads
    /// continue from the now-stale position. Default: `true`.
    pub fn copytruncate(mut self, copytruncate: bool) -> Self {
        self.copytruncate = copytruncate;
        self
    }

    /// Poll interval while waiting for new data. Default: 500 ms.
    pub fn wait_step(mut self, step: Duration) -> Self {
        self.wait_step = step;
        self
    }

    /// Bound on the cumulative time spent waiting for new data before a
    /// pull reports exhaustion; `None` waits indefinitely. The waited total
    /// carries across pulls and only resets when a line arrives.
    /// Default: 20 s.
    pub fn wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Hostname used in archive names. Default: the short hostname of the
    /// machine (everything before the first `.`).
    pub fn host_name(mut self, host: impl Into<String>) -> Self {
        self.host_name = Some(host.into());
        self
    }

    /// Text encoding applied when returning lines as strings.
    /// Default: UTF-8.
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Error policy for malformed input under the configured encoding.
    /// Default: [`DecodePolicy::Strict`].
    pub fn decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Load the sidecar, compute the pending-archive queue and assemble the
    /// tailer. The target file itself is opened lazily on the first pull.
    ///
    /// # Errors
    ///
    /// [`TailError::CorruptState`] for a malformed sidecar, [`TailError::Io`]
    /// if the sidecar or the hostname cannot be read.
    pub fn open(self) -> Result<Tailer, TailError> {
        let offset_path = self
            .offset_file
            .unwrap_or_else(|| append_ext(&self.live_path, ".offset"));
        let cursor = Cursor::load(&offset_path)?;

        let host = match self.host_name {
            Some(host) => host,
            None => short_hostname()?,
        };

        let pending = match cursor.last_read {
            Some(last_read) => archive::pending_archives(
                last_read,
                Local::now().naive_local(),
                &self.live_path,
                &host,
            ),
            None => Vec::new(),
        };
        let catching_up = !pending.is_empty();
        if catching_up {
            debug!(
                "{} rotated file(s) pending before {}",
                pending.len(),
                self.live_path.display()
            );
        }

        Ok(Tailer {
            source: FileSource::new(self.live_path.clone(), pending, cursor.offset),
            live_path: self.live_path,
            offset_path,
            paranoid: self.paranoid,
            copytruncate: self.copytruncate,
            wait_step: self.wait_step,
            wait_timeout: self.wait_timeout,
            time_waited: Duration::ZERO,
            catching_up,
            encoding: self.encoding,
            decode_policy: self.decode_policy,
            shutdown: Arc::new(AtomicBool::new(false)),
            closed: false,
        })
    }
}

/// Reads only the lines a previous run has not read yet.
///
/// Each pull returns the next unread line, transparently consuming pending
/// rotated archives first, reopening the live file when rotation or
/// truncation is detected, and waiting (bounded) for new data at the end of
/// the live file. `Ok(None)` means "no more data right now" — not a closed
/// stream: appends to the live file make later pulls yield lines again, and
/// a fresh `Tailer` against the same sidecar resumes across process runs.
///
/// The cursor is persisted at stream exhaustion and on [`close`](Tailer::close)
/// (or after every line in paranoid mode). Delivery is therefore
/// at-least-once: a crash between delivering a line and the next persist
/// re-delivers from the last persisted position.
#[derive(Debug)]
pub struct Tailer {
    source: FileSource,
    live_path: PathBuf,
    offset_path: PathBuf,
    paranoid: bool,
    copytruncate: bool,
    wait_step: Duration,
    wait_timeout: Option<Duration>,
    time_waited: Duration,
    catching_up: bool,
    encoding: &'static Encoding,
    decode_policy: DecodePolicy,
    shutdown: Arc<AtomicBool>,
    closed: bool,
}

impl Tailer {
    /// Open a tailer with default configuration.
    pub fn open(path: impl Into<PathBuf>) -> Result<Tailer, TailError> {
        Tailer::builder(path).open()
    }

    /// Start configuring a tailer for the file at `path`.
    pub fn builder(path: impl Into<PathBuf>) -> TailerBuilder {
        TailerBuilder::new(path.into())
    }

    /// The file being tailed.
    pub fn path(&self) -> &Path {
        &self.live_path
    }

    /// The sidecar the cursor is persisted to.
    pub fn offset_path(&self) -> &Path {
        &self.offset_path
    }

    /// A stop flag for wiring to termination signals.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Pull the next unread line as raw bytes, terminator included.
    ///
    /// `Ok(None)` signals exhaustion for this pull only: the wait bound
    /// elapsed at the live file, a freshly advanced-to source was empty, or
    /// shutdown was requested. The cursor has been persisted by then, so a
    /// restarted process resumes correctly.
    pub fn next_line_bytes(&mut self) -> Result<Option<Vec<u8>>, TailError> {
        if self.shutdown.load(Ordering::Relaxed) {
            self.persist_cursor()?;
            return Ok(None);
        }

        let line = match self.get_next_line()? {
            Some(line) => line,
            None if self.catching_up => {
                debug!("archive exhausted, moving on");
                self.source.reload();
                self.catching_up = self.source.has_pending();
                match self.get_next_line()? {
                    Some(line) => line,
                    None => {
                        // The next source was empty on arrival. Exhausted for
                        // this pull; the stream itself stays usable.
                        self.persist_cursor()?;
                        return Ok(None);
                    }
                }
            }
            None => {
                debug!("no new data at {}", self.live_path.display());
                self.persist_cursor()?;
                return Ok(None);
            }
        };

        if self.paranoid {
            self.persist_cursor()?;
        }
        Ok(Some(line))
    }

    /// Pull the next unread line, decoded per the configured encoding and
    /// [`DecodePolicy`].
    pub fn next_line(&mut self) -> Result<Option<String>, TailError> {
        match self.next_line_bytes()? {
            Some(bytes) => Ok(Some(self.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Drain all currently unread lines.
    pub fn read_all_lines(&mut self) -> Result<Vec<String>, TailError> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line()? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Drain all currently unread lines into one string, original line
    /// terminators preserved. `Ok(None)` if nothing was read.
    ///
    /// The concatenated bytes are decoded once at the end, so a multi-byte
    /// sequence split across reads cannot be mangled by per-line decoding.
    pub fn read_all(&mut self) -> Result<Option<String>, TailError> {
        let mut buf = Vec::new();
        while let Some(line) = self.next_line_bytes()? {
            buf.extend_from_slice(&line);
        }
        if buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.decode(&buf)?))
    }

    /// Persist the cursor and release the handle, reporting any error.
    ///
    /// Dropping a `Tailer` performs the same finalization but swallows
    /// errors; call `close` where persistence failures must be visible.
    pub fn close(mut self) -> Result<(), TailError> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<(), TailError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let persisted = self.persist_cursor();
        self.source.close();
        persisted
    }

    /// Read a line from the current source; on end-of-file, either signal
    /// the caller to advance (catch-up) or check for rotation and wait for
    /// new data (live tail).
    fn get_next_line(&mut self) -> Result<Option<Vec<u8>>, TailError> {
        let line = self.source.read_line()?;
        if !line.is_empty() {
            return Ok(Some(line));
        }
        if self.catching_up {
            return Ok(None);
        }
        self.source.check_rotate_truncate(self.copytruncate)?;
        self.wait_for_update()
    }

    /// Bounded sleep/poll loop at the end of the live file. Re-checks
    /// rotation and truncation after every empty poll; a successful read
    /// zeroes the cumulative waited total.
    fn wait_for_update(&mut self) -> Result<Option<Vec<u8>>, TailError> {
        loop {
            if let Some(limit) = self.wait_timeout {
                if self.time_waited >= limit {
                    return Ok(None);
                }
            }
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(None);
            }

            thread::sleep(self.wait_step);
            self.time_waited += self.wait_step;

            let line = self.source.read_line()?;
            if !line.is_empty() {
                self.time_waited = Duration::ZERO;
                return Ok(Some(line));
            }
            self.source.check_rotate_truncate(self.copytruncate)?;
        }
    }

    /// Write (live inode, handle position, now) to the sidecar. Skipped
    /// when no handle is open — there is nothing to persist yet.
    fn persist_cursor(&mut self) -> Result<(), TailError> {
        let Some(offset) = self.source.position() else {
            return Ok(());
        };
        let inode = fs::metadata(&self.live_path)?.ino();
        Cursor::save(&self.offset_path, inode, offset, Local::now().naive_local())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, TailError> {
        let (text, _, had_errors) = self.encoding.decode(bytes);
        if had_errors && self.decode_policy == DecodePolicy::Strict {
            return Err(TailError::Decode {
                encoding: self.encoding.name(),
            });
        }
        Ok(text.into_owned())
    }
}

/// Yields decoded lines until exhaustion.
///
/// Deliberately not fused: after `None`, appends to the live file make
/// further `next` calls yield lines again.
impl Iterator for Tailer {
    type Item = Result<String, TailError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            debug!("cursor not persisted during drop: {e}");
        }
    }
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(ext);
    name.into()
}

fn short_hostname() -> Result<String, TailError> {
    let name = nix::unistd::gethostname()
        .map_err(|errno| io::Error::from_raw_os_error(errno as i32))?;
    let name = name.to_string_lossy();
    Ok(name.split('.').next().unwrap_or(&name).to_string())
}
