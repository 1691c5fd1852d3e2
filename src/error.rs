use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while tailing a file or working with its offset sidecar.
#[derive(Error, Debug)]
pub enum TailError {
    /// The offset sidecar exists but could not be parsed.
    ///
    /// Deliberately fatal: silently resetting to offset 0 would re-deliver
    /// every line the previous runs already consumed.
    #[error("corrupt offset file {}: {}", path.display(), detail)]
    CorruptState { path: PathBuf, detail: String },

    /// Line bytes did not decode under the configured encoding in strict mode.
    #[error("line is not valid {encoding}")]
    Decode { encoding: &'static str },

    #[error(transparent)]
    Io(#[from] io::Error),
}
