pub mod archive;
mod cursor;
mod error;
mod reader;
mod source;

pub use cursor::Cursor;
pub use error::TailError;
pub use reader::{DecodePolicy, ShutdownHandle, Tailer, TailerBuilder};
