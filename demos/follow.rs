//! Follow a log file, printing only unread lines — the classic
//! `logtail`-style CLI wrapped around the library.
//!
//! Usage: cargo run --example follow -- <logfile>
//!
//! Run it, append to the file from another terminal, run it again: only the
//! new lines appear. SIGINT/SIGTERM flip the tailer's shutdown flag, so the
//! current wait is interrupted and the cursor is persisted before exit.

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::io::{self, Write};
use tailmark::Tailer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: follow <logfile>")?;

    let mut tail = Tailer::builder(path).open()?;

    let handle = tail.shutdown_handle();
    flag::register(SIGINT, handle.flag())?;
    flag::register(SIGTERM, handle.flag())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    while let Some(line) = tail.next_line_bytes()? {
        out.write_all(&line)?;
    }
    out.flush()?;

    tail.close()?;
    Ok(())
}
