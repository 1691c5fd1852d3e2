//! Durable resume — two sessions against the same sidecar.
//!
//! Session 1 drains the file and persists its cursor on close. Lines
//! appended between runs are the only thing session 2 sees.

use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;
use tailmark::Tailer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let log = dir.path().join("app.log");
    std::fs::write(&log, "alpha\nbeta\n")?;

    let mut tail = Tailer::builder(&log)
        .wait_timeout(Some(Duration::ZERO))
        .open()?;
    for line in tail.read_all_lines()? {
        print!("[session 1] {line}");
    }
    tail.close()?;

    // More lines arrive while no reader is running.
    let mut file = OpenOptions::new().append(true).open(&log)?;
    writeln!(file, "gamma")?;
    writeln!(file, "delta")?;
    drop(file);

    // Session 2 picks up exactly where session 1 stopped.
    let mut tail = Tailer::builder(&log)
        .wait_timeout(Some(Duration::ZERO))
        .open()?;
    for line in tail.read_all_lines()? {
        print!("[session 2] {line}");
    }
    tail.close()?;

    Ok(())
}
