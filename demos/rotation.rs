//! Rename-and-recreate rotation under a live reader.
//!
//! A writer thread rotates the file mid-tail; the reader detects the inode
//! change and continues from the start of the new file without missing it.

use std::fs;
use std::thread;
use std::time::Duration;
use tailmark::Tailer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let dir = tempfile::tempdir()?;
    let log = dir.path().join("app.log");
    fs::write(&log, "before-1\nbefore-2\n")?;

    let mut tail = Tailer::builder(&log)
        .wait_step(Duration::from_millis(50))
        .wait_timeout(Some(Duration::from_secs(3)))
        .open()?;

    let log_clone = log.clone();
    let rotated = dir.path().join("app.log.1");
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        fs::rename(&log_clone, &rotated).unwrap();
        fs::write(&log_clone, "after-1\nafter-2\n").unwrap();
        println!("[writer] rotated the log");
    });

    while let Some(line) = tail.next_line()? {
        print!("[reader] {line}");
    }
    writer.join().unwrap();

    tail.close()?;
    println!("\nDone — the reader crossed the rotation without restarting.");

    Ok(())
}
