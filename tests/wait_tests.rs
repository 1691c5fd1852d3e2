mod common;

use common::{append, write_file};
use std::thread;
use std::time::{Duration, Instant};
use tailmark::{Cursor, Tailer};
use tempfile::tempdir;

#[test]
fn test_wait_detects_a_delayed_append() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("app.log");
    write_file(&log, "");

    let mut tail = Tailer::builder(&log)
        .wait_step(Duration::from_millis(10))
        .wait_timeout(Some(Duration::from_secs(5)))
        .host_name("testhost")
        .open()
        .unwrap();

    let log_clone = log.clone();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        append(&log_clone, "late\n");
    });

    let start = Instant::now();
    let line = tail.next_line().unwrap();
    let elapsed = start.elapsed();
    writer.join().unwrap();

    assert_eq!(line.as_deref(), Some("late\n"));
    assert!(
        elapsed < Duration::from_secs(2),
        "should wake up well before the timeout, took {:?}",
        elapsed
    );
}

#[test]
fn test_wait_timeout_bounds_the_wait() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("app.log");
    write_file(&log, "");

    let mut tail = Tailer::builder(&log)
        .wait_step(Duration::from_millis(50))
        .wait_timeout(Some(Duration::from_millis(200)))
        .host_name("testhost")
        .open()
        .unwrap();

    let start = Instant::now();
    let line = tail.next_line().unwrap();
    let elapsed = start.elapsed();

    assert_eq!(line, None, "quiet file must exhaust the pull");
    assert!(
        elapsed >= Duration::from_millis(180),
        "should wait approximately 200ms, took {:?}",
        elapsed
    );
    assert!(
        elapsed < Duration::from_millis(800),
        "should not overshoot the timeout by much, took {:?}",
        elapsed
    );
}

#[test]
fn test_waited_total_carries_across_pulls() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("app.log");
    write_file(&log, "");

    let mut tail = Tailer::builder(&log)
        .wait_step(Duration::from_millis(50))
        .wait_timeout(Some(Duration::from_millis(150)))
        .host_name("testhost")
        .open()
        .unwrap();

    assert_eq!(tail.next_line().unwrap(), None);

    // The budget is already spent, so the second pull gives up at once
    // instead of waiting another 150ms.
    let start = Instant::now();
    assert_eq!(tail.next_line().unwrap(), None);
    assert!(
        start.elapsed() < Duration::from_millis(40),
        "spent wait budget must not be granted again, took {:?}",
        start.elapsed()
    );
}

#[test]
fn test_successful_read_resets_the_wait_budget() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("app.log");
    write_file(&log, "");

    let mut tail = Tailer::builder(&log)
        .wait_step(Duration::from_millis(10))
        .wait_timeout(Some(Duration::from_millis(150)))
        .host_name("testhost")
        .open()
        .unwrap();

    let log_clone = log.clone();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        append(&log_clone, "first\n");
    });

    assert_eq!(tail.next_line().unwrap().as_deref(), Some("first\n"));
    writer.join().unwrap();

    // The successful read zeroed the waited total: the next quiet pull gets
    // the full timeout again.
    let start = Instant::now();
    assert_eq!(tail.next_line().unwrap(), None);
    assert!(
        start.elapsed() >= Duration::from_millis(120),
        "wait budget should have been reset, only waited {:?}",
        start.elapsed()
    );
}

#[test]
fn test_shutdown_interrupts_an_unbounded_wait() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("app.log");
    write_file(&log, "");

    let mut tail = Tailer::builder(&log)
        .wait_step(Duration::from_millis(10))
        .wait_timeout(None)
        .host_name("testhost")
        .open()
        .unwrap();
    let handle = tail.shutdown_handle();

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.shutdown();
    });

    let start = Instant::now();
    let line = tail.next_line().unwrap();
    let elapsed = start.elapsed();
    stopper.join().unwrap();

    assert_eq!(line, None);
    assert!(
        elapsed < Duration::from_secs(5),
        "shutdown must break the infinite wait, took {:?}",
        elapsed
    );

    // The interrupted pull persisted the cursor before reporting exhaustion.
    let cursor = Cursor::load(&dir.path().join("app.log.offset")).unwrap();
    assert_eq!(cursor.offset, 0);
    assert!(cursor.inode.is_some());
}

#[test]
fn test_shutdown_before_any_read_persists_nothing() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("app.log");
    write_file(&log, "a\n");

    let mut tail = Tailer::builder(&log).host_name("testhost").open().unwrap();
    tail.shutdown_handle().shutdown();

    assert_eq!(tail.next_line().unwrap(), None);
    assert!(
        !dir.path().join("app.log.offset").exists(),
        "no handle was ever open, so there is nothing to persist"
    );
}

#[test]
fn test_shutdown_handle_reports_state() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("app.log");
    write_file(&log, "");

    let tail = Tailer::builder(&log).host_name("testhost").open().unwrap();
    let handle = tail.shutdown_handle();

    assert!(!handle.is_shutdown());
    handle.shutdown();
    assert!(handle.is_shutdown());
    assert!(handle.flag().load(std::sync::atomic::Ordering::Relaxed));
}
