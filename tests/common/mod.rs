#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::Duration;
use tailmark::{Tailer, TailerBuilder};

/// Fixed hostname so archive names are stable across test machines.
pub const TEST_HOST: &str = "testhost";

pub fn write_file(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

pub fn append(path: &Path, content: &str) {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.sync_data().unwrap();
}

pub fn write_gzip(path: &Path, content: &str) {
    let file = fs::File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap().sync_data().unwrap();
}

pub fn inode_of(path: &Path) -> u64 {
    fs::metadata(path).unwrap().ino()
}

/// Builder preset that never sleeps: end-of-file exhausts immediately.
pub fn fast_builder(path: &Path) -> TailerBuilder {
    Tailer::builder(path)
        .wait_timeout(Some(Duration::ZERO))
        .wait_step(Duration::from_millis(1))
        .host_name(TEST_HOST)
}

pub fn fast_tailer(path: &Path) -> Tailer {
    fast_builder(path).open().unwrap()
}

/// Builder preset that polls quickly but does wait, for rotation and
/// blocking-wait tests.
pub fn patient_builder(path: &Path) -> TailerBuilder {
    Tailer::builder(path)
        .wait_timeout(Some(Duration::from_secs(2)))
        .wait_step(Duration::from_millis(10))
        .host_name(TEST_HOST)
}
