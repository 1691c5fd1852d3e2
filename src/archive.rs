//! Discovery of hourly rotated archives.
//!
//! Rotation is assumed to be schedule-driven: once an hour an external tool
//! renames the live file to `<live-path>_<host>_<YYYYMMDDHH>.gz` and
//! recreates the live file. Discovery is therefore computed from wall-clock
//! deltas against the cursor's last-read timestamp, not from filesystem
//! events.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const HOUR_FORMAT: &str = "%Y%m%d%H";

/// Expected archive name for the hour bucket containing `hour`.
///
/// The name is the full live path with `_<host>_<YYYYMMDDHH>.gz` appended,
/// so archives sit next to the live file.
pub fn archive_path(live_path: &Path, host: &str, hour: NaiveDateTime) -> PathBuf {
    let mut name = OsString::from(live_path.as_os_str());
    name.push(format!("_{host}_{}.gz", hour.format(HOUR_FORMAT)));
    name.into()
}

/// Archives produced since `last_read` that still need to be consumed,
/// oldest first.
///
/// Scans every hour bucket from `floor(last_read)` through `floor(now)`
/// inclusive and keeps the candidates that exist on disk. If no full hour
/// boundary was crossed the result is empty. Hours with no archive are
/// skipped silently — a quiet hour may simply never have produced one.
pub fn pending_archives(
    last_read: NaiveDateTime,
    now: NaiveDateTime,
    live_path: &Path,
    host: &str,
) -> Vec<PathBuf> {
    let start = floor_to_hour(last_read);
    let end = floor_to_hour(now);
    if start >= end {
        return Vec::new();
    }

    let mut pending = Vec::new();
    let mut hour = start;
    while hour <= end {
        let candidate = archive_path(live_path, host, hour);
        if candidate.exists() {
            pending.push(candidate);
        }
        hour += TimeDelta::hours(1);
    }
    pending
}

fn floor_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(t.hour()))
}
