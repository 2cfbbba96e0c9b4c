//! Point-in-time metadata capture.
//!
//! Capture runs when the event is logged, not when the OS reported it, so the
//! snapshot reflects whatever is on disk at that moment. Content hashing reads
//! the whole file and blocks for as long as that takes.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use md5::{Digest, Md5};

use super::records::{Details, Metadata};

/// Read buffer for content hashing.
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Capture the metadata of `path`.
///
/// Returns `None` when the path does not exist. Any other failure is folded
/// into [`Details::Error`] rather than returned.
#[must_use]
pub fn capture(path: &Path) -> Option<Details> {
    match fs::metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => Some(Details::Error {
            error: e.to_string(),
        }),
        Ok(meta) => Some(match read_snapshot(path, &meta) {
            Ok(snapshot) => Details::Snapshot(snapshot),
            Err(e) => Details::Error {
                error: e.to_string(),
            },
        }),
    }
}

fn read_snapshot(path: &Path, meta: &fs::Metadata) -> io::Result<Metadata> {
    let modified = meta.modified()?;
    let md5 = if meta.is_file() {
        Some(md5_file(path)?)
    } else {
        None
    };

    Ok(Metadata {
        size: meta.len(),
        created: to_local(created_time(meta).unwrap_or(modified)),
        modified: to_local(modified),
        permissions: permission_bits(meta),
        md5,
    })
}

/// Hex MD5 digest of the full content of `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn md5_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

fn to_local(time: SystemTime) -> DateTime<Local> {
    DateTime::<Local>::from(time)
}

/// Birth time where the platform has one, else the inode change time.
#[cfg(unix)]
fn created_time(meta: &fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::{Duration, UNIX_EPOCH};

    meta.created().ok().or_else(|| {
        let secs = u64::try_from(meta.ctime()).ok()?;
        let nanos = u32::try_from(meta.ctime_nsec()).ok()?;
        UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
    })
}

#[cfg(not(unix))]
fn created_time(meta: &fs::Metadata) -> Option<SystemTime> {
    meta.created().ok()
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:03o}", meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permission_bits(meta: &fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "444".to_string()
    } else {
        "666".to_string()
    }
}
