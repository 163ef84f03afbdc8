//! Atomic PID file I/O.
//!
//! Format: a single line holding the decimal process id.

use std::fs;
use std::io;
use std::path::Path;

/// Writes `pid` to `path` via a sibling temp file and a rename, so readers
/// never observe a half-written file.
pub fn write_pidfile(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, format!("{}\n", pid))?;
    fs::rename(&temp_path, path)
}

pub fn read_pidfile(path: &Path) -> io::Result<u32> {
    let content = fs::read_to_string(path)?;
    parse_pid(&content)
}

/// Removes the PID file. Missing files are not an error.
pub fn delete_pidfile(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn parse_pid(content: &str) -> io::Result<u32> {
    content
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid > 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing or invalid PID"))
}
