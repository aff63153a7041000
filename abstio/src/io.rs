use std::path::Path;

use anyhow::{Context, Result};
use fs_err::File;
use serde::Serialize;
use std::io::{Read, Write};

pub fn file_exists<I: AsRef<str>>(path: I) -> bool {
    Path::new(path.as_ref()).exists()
}

pub fn slurp_file<I: AsRef<str>>(path: I) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Writes bytes to a file, creating parent directories as needed. The file is first written next
/// to its destination and then renamed, so a failure never leaves a half-written artifact behind.
pub fn write_file<I: AsRef<str>>(path: I, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    let tmp = format!("{}.tmp", path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
    }
    fs_err::rename(&tmp, path).with_context(|| format!("writing {}", path))?;
    Ok(())
}

pub fn write_json<I: AsRef<str>, T: Serialize>(path: I, obj: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(obj)?;
    write_file(path, json.as_bytes())
}

/// Returns full paths, sorted
pub fn list_dir<I: AsRef<str>>(dir: I) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    match fs_err::read_dir(dir.as_ref()) {
        Ok(iter) => {
            for entry in iter.flatten() {
                files.push(entry.path().to_str().unwrap_or_default().to_string());
            }
        }
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Couldn't list {}: {}", dir.as_ref(), e),
    }
    files.retain(|f| !f.is_empty());
    files.sort();
    files
}

/// Makes sure the directory exists and contains no files.
pub fn clear_dir<I: AsRef<str>>(dir: I) -> Result<()> {
    let dir = dir.as_ref();
    if !file_exists(dir) {
        fs_err::create_dir_all(dir)?;
        return Ok(());
    }
    for path in list_dir(dir) {
        if Path::new(&path).is_file() {
            fs_err::remove_file(&path)?;
        }
    }
    Ok(())
}
