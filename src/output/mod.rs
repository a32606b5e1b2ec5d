//! Atomic writers for entry files and JSON summaries
//!
//! Every file goes to its own `<path>.<pid>.<seq>.tmp` first, is synced, then
//! renamed over the destination so a reader never sees a half-written file.
//! Concurrent writers of the same destination never share a temp file; the
//! last rename wins.

use crate::error::{AnalyzerError, Result};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write one value per line
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut written = 0;
    write_atomic(path, |writer| {
        for line in lines {
            writer.write_all(line.as_ref().as_bytes())?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        Ok(())
    })?;
    Ok(written)
}

/// Write `value` as pretty JSON with a trailing newline
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| {
        AnalyzerError::json(e, format!("Failed to serialize {}", path.display()))
    })?;
    write_atomic(path, |writer| {
        writer.write_all(&json)?;
        writer.write_all(b"\n")
    })
}

fn write_atomic<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> std::io::Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AnalyzerError::io(
                e,
                format!("Failed to create output directory: {}", parent.display()),
            )
        })?;
    }

    let temp_path = temp_path(path);
    let file = fs::File::create(&temp_path).map_err(|e| {
        AnalyzerError::io(
            e,
            format!("Failed to create temp file: {}", temp_path.display()),
        )
    })?;

    let mut writer = BufWriter::new(file);
    let written = body(&mut writer).and_then(|_| writer.flush());
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(AnalyzerError::io(
            e,
            format!("Failed to write {}", temp_path.display()),
        ));
    }

    let file = writer.into_inner().map_err(|e| {
        AnalyzerError::io(
            e.into_error(),
            format!("Failed to flush {}", temp_path.display()),
        )
    })?;
    file.sync_all().map_err(|e| {
        AnalyzerError::io(e, format!("Failed to sync {}", temp_path.display()))
    })?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        AnalyzerError::io(
            e,
            format!(
                "Failed to move {} into place at {}",
                temp_path.display(),
                path.display()
            ),
        )
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.{}.tmp", std::process::id(), seq));
    PathBuf::from(name)
}

/// Make a logical source name safe to embed in a file name
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_lines_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.txt");

        let written = write_lines(&path, ["a.com", "b.com"]).unwrap();
        assert_eq!(written, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a.com\nb.com\n");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("out.txt")]);
    }

    #[test]
    fn test_temp_paths_are_unique_per_write() {
        let path = Path::new("/tmp/summary.json");
        assert_ne!(temp_path(path), temp_path(path));
    }

    #[test]
    fn test_concurrent_writers_same_destination() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.txt");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        write_lines(&path, ["x.com", "y.com"]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "x.com\ny.com\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_json_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.json");

        write_json(&path, &vec![1, 2, 3]).unwrap();
        write_json(&path, &vec![4]).unwrap();

        let value: Vec<u32> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, vec![4]);
    }

    #[test]
    fn test_write_into_file_as_directory_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let result = write_lines(&blocker.join("out.txt"), ["a"]);
        assert!(matches!(result, Err(AnalyzerError::Io { .. })));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("abuse.ch/urlhaus"), "abuse.ch_urlhaus");
        assert_eq!(sanitize_component("My List"), "My_List");
        assert_eq!(sanitize_component("plain-name"), "plain-name");
    }
}
