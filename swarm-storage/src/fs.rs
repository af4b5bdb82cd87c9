//! File helpers shared by every store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use swarm_core::{SwarmError, SwarmResult};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `data` to `path` through a temp file in the same directory and a
/// rename, so readers see either the old or the new content.
pub fn atomic_write(path: &Path, data: &[u8]) -> SwarmResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;

    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".tmp-{}-{}-{}", std::process::id(), seq, name));

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_data()?;
        fs::rename(&tmp_path, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        SwarmError::io(path, e)
    })
}

/// Read a UTF-8 file; a missing file is `None`.
pub fn read_optional(path: &Path) -> SwarmResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SwarmError::io(path, e)),
    }
}

/// Read and decode a JSON file; a missing file is `None`, bad JSON is
/// `Malformed`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> SwarmResult<Option<T>> {
    let Some(text) = read_optional(path)? else {
        return Ok(None);
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| SwarmError::malformed(path, e.to_string()))
}

/// Encode as pretty JSON and write atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> SwarmResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SwarmError::malformed(path, e.to_string()))?;
    atomic_write(path, text.as_bytes())
}

/// Remove a file; a missing file is not an error. Returns whether a file
/// was removed.
pub fn remove_if_exists(path: &Path) -> SwarmResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SwarmError::io(path, e)),
    }
}

pub fn ensure_dir(dir: &Path) -> SwarmResult<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| SwarmError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_read_json_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        assert_eq!(read_json::<Sample>(&path).unwrap(), None);

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_json::<Sample>(&path), Err(SwarmError::Malformed { .. })));

        write_json(&path, &Sample { name: "α".into() }).unwrap();
        assert_eq!(read_json::<Sample>(&path).unwrap(), Some(Sample { name: "α".into() }));
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
    }
}
