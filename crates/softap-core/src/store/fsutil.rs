use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::CoreError;

/// Replace `path` with `contents` through a temporary file in the same
/// directory, so readers see either the old or the new file.
pub(crate) fn atomic_write(path: &Path, contents: &[u8], mode: Option<u32>) -> Result<(), CoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| CoreError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CoreError::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| CoreError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| CoreError::io(tmp.path(), e))?;
    if let Some(mode) = mode {
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))
            .map_err(|e| CoreError::io(tmp.path(), e))?;
    }
    tmp.persist(path).map_err(|e| CoreError::io(path, e.error))?;
    Ok(())
}

/// Read `path`, treating a missing file as empty.
pub(crate) fn read_optional(path: &Path) -> Result<String, CoreError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(CoreError::io(path, e)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_and_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/file");
        atomic_write(&path, b"one", None).unwrap();
        atomic_write(&path, b"two", Some(0o604)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o604);
        // No temp files left behind.
        assert_eq!(fs::read_dir(dir.path().join("nested")).unwrap().count(), 1);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_optional(&dir.path().join("absent")).unwrap(), "");
    }
}
