//! Filesystem helpers for generated artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{CertLabError, Result};

const UNSAFE_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' '];

/// Replaces characters that are awkward in file names with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Creates `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| CertLabError::io("failed to create output directory", e))
}

/// Joins `dir` with the sanitized `stem` plus `suffix`.
pub fn artifact_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}{suffix}", sanitize_filename(stem)))
}

pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .map_err(|e| CertLabError::io(format!("failed to write {}", path.display()), e))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Writes a private key, then restricts it to owner read/write on Unix.
pub fn write_private_key(path: &Path, pem: &str) -> Result<()> {
    write_file(path, pem.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| CertLabError::io("failed to set key permissions", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My CA: v2/prod"), "My_CA__v2_prod");
        assert_eq!(sanitize_filename("*.example.com"), "_.example.com");
        assert_eq!(sanitize_filename("plain"), "plain");
    }

    #[test]
    fn test_artifact_path() {
        let path = artifact_path(Path::new("out"), "Test CA", "-ca.crt");
        assert_eq!(path, Path::new("out").join("Test_CA-ca.crt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("k.key");
        write_private_key(&path, "secret").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
