//! Owner-only file writes for secret material.
//!
//! Credential files and encrypted artifacts are created with mode 0600 so
//! nothing else on the host can read them while the run is in progress.

use std::fs;
use std::io::Write;
use std::path::Path;

/// Unix mode for every secret file this tool writes.
pub const PRIVATE_MODE: u32 = 0o600;

/// Write `data` to `path`, creating or truncating it with owner read/write only.
#[cfg(unix)]
pub fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(PRIVATE_MODE)
        .open(path)?;

    // mode() only applies on creation; tighten a pre-existing file as well
    file.set_permissions(fs::Permissions::from_mode(PRIVATE_MODE))?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(not(unix))]
pub fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    fs::write(path, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    #[cfg(unix)]
    fn test_write_private_sets_owner_only_mode() -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("cluster-a-key.pem");

        write_private(&path, b"-----BEGIN KEY-----")?;

        let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read(&path)?, b"-----BEGIN KEY-----");

        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_write_private_tightens_existing_file() -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("ca.pem");
        fs::write(&path, b"old")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

        write_private(&path, b"new")?;

        let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read(&path)?, b"new");

        Ok(())
    }
}
