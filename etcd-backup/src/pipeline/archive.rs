//! Tar + zstd packaging of a snapshot file or directory.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Extension appended by [`archive`].
pub const ARCHIVE_EXT: &str = ".tar.zst";

const ZSTD_LEVEL: i32 = 3;

/// Pack `src` (a file or a directory) into a zstd-compressed tarball at `dst`.
///
/// Entries are stored under `src`'s file name with normalised headers, so the
/// same input always yields the same archive.
pub fn archive(src: &Path, dst: &Path) -> std::io::Result<()> {
    let name = src.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("cannot archive {}: no file name", src.display()),
        )
    })?;

    let out = BufWriter::new(File::create(dst)?);
    let encoder = zstd::Encoder::new(out, ZSTD_LEVEL)?;

    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    if src.is_dir() {
        builder.append_dir_all(name, src)?;
    } else {
        builder.append_path_with_name(src, name)?;
    }

    let encoder = builder.into_inner()?;
    let mut out = encoder.finish()?;
    std::io::Write::flush(&mut out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let decoder = zstd::Decoder::new(File::open(path).unwrap()).unwrap();
        let mut archive = tar::Archive::new(decoder);
        let mut out = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            out.push((name, data));
        }
        out.sort();
        out
    }

    #[test]
    fn test_archive_single_snapshot_file() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let src = temp_dir.path().join("host-etcd-backup-v3-2024-05-01T10-00-00.db");
        std::fs::write(&src, b"snapshot bytes")?;
        let dst = temp_dir.path().join("out.tar.zst");

        archive(&src, &dst)?;

        assert_eq!(
            entries(&dst),
            vec![(
                "host-etcd-backup-v3-2024-05-01T10-00-00.db".to_string(),
                b"snapshot bytes".to_vec()
            )]
        );
        Ok(())
    }

    #[test]
    fn test_archive_v2_backup_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let src = temp_dir.path().join("host-etcd-backup-v2-2024-05-01T10-00-00");
        std::fs::create_dir_all(src.join("member/snap"))?;
        std::fs::write(src.join("member/snap/db"), b"v2 data")?;
        let dst = temp_dir.path().join("v2.tar.zst");

        archive(&src, &dst)?;

        let found = entries(&dst);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "host-etcd-backup-v2-2024-05-01T10-00-00/member/snap/db");
        assert_eq!(found[0].1, b"v2 data");
        Ok(())
    }

    #[test]
    fn test_archive_is_deterministic() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let src = temp_dir.path().join("snap.db");
        std::fs::write(&src, vec![7u8; 4096])?;

        let a = temp_dir.path().join("a.tar.zst");
        let b = temp_dir.path().join("b.tar.zst");
        archive(&src, &a)?;
        archive(&src, &b)?;

        assert_eq!(std::fs::read(a)?, std::fs::read(b)?);
        Ok(())
    }

    #[test]
    fn test_archive_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = archive(&temp_dir.path().join("missing.db"), &temp_dir.path().join("x.tar.zst"));
        assert!(result.is_err());
    }
}
