//! Archive unpacking.
//!
//! Blocking code; callers run it on the blocking pool.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use super::AcquireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `dest`, replacing whatever `dest` held before.
pub(crate) fn extract_archive(archive: &Path, dest: &Path) -> Result<(), AcquireError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = ArchiveKind::from_name(&name).ok_or(AcquireError::UnsupportedArchive(name))?;

    match fs::remove_dir_all(dest) {
        Ok(()) => debug!(path = %dest.display(), "Removed previous engine tree"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(AcquireError::io(dest, e)),
    }
    fs::create_dir_all(dest).map_err(|e| AcquireError::io(dest, e))?;

    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest),
        ArchiveKind::TarGz => extract_tar_gz(archive, dest),
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), AcquireError> {
    let file = File::open(archive).map_err(|e| AcquireError::io(archive, e))?;
    let mut zip =
        zip::ZipArchive::new(file).map_err(|e| AcquireError::extraction(archive, e))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| AcquireError::extraction(archive, e))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| AcquireError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| AcquireError::io(parent, e))?;
        }

        let mut out = File::create(&out_path).map_err(|e| AcquireError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| AcquireError::io(&out_path, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|e| AcquireError::io(&out_path, e))?;
        }
    }

    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), AcquireError> {
    let file = File::open(archive).map_err(|e| AcquireError::io(archive, e))?;
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    // `unpack` refuses entries that would land outside `dest`.
    tar.unpack(dest)
        .map_err(|e| AcquireError::extraction(archive, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o755);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_archive_kind_from_name() {
        assert_eq!(ArchiveKind::from_name("a.ZIP"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_name("a.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("a.tgz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("a.7z"), None);
    }

    #[test]
    fn test_extract_zip_nested() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("engine.zip");
        write_zip(
            &archive,
            &[("build/bin/llama-server", b"#!/bin/sh\n"), ("build/bin/libggml.so", b"lib")],
        );

        let dest = dir.path().join("engine");
        extract_archive(&archive, &dest).unwrap();

        let binary = dest.join("build/bin/llama-server");
        assert_eq!(fs::read(&binary).unwrap(), b"#!/bin/sh\n");
        assert!(dest.join("build/bin/libggml.so").is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&binary).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_extract_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("engine");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), b"old").unwrap();

        let archive = dir.path().join("engine.zip");
        write_zip(&archive, &[("llama-server", b"new")]);
        extract_archive(&archive, &dest).unwrap();

        assert!(!dest.join("stale.txt").exists());
        assert!(dest.join("llama-server").is_file());
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("engine.tar.gz");
        write_tar_gz(&archive, &[("llama-b1/llama-server", b"bin")]);

        let dest = dir.path().join("engine");
        extract_archive(&archive, &dest).unwrap();
        assert_eq!(fs::read(dest.join("llama-b1/llama-server")).unwrap(), b"bin");
    }

    #[test]
    fn test_unsupported_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("engine.7z");
        fs::write(&archive, b"x").unwrap();

        let err = extract_archive(&archive, &dir.path().join("engine")).unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedArchive(_)));
    }

    #[test]
    fn test_corrupt_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("engine.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract_archive(&archive, &dir.path().join("engine")).unwrap_err();
        assert!(matches!(err, AcquireError::Extraction { .. }));
    }
}
