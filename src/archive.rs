//! Recursive extraction of nested submission archives.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::{Error, Result};

/// Fail unless `path` carries a `.zip` extension.
pub fn require_zip(path: &Path) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) == Some("zip") {
        Ok(())
    } else {
        Err(Error::NotAZipArchive(path.to_path_buf()))
    }
}

/// Extract `archive_path` into a sibling directory named after its stem,
/// then extract any `.zip` files found at the top level of the output.
///
/// Returns the output directory.
pub fn extract_nested(archive_path: &Path) -> Result<PathBuf> {
    require_zip(archive_path)?;

    let output_dir = archive_path.with_extension("");
    debug!("extracting {} to {}", archive_path.display(), output_dir.display());
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    archive.extract(&output_dir)?;

    for entry in fs::read_dir(&output_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("zip") {
            extract_nested(&path)?;
        }
    }
    Ok(output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    fn stored() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            writer.start_file(*name, stored()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_rejects_non_zip_path() {
        assert!(matches!(
            extract_nested(Path::new("/tmp/submission.tar")),
            Err(Error::NotAZipArchive(_))
        ));
    }

    #[test]
    fn test_extracts_flat_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(&archive, &[("a.txt", b"alpha"), ("sub/b.txt", b"beta")]);

        let out = extract_nested(&archive).unwrap();
        assert_eq!(out, dir.path().join("bundle"));
        assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(out.join("sub/b.txt")).unwrap(), "beta");
    }

    #[test]
    fn test_extracts_nested_archive() {
        let dir = tempfile::tempdir().unwrap();

        // Inner archive becomes an entry of the outer one.
        let inner_path = dir.path().join("inner.zip");
        write_zip(&inner_path, &[("payload.txt", b"nested")]);
        let inner_bytes = fs::read(&inner_path).unwrap();

        let outer = dir.path().join("outer.zip");
        write_zip(&outer, &[("inner.zip", &inner_bytes), ("top.txt", b"top")]);

        let out = extract_nested(&outer).unwrap();
        assert_eq!(fs::read_to_string(out.join("top.txt")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(out.join("inner/payload.txt")).unwrap(),
            "nested"
        );
    }
}
