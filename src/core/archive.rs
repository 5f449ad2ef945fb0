use crate::domain::model::ArtifactSet;
use crate::utils::error::{IngestError, Result};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Copy `input` into `output` through a fixed-size buffer until end of stream.
pub fn copy_bounded<R: Read + ?Sized, W: Write + ?Sized>(
    input: &mut R,
    output: &mut W,
) -> io::Result<u64> {
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        output.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Bundle every existing sibling of the primary file into `<stem>.zip`.
///
/// On failure the partially written archive is removed before the error is
/// returned.
pub fn pack(artifacts: &ArtifactSet) -> Result<PathBuf> {
    pack_with(artifacts, |path| File::open(path))
}

fn pack_with<R, F>(artifacts: &ArtifactSet, mut open: F) -> Result<PathBuf>
where
    R: Read,
    F: FnMut(&Path) -> io::Result<R>,
{
    let archive_path = artifacts.archive_path();

    match write_archive(artifacts, &archive_path, &mut open) {
        Ok(entries) => {
            tracing::info!(
                "📦 Packed {} files into {}",
                entries,
                archive_path.display()
            );
            Ok(archive_path)
        }
        Err(err) => {
            tracing::error!("Packing {} failed: {}", archive_path.display(), err);
            match fs::remove_file(&archive_path) {
                Ok(()) => tracing::debug!("Removed partial archive {}", archive_path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Could not remove partial archive {}: {}",
                    archive_path.display(),
                    e
                ),
            }
            Err(IngestError::IoError(err))
        }
    }
}

fn write_archive<R, F>(artifacts: &ArtifactSet, archive_path: &Path, open: &mut F) -> io::Result<usize>
where
    R: Read,
    F: FnMut(&Path) -> io::Result<R>,
{
    // 寫入器在任何出口都只會被 drop 一次
    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let mut entries = 0;

    for sibling in artifacts.siblings() {
        if !sibling.is_file() {
            tracing::debug!("Skipping missing artifact {}", sibling.display());
            continue;
        }
        let entry_name = sibling
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("artifact name is not UTF-8: {}", sibling.display()),
                )
            })?;

        let mut input = open(&sibling)?;
        zip.start_file(entry_name, entry_options()).map_err(io::Error::other)?;
        let copied = copy_bounded(&mut input, &mut zip)?;
        drop(input);
        tracing::debug!("Added {} ({} bytes)", entry_name, copied);
        entries += 1;
    }

    zip.finish().map_err(io::Error::other)?;
    Ok(entries)
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn write_siblings(dir: &Path, extensions: &[&str]) -> ArtifactSet {
        for ext in extensions {
            fs::write(dir.join(format!("foo.{}", ext)), format!("contents of {}", ext)).unwrap();
        }
        ArtifactSet::new(dir.join("foo.shp"))
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_archive_contains_all_five_siblings() {
        let dir = TempDir::new().unwrap();
        let artifacts = write_siblings(dir.path(), &["dbf", "fix", "prj", "shp", "shx"]);

        let archive = pack(&artifacts).unwrap();
        assert_eq!(archive, dir.path().join("foo.zip"));
        assert_eq!(
            entry_names(&archive),
            vec!["foo.dbf", "foo.fix", "foo.prj", "foo.shp", "foo.shx"]
        );

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name("foo.prj").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "contents of prj");
    }

    #[test]
    fn test_missing_siblings_are_skipped() {
        let dir = TempDir::new().unwrap();
        let artifacts = write_siblings(dir.path(), &["shp", "dbf"]);
        let archive = pack(&artifacts).unwrap();
        assert_eq!(entry_names(&archive), vec!["foo.dbf", "foo.shp"]);
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device went away"))
        }
    }

    #[test]
    fn test_failed_copy_removes_partial_archive() {
        let dir = TempDir::new().unwrap();
        let artifacts = write_siblings(dir.path(), &["dbf", "fix", "prj", "shp", "shx"]);

        let mut opened = 0;
        let result = pack_with(&artifacts, |path| -> io::Result<Box<dyn Read>> {
            opened += 1;
            if opened == 2 {
                Ok(Box::new(BrokenReader))
            } else {
                Ok(Box::new(File::open(path)?))
            }
        });

        assert!(matches!(result, Err(IngestError::IoError(_))));
        assert!(!artifacts.archive_path().exists());
    }

    #[test]
    fn test_unwritable_archive_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let artifacts = write_siblings(dir.path(), &["shp"]);
        fs::create_dir(artifacts.archive_path()).unwrap();
        assert!(matches!(pack(&artifacts), Err(IngestError::IoError(_))));
    }

    #[test]
    fn test_copy_bounded_handles_large_input() {
        let data = vec![7u8; COPY_BUFFER_SIZE * 3 + 17];
        let mut out = Vec::new();
        let copied = copy_bounded(&mut Cursor::new(&data), &mut out).unwrap();
        assert_eq!(copied as usize, data.len());
        assert_eq!(out, data);
    }
}
