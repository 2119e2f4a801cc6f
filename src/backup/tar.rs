use crate::backup::compress::{CompressorBuilder, GzipConfig};
use crate::backup::device::DeviceId;
use crate::backup::finish::Finish;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use function_name::named;
use std::io::{BufWriter, IntoInnerError};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

pub static ARCHIVE_FILE_EXT: &str = "tgz";

/// `<work_dir>/<device>.tgz`
pub fn archive_path(work_dir: &Path, device: &DeviceId) -> PathBuf {
    work_dir.join(format!("{}.{}", device, ARCHIVE_FILE_EXT))
}

fn ensure_non_empty_dir(dir: &Path) -> Result<()> {
    let has_entries = dir.is_dir() && std::fs::read_dir(dir)?.next().is_some();
    if has_entries {
        Ok(())
    } else {
        Err(Error::empty_backup_directory(dir))
    }
}

/// Creates `<work_dir>/<device>.tgz` from `<work_dir>/<device>/`
///
/// Entries are stored as `<device>/<relative path>`, walked in file name order
/// with deterministic headers, so identical directory contents always produce
/// the same tar stream. The archive is written to a temporary file next to
/// the destination and only renamed into place once complete.
#[named]
pub fn create_tgz(work_dir: &Path, device: &DeviceId, compressor: &GzipConfig) -> Result<PathBuf> {
    let src_dir = work_dir.join(device.as_str());
    ensure_non_empty_dir(&src_dir).add_fn_name(function_path!())?;

    let dst = archive_path(work_dir, device);
    tracing::info!("Compressing {:?} into {:?}", src_dir, dst);

    let mut tmp = NamedTempFile::new_in(work_dir)
        .map_err(Error::from)
        .add_msg(format!("Creating temporary archive in {:?} failed", work_dir))?;

    let entry_count = write_tgz(work_dir, &src_dir, compressor, &mut tmp)
        .add_msg(format!("Writing archive for {:?} failed", src_dir))
        .add_fn_name(function_path!())?;
    tracing::info!("Processed {} archive entries", entry_count);

    tmp.persist(&dst)
        .map_err(Error::from)
        .add_fn_name(function_path!())?;
    Ok(dst)
}

fn write_tgz(
    base_dir: &Path,
    src_dir: &Path,
    compressor: &GzipConfig,
    out: &mut NamedTempFile,
) -> Result<usize> {
    let mut writer = compressor
        .build_compressor(BufWriter::new(out))
        .map(BufWriter::new)
        .map(tar::Builder::new)?;
    writer.mode(tar::HeaderMode::Deterministic);
    writer.follow_symlinks(false);

    let mut entry_count = 0;
    for entry in WalkDir::new(src_dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let name = entry.path().strip_prefix(base_dir).map_err(|e| {
            Error::from(std::io::Error::other(e)).add_msg(format!(
                "Stripping {:?} from {:?} failed",
                base_dir,
                entry.path()
            ))
        })?;
        tracing::trace!("Including {:?} as {:?}", entry.path(), name);
        writer.append_path_with_name(entry.path(), name)?;
        entry_count += 1;
    }

    let compressor = writer
        .into_inner()?
        .into_inner()
        .map_err(IntoInnerError::into_error)?;
    Finish::finish(compressor)?
        .into_inner()
        .map_err(IntoInnerError::into_error)?;

    Ok(entry_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::collections::BTreeMap;
    use std::fs::File;
    use std::io::Read;
    use tempfile::TempDir;

    fn device() -> DeviceId {
        DeviceId::parse("ABC123").unwrap()
    }

    fn populate(work_dir: &Path) {
        let dir = work_dir.join("ABC123");
        std::fs::create_dir_all(dir.join("00")).unwrap();
        std::fs::create_dir_all(dir.join("ff")).unwrap();
        std::fs::write(dir.join("Manifest.db"), "manifest").unwrap();
        std::fs::write(dir.join("Info.plist"), "info").unwrap();
        std::fs::write(dir.join("ff").join("kept"), "kept").unwrap();
    }

    fn read_entries(archive: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(archive).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let name = e.path().unwrap().to_string_lossy().into_owned();
                let mut content = Vec::new();
                e.read_to_end(&mut content).unwrap();
                (name, content)
            })
            .collect()
    }

    fn decompress(archive: &Path) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(File::open(archive).unwrap())
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_archive_path() {
        assert_eq!(
            archive_path(Path::new("/work"), &device()),
            PathBuf::from("/work/ABC123.tgz")
        );
    }

    #[test]
    fn test_create_tgz_preserves_relative_paths() {
        let temp = TempDir::new().unwrap();
        populate(temp.path());

        let archive = create_tgz(temp.path(), &device(), &GzipConfig::default()).unwrap();

        assert_eq!(archive, temp.path().join("ABC123.tgz"));
        let entries = read_entries(&archive);
        assert_eq!(entries["ABC123/Manifest.db"], b"manifest");
        assert_eq!(entries["ABC123/Info.plist"], b"info");
        assert_eq!(entries["ABC123/ff/kept"], b"kept");
        assert!(entries.keys().any(|k| k.trim_end_matches('/') == "ABC123/00"));
        assert!(entries.keys().all(|k| k.starts_with("ABC123")));
    }

    #[test]
    fn test_create_tgz_is_deterministic() {
        let temp = TempDir::new().unwrap();
        populate(temp.path());

        let first = create_tgz(temp.path(), &device(), &GzipConfig::default()).unwrap();
        let first_bytes = decompress(&first);
        let second = create_tgz(temp.path(), &device(), &GzipConfig::default()).unwrap();
        let second_bytes = decompress(&second);

        assert!(!first_bytes.is_empty());
        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn test_create_tgz_rejects_empty_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("ABC123")).unwrap();

        let err = create_tgz(temp.path(), &device(), &GzipConfig::default()).unwrap_err();

        assert!(matches!(err.root(), Error::EmptyBackupDirectory(_)));
        assert!(!temp.path().join("ABC123.tgz").exists());
    }

    #[test]
    fn test_create_tgz_rejects_missing_dir() {
        let temp = TempDir::new().unwrap();

        let err = create_tgz(temp.path(), &device(), &GzipConfig::default()).unwrap_err();

        assert!(matches!(err.root(), Error::EmptyBackupDirectory(_)));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
