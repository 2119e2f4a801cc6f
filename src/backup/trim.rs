//! Shrinks a device backup by emptying its hash shards.
//!
//! `idevicebackup2` stores file payloads in 256 subdirectories named `00`
//! through `ff`. Manifests and status plists live next to them and are kept.

use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::{AddFunctionName, AddMsg};
use function_name::named;
use itertools::Itertools;
use std::io::ErrorKind;
use std::path::Path;

static HEX_DIGITS: &str = "0123456789abcdef";

/// All 256 shard directory names, `"00"` to `"ff"`, in order.
pub fn shard_names() -> impl Iterator<Item = String> {
    HEX_DIGITS
        .chars()
        .cartesian_product(HEX_DIGITS.chars())
        .map(|(a, b)| format!("{a}{b}"))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrimReport {
    pub shards_visited: usize,
    pub files_removed: usize,
}

/// A shard the backup tool never created is expected, not an error.
fn is_benign_listing_error(e: &std::io::Error) -> bool {
    e.kind() == ErrorKind::NotFound
}

/// Deletes every regular file inside the shard directories of `backup_dir`
///
/// Shards that cannot be listed are skipped. Files that cannot be deleted are
/// collected and returned together once every shard has been visited.
#[named]
pub fn trim_backup<P: AsRef<Path>>(backup_dir: P) -> Result<TrimReport> {
    let backup_dir = backup_dir.as_ref();
    tracing::info!("Trimming backup {:?}", backup_dir);

    let mut report = TrimReport::default();
    let mut errors = Vec::new();

    for shard in shard_names() {
        let shard_dir = backup_dir.join(&shard);
        let entries = match std::fs::read_dir(&shard_dir) {
            Ok(entries) => entries,
            Err(e) if is_benign_listing_error(&e) => {
                tracing::trace!("Skipping absent shard {:?}", shard_dir);
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable shard {:?}: {}", shard_dir, e);
                continue;
            }
        };
        report.shards_visited += 1;

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {:?}: {}", shard_dir, e);
                    continue;
                }
            };
            if !path.is_file() {
                tracing::trace!("Keeping {:?}, not a file", path);
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => report.files_removed += 1,
                Err(e) => errors.push(Error::from(e).add_msg(format!("Removing {:?} failed", path))),
            }
        }
    }

    convert_error_vec(errors).add_fn_name(function_path!())?;
    tracing::info!(
        "Trimmed {} files from {} shards",
        report.files_removed,
        report.shards_visited
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shard_names() {
        let names = shard_names().collect_vec();
        assert_eq!(names.len(), 256);
        assert_eq!(names.first().map(String::as_str), Some("00"));
        assert_eq!(names[1], "01");
        assert_eq!(names[16], "10");
        assert_eq!(names.last().map(String::as_str), Some("ff"));
        assert_eq!(names.iter().unique().count(), 256);
    }

    #[test]
    fn test_trim_removes_shard_files_and_keeps_siblings() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        for shard in ["00", "7a", "ff"] {
            std::fs::create_dir(dir.join(shard)).unwrap();
            std::fs::write(dir.join(shard).join("payload1"), "data").unwrap();
            std::fs::write(dir.join(shard).join("payload2"), "data").unwrap();
        }
        std::fs::write(dir.join("Manifest.db"), "manifest").unwrap();
        std::fs::write(dir.join("Info.plist"), "info").unwrap();
        std::fs::create_dir(dir.join("zz")).unwrap();
        std::fs::write(dir.join("zz").join("keep"), "keep").unwrap();

        let report = trim_backup(dir).unwrap();

        assert_eq!(
            report,
            TrimReport {
                shards_visited: 3,
                files_removed: 6
            }
        );
        for shard in ["00", "7a", "ff"] {
            assert!(dir.join(shard).is_dir());
            assert_eq!(std::fs::read_dir(dir.join(shard)).unwrap().count(), 0);
        }
        assert!(dir.join("Manifest.db").is_file());
        assert!(dir.join("Info.plist").is_file());
        assert!(dir.join("zz").join("keep").is_file());
    }

    #[test]
    fn test_trim_without_shards_is_noop() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Manifest.plist"), "m").unwrap();

        let report = trim_backup(temp.path()).unwrap();

        assert_eq!(report, TrimReport::default());
        assert!(temp.path().join("Manifest.plist").is_file());
    }

    #[test]
    fn test_trim_missing_directory_is_noop() {
        let temp = TempDir::new().unwrap();
        let report = trim_backup(temp.path().join("never-captured")).unwrap();
        assert_eq!(report, TrimReport::default());
    }

    #[test]
    fn test_trim_keeps_nested_directories() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("0a").join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("deep"), "deep").unwrap();
        std::fs::write(temp.path().join("0a").join("top"), "top").unwrap();

        let report = trim_backup(temp.path()).unwrap();

        assert_eq!(report.files_removed, 1);
        assert!(nested.join("deep").is_file());
        assert!(!temp.path().join("0a").join("top").exists());
    }

    #[test]
    fn test_shard_that_is_a_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("ab"), "not a dir").unwrap();

        let report = trim_backup(temp.path()).unwrap();

        assert_eq!(report, TrimReport::default());
        assert!(temp.path().join("ab").is_file());
    }
}
