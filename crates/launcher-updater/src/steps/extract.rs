//! Overlay extraction of patch archives onto the install root.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::{Result, UpdateError};

/// Extraction progress, counted in archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractProgress {
    /// Entries written so far.
    pub extracted: usize,
    /// Entries in the archive.
    pub total: usize,
}

impl ExtractProgress {
    /// Returns the progress as a percentage (0 to 100).
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            100
        } else {
            ((self.extracted * 100) / self.total).min(100) as u8
        }
    }
}

/// Summary of an applied archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Regular files written.
    pub files: usize,
    /// Directories created.
    pub directories: usize,
}

/// Apply the archive at `archive_path` onto `install_root`.
///
/// Every entry is written to the same relative path under `install_root`,
/// replacing any existing file. Files not named in the archive are left
/// alone. If an entry fails, entries already written stay on disk.
///
/// `cancel` is checked before each entry; once it fires, no further entry is
/// written and [`UpdateError::Cancelled`] is returned.
pub fn apply_archive<F>(
    archive_path: &Path,
    install_root: &Path,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<ExtractSummary>
where
    F: FnMut(ExtractProgress),
{
    let fail = |reason: String| UpdateError::Extraction {
        archive: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(|e| fail(format!("cannot open archive: {e}")))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| fail(format!("not a valid zip archive: {e}")))?;

    let total = archive.len();
    tracing::info!(
        "Applying {} ({} entries) to {}",
        archive_path.display(),
        total,
        install_root.display()
    );

    let mut summary = ExtractSummary {
        files: 0,
        directories: 0,
    };
    on_progress(ExtractProgress {
        extracted: 0,
        total,
    });

    for index in 0..total {
        if cancel.is_cancelled() {
            tracing::warn!(
                "Stopped applying {} after {index} of {total} entries",
                archive_path.display()
            );
            return Err(UpdateError::Cancelled);
        }

        let mut entry = archive
            .by_index(index)
            .map_err(|e| fail(format!("cannot read entry {index}: {e}")))?;

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| fail(format!("entry {:?} escapes the install root", entry.name())))?;
        let target = install_root.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| fail(format!("cannot create {}: {e}", target.display())))?;
            summary.directories += 1;
        } else {
            write_entry(&mut entry, &target)
                .map_err(|e| fail(format!("cannot write {}: {e}", target.display())))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))
                    .map_err(|e| fail(format!("cannot set permissions on {}: {e}", target.display())))?;
            }

            tracing::trace!("Wrote {}", relative.display());
            summary.files += 1;
        }

        on_progress(ExtractProgress {
            extracted: index + 1,
            total,
        });
    }

    tracing::info!(
        "Applied {}: {} files, {} directories",
        archive_path.display(),
        summary.files,
        summary.directories
    );
    Ok(summary)
}

fn write_entry(entry: &mut impl io::Read, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let mut out = File::create(target)?;
    io::copy(entry, &mut out)?;
    out.sync_all()
}

/// Remove a staging directory and everything in it. A missing directory is fine.
pub fn remove_dir_if_exists(dir: &Path) -> Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(UpdateError::Io(format!(
            "cannot remove {}: {e}",
            dir.display()
        ))),
    }
}

/// Path a patch archive is staged at.
#[must_use]
pub fn staged_archive_path(staging_dir: &Path, file_name: &str) -> PathBuf {
    staging_dir.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    enum Entry<'a> {
        File(&'a str, &'a [u8]),
        Dir(&'a str),
    }

    fn build_zip(path: &Path, entries: &[Entry<'_>]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        for entry in entries {
            match entry {
                Entry::File(name, data) => {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(data).unwrap();
                }
                Entry::Dir(name) => {
                    zip.add_directory(*name, options).unwrap();
                }
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_overlay_replaces_and_preserves() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("game");
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("data/a.txt"), "old a").unwrap();
        fs::write(root.join("keep.txt"), "untouched").unwrap();

        let archive = dir.path().join("update_1.0.0.1.zip");
        build_zip(
            &archive,
            &[
                Entry::Dir("data/"),
                Entry::File("data/a.txt", b"new a"),
                Entry::File("maps/new/b.txt", b"b"),
            ],
        );

        let mut seen = Vec::new();
        let summary = apply_archive(&archive, &root, &CancellationToken::new(), |p| {
            seen.push(p.percentage());
        }).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.directories, 1);
        assert_eq!(fs::read_to_string(root.join("data/a.txt")).unwrap(), "new a");
        assert_eq!(fs::read_to_string(root.join("maps/new/b.txt")).unwrap(), "b");
        assert_eq!(fs::read_to_string(root.join("keep.txt")).unwrap(), "untouched");

        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_archive_completes() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("empty.zip");
        build_zip(&archive, &[]);

        let mut last = None;
        let summary = apply_archive(&archive, dir.path(), &CancellationToken::new(), |p| {
            last = Some(p);
        }).unwrap();
        assert_eq!(summary.files, 0);
        assert_eq!(last.map(|p| p.percentage()), Some(100));
    }

    #[test]
    fn test_invalid_archive_is_extraction_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = apply_archive(&archive, dir.path(), &CancellationToken::new(), |_| {}).unwrap_err();
        assert!(matches!(err, UpdateError::Extraction { .. }));
    }

    #[test]
    fn test_missing_archive_is_extraction_error() {
        let dir = tempdir().unwrap();
        let err = apply_archive(
            &dir.path().join("nope.zip"),
            dir.path(),
            &CancellationToken::new(),
            |_| {},
        ).unwrap_err();
        assert!(matches!(err, UpdateError::Extraction { .. }));
    }

    #[test]
    fn test_entry_escaping_root_is_rejected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("game");
        fs::create_dir_all(&root).unwrap();
        let archive = dir.path().join("evil.zip");
        build_zip(&archive, &[Entry::File("../evil.txt", b"x")]);

        let err = apply_archive(&archive, &root, &CancellationToken::new(), |_| {}).unwrap_err();
        assert!(matches!(err, UpdateError::Extraction { .. }));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_failure_leaves_earlier_entries_in_place() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("game");
        fs::create_dir_all(&root).unwrap();
        // A plain file where the archive expects a directory.
        fs::write(root.join("blocked"), "file").unwrap();

        let archive = dir.path().join("update_1.0.0.2.zip");
        build_zip(
            &archive,
            &[
                Entry::File("first.txt", b"written"),
                Entry::File("blocked/second.txt", b"never"),
            ],
        );

        let err = apply_archive(&archive, &root, &CancellationToken::new(), |_| {}).unwrap_err();
        assert!(matches!(err, UpdateError::Extraction { .. }));
        assert_eq!(fs::read_to_string(root.join("first.txt")).unwrap(), "written");
    }

    #[test]
    fn test_cancel_stops_before_next_entry() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("game");
        let archive = dir.path().join("update_1.0.0.3.zip");
        build_zip(
            &archive,
            &[
                Entry::File("one.txt", b"1"),
                Entry::File("two.txt", b"2"),
                Entry::File("three.txt", b"3"),
            ],
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let err = apply_archive(&archive, &root, &cancel, |p| {
            if p.extracted == 2 {
                trigger.cancel();
            }
        })
        .unwrap_err();

        assert!(matches!(err, UpdateError::Cancelled));
        assert!(root.join("one.txt").exists());
        assert!(root.join("two.txt").exists());
        assert!(!root.join("three.txt").exists());
    }

    #[test]
    fn test_already_cancelled_writes_nothing() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("game");
        let archive = dir.path().join("update_1.0.0.3.zip");
        build_zip(&archive, &[Entry::File("one.txt", b"1")]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = apply_archive(&archive, &root, &cancel, |_| {}).unwrap_err();
        assert!(matches!(err, UpdateError::Cancelled));
        assert!(!root.join("one.txt").exists());
    }

    #[test]
    fn test_remove_dir_if_exists() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("updates");
        assert!(!remove_dir_if_exists(&staging).unwrap());

        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("update_1.0.0.1.zip"), b"partial").unwrap();
        assert!(remove_dir_if_exists(&staging).unwrap());
        assert!(!staging.exists());
    }
}
