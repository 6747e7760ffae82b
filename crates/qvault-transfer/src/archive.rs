//! Folder archives: pack a folder selection into one ZIP, unpack on download.
//!
//! Entry names are the items' relative paths with `/` separators, so a
//! folder `a` holding `x.txt` and `b/y.txt` packs to entries `a/x.txt` and
//! `a/b/y.txt`.

use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use qvault_core::SelectedItem;

use crate::error::{TransferError, TransferResult};

/// One file recovered from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Validated relative path, `/`-separated
    pub path: String,
    pub data: Vec<u8>,
}

/// Archive file name for a folder selection.
pub fn archive_name(folder: &str) -> String {
    format!("{folder}.zip")
}

/// Pack folder items into an in-memory ZIP archive.
pub fn pack_folder(items: &[SelectedItem]) -> TransferResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for item in items {
        let entry = entry_name(item)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(entry.as_str(), options)?;
        writer.write_all(&item.data)?;
        debug!(entry = %entry, bytes = item.data.len(), "archived");
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Read every file entry of an archive into memory.
///
/// Entries whose names would escape the extraction root (absolute paths,
/// `..` components) are rejected rather than skipped.
pub fn read_archive(bytes: &[u8]) -> TransferResult<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let Some(enclosed) = file.enclosed_name() else {
            return Err(TransferError::Archive(format!(
                "entry escapes the extraction root: {}",
                file.name()
            )));
        };
        let path = enclosed
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        if path.is_empty() {
            return Err(TransferError::Archive(format!("empty entry name: {}", file.name())));
        }

        // Declared sizes come from the archive header and are not trusted.
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        entries.push(ArchiveEntry { path, data });
    }

    Ok(entries)
}

/// Unpack an archive under `dir`, returning the written paths.
pub fn extract_archive(bytes: &[u8], dir: &Path) -> TransferResult<Vec<PathBuf>> {
    let entries = read_archive(bytes)?;
    let mut written = Vec::with_capacity(entries.len());

    for entry in entries {
        let target = dir.join(&entry.path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &entry.data)?;
        debug!(path = %target.display(), "extracted");
        written.push(target);
    }

    Ok(written)
}

fn entry_name(item: &SelectedItem) -> TransferResult<String> {
    let raw = item.relative_path.as_deref().unwrap_or(&item.name);
    let normalized = raw.replace('\\', "/");
    let parts: Vec<&str> = normalized
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();

    if parts.is_empty() || parts.contains(&"..") {
        return Err(TransferError::Archive(format!("invalid entry path: {raw:?}")));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str, data: &[u8]) -> SelectedItem {
        let name = path.rsplit('/').next().unwrap_or(path);
        SelectedItem::new(name, data.to_vec()).with_relative_path(path)
    }

    #[test]
    fn test_pack_and_read_back() {
        let items = vec![item("a/x.txt", b"one"), item("a/b/y.txt", b"two")];
        let zip = pack_folder(&items).unwrap();

        let entries = read_archive(&zip).unwrap();
        assert_eq!(
            entries,
            vec![
                ArchiveEntry { path: "a/x.txt".into(), data: b"one".to_vec() },
                ArchiveEntry { path: "a/b/y.txt".into(), data: b"two".to_vec() },
            ]
        );
    }

    #[test]
    fn test_backslashes_normalized() {
        let zip = pack_folder(&[item("a\\b\\c.txt", b"c")]).unwrap();
        assert_eq!(read_archive(&zip).unwrap()[0].path, "a/b/c.txt");
    }

    #[test]
    fn test_pack_rejects_parent_components() {
        let err = pack_folder(&[item("a/../../etc/passwd", b"x")]).unwrap_err();
        assert!(matches!(err, TransferError::Archive(_)));
    }

    #[test]
    fn test_read_rejects_traversal_entries() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("../evil.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"pwned").unwrap();
        let zip = writer.finish().unwrap().into_inner();

        let err = read_archive(&zip).unwrap_err();
        assert!(matches!(err, TransferError::Archive(_)), "got {err}");
    }

    #[test]
    fn test_read_ignores_declared_size() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file("big.bin", options).unwrap();
        writer.write_all(b"payload").unwrap();
        let mut zip = writer.finish().unwrap().into_inner();

        // Claim ~4 GiB uncompressed in the central directory record.
        let central = zip
            .windows(4)
            .position(|w| w == [0x50, 0x4b, 0x01, 0x02])
            .unwrap();
        zip[central + 24..central + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

        match read_archive(&zip) {
            Ok(entries) => assert_eq!(entries[0].data, b"payload"),
            Err(err) => assert!(
                matches!(err, TransferError::Archive(_) | TransferError::Io(_)),
                "got {err}"
            ),
        }
    }

    #[test]
    fn test_extract_writes_tree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let zip = pack_folder(&[item("docs/readme.md", b"# hi"), item("docs/img/a.png", b"png")])
            .unwrap();

        let written = extract_archive(&zip, tmp.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(tmp.path().join("docs/readme.md")).unwrap(), b"# hi");
        assert_eq!(std::fs::read(tmp.path().join("docs/img/a.png")).unwrap(), b"png");
    }

    #[test]
    fn test_garbage_is_archive_error() {
        let err = read_archive(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, TransferError::Archive(_)));
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name("photos"), "photos.zip");
    }
}
