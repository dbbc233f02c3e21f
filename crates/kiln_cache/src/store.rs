//! Content-addressed on-disk storage for cache entries.
//!
//! Each entry is stored at `<cache_dir>/entries/<key>.entry` as a 4-byte
//! little-endian header length, a bincode header (magic bytes, format
//! version, Kiln version, key, payload checksum) and the bincode payload.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use kiln_common::{ContentHash, KILN_VERSION};
use serde::{Deserialize, Serialize};

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::key::CacheKey;

/// Magic bytes identifying a Kiln cache entry.
const ENTRY_MAGIC: [u8; 4] = *b"KILN";

/// Current entry format version. Increment on breaking changes to the header
/// or payload format.
const ENTRY_FORMAT_VERSION: u32 = 1;

/// Subdirectory holding entry files.
const ENTRIES_SUBDIR: &str = "entries";

/// File extension of entry files.
const ENTRY_EXT: &str = "entry";

/// Sequence for unique temporary file names within this process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Header prepended to every entry file for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],
    /// Entry format version.
    pub format_version: u32,
    /// Kiln version that wrote the entry.
    pub kiln_version: String,
    /// Digest of the key the entry was stored under.
    pub key: ContentHash,
    /// Fingerprint of the payload bytes.
    pub checksum: ContentHash,
}

/// Reads and writes entry files.
pub struct EntryStore {
    dir: PathBuf,
}

impl EntryStore {
    /// Creates a store rooted at `<cache_dir>/entries`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(ENTRIES_SUBDIR),
        }
    }

    /// The directory holding entry files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path for the entry stored under `stem`.
    pub fn entry_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{ENTRY_EXT}"))
    }

    /// Writes an entry, replacing any previous file for the same key.
    ///
    /// The file is written to a temporary name and renamed into place, so a
    /// concurrent reader sees either the old or the new entry, never a torn
    /// one.
    pub fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<PathBuf, CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let payload = bincode::serde::encode_to_vec(entry, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let header = EntryHeader {
            magic: ENTRY_MAGIC,
            format_version: ENTRY_FORMAT_VERSION,
            kiln_version: KILN_VERSION.to_string(),
            key: key.digest(),
            checksum: ContentHash::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&payload);

        let path = self.entry_path(&key.file_stem());
        write_atomic(&path, &output)?;
        Ok(path)
    }

    /// Reads the entry stored under `key`.
    ///
    /// A missing file is `Ok(None)`. A file that exists but fails validation
    /// is an error so the caller can report the corruption.
    pub fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(&key.file_stem());
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };

        let invalid = |reason: &str| CacheError::InvalidHeader {
            path: path.clone(),
            reason: reason.to_string(),
        };

        if raw.len() < 4 {
            return Err(invalid("file too short"));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&raw[..4]);
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        if raw.len() < 4 + header_len {
            return Err(invalid("truncated header"));
        }

        let (header, _): (EntryHeader, usize) =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .map_err(|e| invalid(&e.to_string()))?;

        if header.magic != ENTRY_MAGIC {
            return Err(invalid("bad magic bytes"));
        }
        if header.format_version != ENTRY_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                expected: ENTRY_FORMAT_VERSION,
                actual: header.format_version,
            });
        }
        if header.key != key.digest() {
            return Err(invalid("entry stored under a different key"));
        }

        let payload = &raw[4 + header_len..];
        let actual = ContentHash::from_bytes(payload);
        if actual != header.checksum {
            return Err(CacheError::ChecksumMismatch {
                path,
                expected: header.checksum.to_string(),
                actual: actual.to_string(),
            });
        }

        let (entry, _): (CacheEntry, usize) =
            bincode::serde::decode_from_slice(payload, bincode::config::standard()).map_err(
                |e| CacheError::Serialization {
                    reason: e.to_string(),
                },
            )?;
        Ok(Some(entry))
    }

    /// Deletes the entry file stored under `stem`, if present.
    pub fn remove(&self, stem: &str) -> Result<bool, CacheError> {
        let path = self.entry_path(stem);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    /// Lists the stems of all entry files on disk, sorted.
    pub fn list(&self) -> Result<Vec<String>, CacheError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut stems = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
        stems.sort();
        Ok(stems)
    }

    /// Removes every entry file.
    pub fn clear(&self) -> Result<(), CacheError> {
        if !self.dir.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })
    }
}

/// Writes `bytes` to a uniquely named sibling of `path`, then renames it over
/// `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let tmp = path.with_file_name(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));

    let io_err = |path: &Path, e: std::io::Error| CacheError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    {
        let mut file = std::fs::File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        file.write_all(bytes).map_err(|e| io_err(&tmp, e))?;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::AssetKind;

    fn make_store() -> (tempfile::TempDir, EntryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path());
        (dir, store)
    }

    fn key(s: &str) -> CacheKey {
        CacheKey::new(
            ContentHash::from_bytes(s.as_bytes()),
            ContentHash::from_bytes(b"chain"),
            ContentHash::from_bytes(b"tools"),
        )
    }

    fn entry() -> CacheEntry {
        CacheEntry::new(b".a{color:red}".to_vec(), AssetKind::Style, "scss")
    }

    #[test]
    fn write_and_read() {
        let (_dir, store) = make_store();
        let k = key("main.scss");
        let path = store.write(&k, &entry()).unwrap();
        assert!(path.ends_with(format!("entries/{}.entry", k.file_stem())));
        assert_eq!(store.read(&k).unwrap(), Some(entry()));
    }

    #[test]
    fn missing_is_none() {
        let (_dir, store) = make_store();
        assert!(store.read(&key("nope")).unwrap().is_none());
    }

    #[test]
    fn garbage_is_invalid_header() {
        let (_dir, store) = make_store();
        let k = key("x");
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.entry_path(&k.file_stem()), b"garbage data").unwrap();
        assert!(matches!(
            store.read(&k),
            Err(CacheError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn flipped_payload_byte_is_checksum_mismatch() {
        let (_dir, store) = make_store();
        let k = key("y");
        let path = store.write(&k, &entry()).unwrap();
        let mut raw = std::fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(&path, raw).unwrap();
        assert!(matches!(
            store.read(&k),
            Err(CacheError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn renamed_file_is_rejected() {
        let (_dir, store) = make_store();
        let a = key("a");
        let b = key("b");
        let path = store.write(&a, &entry()).unwrap();
        std::fs::rename(&path, store.entry_path(&b.file_stem())).unwrap();
        assert!(matches!(
            store.read(&b),
            Err(CacheError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn list_remove_clear() {
        let (_dir, store) = make_store();
        store.write(&key("a"), &entry()).unwrap();
        store.write(&key("b"), &entry()).unwrap();
        let stems = store.list().unwrap();
        assert_eq!(stems.len(), 2);
        assert!(store.remove(&stems[0]).unwrap());
        assert!(!store.remove(&stems[0]).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (_dir, store) = make_store();
        store.write(&key("a"), &entry()).unwrap();
        store.write(&key("a"), &entry()).unwrap();
        let names: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
