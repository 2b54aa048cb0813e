//! File-based storage implementation.
//!
//! Every key is one file in the storage directory. The file name is the
//! percent-encoded key, and the content is a small header (CRC32 of the
//! payload and its length) followed by the payload. Writes go to a uniquely
//! named temporary file that is synced and then renamed over the target, so a
//! reader sees the old value or the new one.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FolioError, Result};
use crate::storage::traits::Storage;
use crate::storage::{decode_key, encode_key};

const RECORD_EXTENSION: &str = "rec";
const TEMP_PREFIX: &str = ".tmp-";
const HEADER_LEN: usize = 4 + 8;

/// Options of a [`FileStorage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStorageConfig {
    /// Call `fsync` on every write before it becomes visible.
    pub sync_writes: bool,
    /// Buffer size used when writing records.
    pub buffer_size: usize,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        FileStorageConfig {
            sync_writes: true,
            buffer_size: 64 * 1024,
        }
    }
}

/// A directory of record files.
#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
    config: FileStorageConfig,
}

impl FileStorage {
    /// Open or create a file storage in the given directory.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        Self::with_config(directory, FileStorageConfig::default())
    }

    pub fn with_config<P: AsRef<Path>>(directory: P, config: FileStorageConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            fs::create_dir_all(&directory)
                .map_err(|e| FolioError::storage(format!("Failed to create directory: {e}")))?;
        }

        if !directory.is_dir() {
            return Err(FolioError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory, config })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{RECORD_EXTENSION}", encode_key(key)))
    }

    fn record_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn decode_record(bytes: Vec<u8>, key: &str) -> Result<Vec<u8>> {
        if bytes.len() < HEADER_LEN {
            return Err(FolioError::storage(format!("record '{key}' is truncated")));
        }

        let mut header = Cursor::new(&bytes[..HEADER_LEN]);
        let checksum = header.read_u32::<LittleEndian>()?;
        let length = header.read_u64::<LittleEndian>()? as usize;

        let payload = &bytes[HEADER_LEN..];
        if payload.len() != length {
            return Err(FolioError::storage(format!(
                "record '{key}' has {} payload bytes, header says {length}",
                payload.len()
            )));
        }
        if crc32fast::hash(payload) != checksum {
            return Err(FolioError::storage(format!("record '{key}' failed checksum verification")));
        }
        Ok(payload.to_vec())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.file_path(key)) {
            Ok(bytes) => Self::decode_record(bytes, key).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let temp_path = self
            .directory
            .join(format!("{TEMP_PREFIX}{}", Uuid::new_v4().simple()));

        let write = || -> Result<()> {
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            let mut writer = BufWriter::with_capacity(self.config.buffer_size, file);
            writer.write_u32::<LittleEndian>(crc32fast::hash(value))?;
            writer.write_u64::<LittleEndian>(value.len() as u64)?;
            writer.write_all(value)?;
            let file = writer
                .into_inner()
                .map_err(|e| FolioError::storage(format!("Failed to flush record: {e}")))?;
            if self.config.sync_writes {
                file.sync_all()?;
            }
            fs::rename(&temp_path, self.file_path(key))?;
            Ok(())
        };

        write().inspect_err(|_| {
            let _ = fs::remove_file(&temp_path);
        })
    }

    fn delete(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.file_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FolioError::storage(format!("Failed to delete '{key}': {e}"))),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .record_keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let is_record = path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION);
            if is_record || name.starts_with(TEMP_PREFIX) {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_storage_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path()).unwrap();

        assert!(storage.get("doc/a b").unwrap().is_none());
        storage.put("doc/a b", b"payload").unwrap();
        assert_eq!(storage.get("doc/a b").unwrap().unwrap(), b"payload");

        storage.put("doc/a b", b"replaced").unwrap();
        assert_eq!(storage.get("doc/a b").unwrap().unwrap(), b"replaced");

        assert!(storage.delete("doc/a b").unwrap());
        assert!(!storage.delete("doc/a b").unwrap());
        assert!(storage.get("doc/a b").unwrap().is_none());
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = FileStorage::new(temp_dir.path()).unwrap();
            storage.put("doc/one", b"1").unwrap();
            storage.put("doc/two", b"2").unwrap();
            storage.put("other", b"3").unwrap();
        }

        let storage = FileStorage::new(temp_dir.path()).unwrap();
        assert_eq!(storage.list("doc/").unwrap(), vec!["doc/one", "doc/two"]);
        assert_eq!(storage.get("other").unwrap().unwrap(), b"3");

        storage.clear().unwrap();
        assert!(storage.list("").unwrap().is_empty());
    }

    #[test]
    fn test_file_storage_detects_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path()).unwrap();
        storage.put("k", b"abcdef").unwrap();

        let path = storage.file_path("k");
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(storage.get("k"), Err(FolioError::Storage(_))));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path()).unwrap();
        storage.put("a", b"x").unwrap();

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.rec"]);
    }
}
