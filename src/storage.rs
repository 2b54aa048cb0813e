//! Durable storage for index records.
//!
//! The indexes themselves live in memory; what is persisted is one record per
//! document, written with a single [`Storage::put`]. A document update is
//! therefore durable as a whole or not at all.
//!
//! # Storage Types
//!
//! - [`MemoryStorage`]: in-memory map, for tests and temporary indexes.
//! - [`FileStorage`]: one checksummed file per key, replaced by atomic rename.
//!
//! # Example
//!
//! ```
//! use folio::storage::{MemoryStorage, Storage};
//!
//! # fn main() -> folio::error::Result<()> {
//! let storage = MemoryStorage::new();
//! storage.put("doc/report", b"...")?;
//! assert_eq!(storage.list("doc/")?, vec!["doc/report".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod memory;
pub mod traits;

pub use file::{FileStorage, FileStorageConfig};
pub use memory::MemoryStorage;
pub use traits::Storage;

/// Percent-encode a key so it is safe as a file name or a key component.
///
/// ASCII letters, digits, `-` and `_` are kept; every other byte becomes `%XX`.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Inverse of [`encode_key`]. Returns `None` for malformed input.
pub fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
