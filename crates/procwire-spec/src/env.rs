// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized environment block handed to `exec`.

use std::collections::BTreeMap;
use std::ffi::{CStr, c_char};

use crate::error::SpecError;

/// A child environment serialized into `exec` form: a contiguous byte
/// buffer of `KEY=VALUE\0` entries plus the offset of each entry.
///
/// Built in two passes, a sizing pass that computes the exact byte
/// length and then a write pass, so the buffer is allocated once and never
/// reallocated. Entries whose value is empty are skipped; an entry whose
/// key is empty serializes as the bare value. The block is immutable
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvBlock {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl EnvBlock {
    /// Serialize a key→value mapping.
    ///
    /// Fails only if a key or value contains an embedded NUL byte; the
    /// keys are unique by map construction, so there is nothing to
    /// deduplicate.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, SpecError> {
        // Pass 1: size.
        let mut size = 0usize;
        let mut count = 0usize;
        for (key, value) in map {
            if value.is_empty() {
                continue;
            }
            if key.as_bytes().contains(&0) {
                return Err(SpecError::NulByte(format!("environment key {key:?}")));
            }
            if value.as_bytes().contains(&0) {
                return Err(SpecError::NulByte(format!("environment value for {key:?}")));
            }
            if !key.is_empty() {
                size += key.len() + 1;
            }
            size += value.len() + 1;
            count += 1;
        }

        // Pass 2: write.
        let mut buf = Vec::with_capacity(size);
        let mut offsets = Vec::with_capacity(count);
        for (key, value) in map {
            if value.is_empty() {
                continue;
            }
            offsets.push(buf.len());
            if !key.is_empty() {
                buf.extend_from_slice(key.as_bytes());
                buf.push(b'=');
            }
            buf.extend_from_slice(value.as_bytes());
            buf.push(0);
        }
        debug_assert_eq!(buf.len(), size);

        Ok(Self { buf, offsets })
    }

    /// Number of serialized entries.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the block holds no entries (the child would see an empty
    /// environment).
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Total length of the backing buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    /// Borrow each entry as a C string pointing into the backing buffer.
    pub fn entries(&self) -> impl Iterator<Item = &CStr> {
        self.offsets.iter().enumerate().map(|(i, &start)| {
            let end = self
                .offsets
                .get(i + 1)
                .copied()
                .unwrap_or_else(|| self.buf.len());
            CStr::from_bytes_with_nul(&self.buf[start..end])
                .expect("entry is NUL-terminated by construction")
        })
    }

    /// The NUL-terminated pointer array for `exec`: one pointer per entry
    /// aimed at its start inside the backing buffer, then a terminating
    /// null pointer. An empty block yields exactly `[NULL]`.
    ///
    /// The pointers borrow from `self`; the array must not outlive the
    /// block.
    pub fn as_ptr_array(&self) -> Vec<*const c_char> {
        self.offsets
            .iter()
            .map(|&start| self.buf[start..].as_ptr().cast::<c_char>())
            .chain(std::iter::once(std::ptr::null()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_map_serializes_to_lone_null() {
        let block = EnvBlock::from_map(&BTreeMap::new()).unwrap();
        assert!(block.is_empty());
        assert_eq!(block.byte_len(), 0);
        let ptrs = block.as_ptr_array();
        assert_eq!(ptrs.len(), 1);
        assert!(ptrs[0].is_null());
    }

    #[test]
    fn single_entry_layout() {
        let block = EnvBlock::from_map(&map(&[("PATH", "/bin")])).unwrap();
        assert_eq!(block.len(), 1);
        // "PATH" + '=' + "/bin" + '\0'
        assert_eq!(block.byte_len(), 4 + 1 + 4 + 1);
        let entries: Vec<&CStr> = block.entries().collect();
        assert_eq!(entries[0].to_bytes(), b"PATH=/bin");
    }

    #[test]
    fn entries_are_contiguous_and_ordered() {
        let block = EnvBlock::from_map(&map(&[("A", "1"), ("B", "22")])).unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.byte_len(), (1 + 1 + 1 + 1) + (1 + 1 + 2 + 1));
        let entries: Vec<Vec<u8>> = block.entries().map(|e| e.to_bytes().to_vec()).collect();
        assert_eq!(entries, vec![b"A=1".to_vec(), b"B=22".to_vec()]);
    }

    #[test]
    fn empty_values_are_skipped() {
        let block = EnvBlock::from_map(&map(&[("KEEP", "x"), ("DROP", "")])).unwrap();
        assert_eq!(block.len(), 1);
        let entries: Vec<&CStr> = block.entries().collect();
        assert_eq!(entries[0].to_bytes(), b"KEEP=x");
    }

    #[test]
    fn empty_key_serializes_bare_value() {
        let block = EnvBlock::from_map(&map(&[("", "standalone")])).unwrap();
        assert_eq!(block.len(), 1);
        let entries: Vec<&CStr> = block.entries().collect();
        assert_eq!(entries[0].to_bytes(), b"standalone");
        assert_eq!(block.byte_len(), "standalone".len() + 1);
    }

    #[test]
    fn nul_in_key_rejected() {
        let err = EnvBlock::from_map(&map(&[("BA\0D", "v")])).unwrap_err();
        assert!(matches!(err, SpecError::NulByte(_)));
    }

    #[test]
    fn nul_in_value_rejected() {
        let err = EnvBlock::from_map(&map(&[("K", "a\0b")])).unwrap_err();
        assert!(matches!(err, SpecError::NulByte(_)));
    }

    #[test]
    fn pointer_array_points_into_buffer() {
        let block = EnvBlock::from_map(&map(&[("X", "1"), ("Y", "2")])).unwrap();
        let ptrs = block.as_ptr_array();
        assert_eq!(ptrs.len(), 3);
        assert!(ptrs[2].is_null());
        let base = block.buf.as_ptr() as usize;
        for ptr in &ptrs[..2] {
            let addr = *ptr as usize;
            assert!(addr >= base && addr < base + block.byte_len());
        }
    }
}
