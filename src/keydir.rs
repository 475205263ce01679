// In-memory key directory: maps a key to the location of its latest
// on-disk record. Also carries a manual binary codec used to persist
// and reload the hint snapshot (`berry.hint`).

use std::collections::HashMap;
use std::mem::size_of;

use crate::error::HintError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    pub file_id: u32,
    pub entry_offset: u32,
    pub entry_size: u32,
    pub timestamp: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct KeyDir {
    entries: HashMap<String, Meta>,
}

impl KeyDir {
    pub(crate) fn new() -> KeyDir {
        KeyDir::default()
    }

    pub(crate) fn insert(&mut self, key: String, meta: Meta) {
        self.entries.insert(key, meta);
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Meta> {
        self.entries.remove(key)
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Meta> {
        self.entries.get(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Meta)> {
        self.entries.iter()
    }

    // `u32` entry count, then for each entry a `u32`-prefixed key
    // followed by the four `u32` meta fields, all little-endian. Not
    // portable across implementations.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        for (key, meta) in &self.entries {
            buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(&meta.file_id.to_le_bytes());
            buf.extend_from_slice(&meta.entry_offset.to_le_bytes());
            buf.extend_from_slice(&meta.entry_size.to_le_bytes());
            buf.extend_from_slice(&meta.timestamp.to_le_bytes());
        }

        buf
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<KeyDir, HintError> {
        const U32: usize = size_of::<u32>();

        let mut cursor = 0usize;
        let mut read_u32 = |buf: &[u8], at: &mut usize| -> Result<u32, HintError> {
            let slice = buf.get(*at..*at + U32).ok_or(HintError::Malformed)?;
            *at += U32;
            Ok(u32::from_le_bytes(slice.try_into().unwrap()))
        };

        let count = read_u32(bytes, &mut cursor)?;
        let mut dir = KeyDir::new();

        for _ in 0..count {
            let key_len = read_u32(bytes, &mut cursor)? as usize;
            let key_bytes = bytes
                .get(cursor..cursor + key_len)
                .ok_or(HintError::Malformed)?;
            let key = String::from_utf8(key_bytes.to_vec())?;
            cursor += key_len;

            let file_id = read_u32(bytes, &mut cursor)?;
            let entry_offset = read_u32(bytes, &mut cursor)?;
            let entry_size = read_u32(bytes, &mut cursor)?;
            let timestamp = read_u32(bytes, &mut cursor)?;

            dir.insert(
                key,
                Meta {
                    file_id,
                    entry_offset,
                    entry_size,
                    timestamp,
                },
            );
        }

        Ok(dir)
    }
}
