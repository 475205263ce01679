// 16-byte header: checksum, timestamp, key size, value size, all
// little-endian u32, followed by the key bytes then the value bytes.
// Only the value is checksummed; the key and header are unprotected.

use std::mem::size_of;

use crate::error::RecordError;

pub(crate) const HEADER_SIZE: usize = 4 * size_of::<u32>();

// Reserved value marking a record as a delete rather than a live
// write. A legitimate `set(k, TOMBSTONE)` is indistinguishable from a
// delete on replay.
pub const TOMBSTONE: &str = "SPECVAL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub checksum: u32,
    pub timestamp: u32,
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: &str, value: &str, timestamp: u32) -> Record {
        Record {
            checksum: crc32fast::hash(value.as_bytes()),
            timestamp,
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }

    pub(crate) fn tombstone(key: &str, timestamp: u32) -> Record {
        Record::new(key, TOMBSTONE, timestamp)
    }

    pub fn is_tombstone(&self) -> bool {
        self.value == TOMBSTONE
    }

    pub fn len(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.value.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(self.value.as_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Record, RecordError> {
        if bytes.len() < HEADER_SIZE {
            return Err(RecordError::IllegalEntry {
                expected: HEADER_SIZE,
                found: bytes.len(),
            });
        }

        let checksum = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let timestamp = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let key_size = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let value_size = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;

        let expected = HEADER_SIZE + key_size + value_size;
        if bytes.len() != expected {
            return Err(RecordError::IllegalEntry {
                expected,
                found: bytes.len(),
            });
        }

        let key_bytes = &bytes[HEADER_SIZE..HEADER_SIZE + key_size];
        let value_bytes = &bytes[HEADER_SIZE + key_size..expected];

        let found = crc32fast::hash(value_bytes);
        if found != checksum {
            return Err(RecordError::CrcMismatch {
                expected: checksum,
                found,
            });
        }

        Ok(Record {
            checksum,
            timestamp,
            key: String::from_utf8(key_bytes.to_vec())?,
            value: String::from_utf8(value_bytes.to_vec())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let r = Record::new("Hello", "World", 1_700_000_000);
        let encoded = r.encode();
        let decoded = Record::decode(&encoded).unwrap();
        assert_eq!(decoded, r);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn header_is_sixteen_bytes() {
        let r = Record::new("", "", 0);
        assert_eq!(r.encode().len(), HEADER_SIZE);
    }

    #[test]
    fn illegal_entry_on_length_mismatch() {
        let r = Record::new("k", "v", 0);
        let mut encoded = r.encode();
        encoded.pop();
        assert!(matches!(
            Record::decode(&encoded),
            Err(RecordError::IllegalEntry { .. })
        ));
    }

    #[test]
    fn crc_mismatch_on_value_corruption() {
        let r = Record::new("k", "value", 0);
        let mut encoded = r.encode();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(matches!(
            Record::decode(&encoded),
            Err(RecordError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn key_corruption_is_undetected() {
        // The key is unprotected by design: corrupting it alone does
        // not trip the checksum.
        let r = Record::new("key", "value", 0);
        let mut encoded = r.encode();
        encoded[HEADER_SIZE] ^= 0x20; // toggle ASCII case, stays valid UTF-8
        let decoded = Record::decode(&encoded).unwrap();
        assert_ne!(decoded.key, r.key);
    }

    #[test]
    fn tombstone_round_trips() {
        let r = Record::tombstone("k", 0);
        assert!(r.is_tombstone());
        let encoded = r.encode();
        let decoded = Record::decode(&encoded).unwrap();
        assert!(decoded.is_tombstone());
    }
}
