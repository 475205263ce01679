// Append-only data file segments: a concatenation of encoded records
// with no framing beyond what the record header itself carries.

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{SegmentError, SegmentIdError};
use crate::record::Record;

pub(crate) const SEGMENT_PREFIX: &str = "berry_";
pub(crate) const SEGMENT_EXT: &str = "db";

pub(crate) fn segment_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(format!("{SEGMENT_PREFIX}{id}.{SEGMENT_EXT}"))
}

// Parses the numeric id out of a `berry_<id>.db` file name.
pub(crate) fn id_from_path(path: &Path) -> Result<u32, SegmentIdError> {
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or(SegmentIdError::IdFromEmptyPath)?;

    let digits = stem
        .strip_prefix(SEGMENT_PREFIX)
        .ok_or(SegmentIdError::IdFromInvalidPath(path.to_path_buf()))?;

    u32::from_str(digits).map_err(|_| SegmentIdError::NotAnInt)
}

// Returns `true` if `path` looks like a `berry_<id>.db` segment file.
pub(crate) fn is_segment_file(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(SEGMENT_EXT))
        && path
            .file_stem()
            .and_then(OsStr::to_str)
            .is_some_and(|s| s.starts_with(SEGMENT_PREFIX))
}

// A single on-disk segment: a monotonic id, an open file handle, and
// the number of bytes written so far (`write_offset`).
pub(crate) struct Segment {
    id: u32,
    file: File,
    write_offset: u32,
}

impl Segment {
    pub(crate) fn open(dir: &Path, id: u32) -> Result<Segment, SegmentError> {
        let path = segment_path(dir, id);
        Segment::open_at(&path, id, false)
    }

    // Opens a fresh, truncated file at an arbitrary path. Used by
    // merge to build the replacement segment under a temporary name
    // before it is renamed into place as `berry_0.db`.
    pub(crate) fn create_for_merge(path: &Path) -> Result<Segment, SegmentError> {
        Segment::open_at(path, 0, true)
    }

    fn open_at(path: &Path, id: u32, truncate: bool) -> Result<Segment, SegmentError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .truncate(truncate)
            .open(path)
            .map_err(|e| SegmentError::IOErrorAtPath {
                path: path.to_path_buf(),
                source: e,
            })?;

        let write_offset = file
            .metadata()
            .map_err(|e| SegmentError::IOErrorAtPath {
                path: path.to_path_buf(),
                source: e,
            })?
            .len() as u32;

        Ok(Segment {
            id,
            file,
            write_offset,
        })
    }

    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn len(&self) -> u32 {
        self.write_offset
    }

    // Appends `bytes` to the end of the segment and returns the
    // offset at which they start.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> io::Result<u32> {
        let offset = self.write_offset;
        self.file.write_all(bytes)?;
        self.write_offset += bytes.len() as u32;
        Ok(offset)
    }

    pub(crate) fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    // Positioned read of exactly `size` bytes at `offset`, decoded as
    // a record.
    pub(crate) fn read_at(&mut self, offset: u32, size: u32) -> Result<Record, SegmentError> {
        let mut buf = vec![0u8; size as usize];
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(&mut buf)?;
        Ok(Record::decode(&buf)?)
    }

    // Iterates every record in the segment from the start, yielding
    // `(record, offset, size)` for each. Used to rebuild the key
    // directory when no valid hint snapshot is available.
    pub(crate) fn replay(&mut self) -> Result<Vec<(Record, u32, u32)>, SegmentError> {
        let mut out = Vec::new();
        self.file.rewind()?;

        let len = self.write_offset as u64;
        loop {
            let offset = self.file.stream_position()?;
            if offset >= len {
                break;
            }

            let mut header = [0u8; crate::record::HEADER_SIZE];
            self.file.read_exact(&mut header)?;
            let key_size = u32::from_le_bytes(header[8..12].try_into().unwrap());
            let value_size = u32::from_le_bytes(header[12..16].try_into().unwrap());
            let body_len = key_size as usize + value_size as usize;

            let mut body = vec![0u8; body_len];
            self.file.read_exact(&mut body)?;

            let mut full = Vec::with_capacity(header.len() + body.len());
            full.extend_from_slice(&header);
            full.extend_from_slice(&body);

            let size = full.len() as u32;
            let record = Record::decode(&full)?;
            out.push((record, offset as u32, size));
        }

        Ok(out)
    }
}
