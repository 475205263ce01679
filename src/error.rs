use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("segment error")]
    SegmentError(#[from] SegmentError),

    #[error("hint error")]
    HintError(#[from] HintError),

    #[error("IO error")]
    IOError(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum SetError {
    #[error("key exceeds max size (expected < {})", u32::MAX)]
    KeyExceedsMaxSize,

    #[error("value exceeds max size (expected < {})", u32::MAX)]
    ValueExceedsMaxSize,

    #[error("segment error")]
    SegmentError(#[from] SegmentError),

    #[error("IO error")]
    IOError(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum GetError {
    #[error("key not found")]
    KeyNotFound,

    #[error("data file not found for id {0}")]
    DataFileNotFound(u32),

    #[error("segment error")]
    SegmentError(#[from] SegmentError),
}

#[derive(Error, Debug)]
pub enum DelError {
    #[error("segment error")]
    SegmentError(#[from] SegmentError),

    #[error("IO error")]
    IOError(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum CloseError {
    #[error("hint error")]
    HintError(#[from] HintError),

    #[error("IO error")]
    IOError(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("get error during merge")]
    GetError(#[from] GetError),

    #[error("segment error")]
    SegmentError(#[from] SegmentError),

    #[error("hint error")]
    HintError(#[from] HintError),

    #[error("IO error")]
    IOError(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum RotationError {
    #[error("segment error")]
    SegmentError(#[from] SegmentError),

    #[error("IO error")]
    IOError(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("can't derive segment id from path {0:?}")]
    InvalidPath(PathBuf),

    #[error("record error")]
    RecordError(#[from] RecordError),

    #[error("IO error at path: {path}")]
    IOErrorAtPath { path: PathBuf, source: io::Error },

    #[error("IO error")]
    IOError(#[from] io::Error),
}

#[derive(Error, Debug, PartialEq)]
pub(crate) enum SegmentIdError {
    #[error("id is not an integer")]
    NotAnInt,

    #[error("trying to parse id from an empty path")]
    IdFromEmptyPath,

    #[error("trying to parse id from an invalid (non-utf8) path: {0:?}")]
    IdFromInvalidPath(PathBuf),
}

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("illegal entry: declared sizes don't match buffer length (expected {expected}, found {found})")]
    IllegalEntry { expected: usize, found: usize },

    #[error("invalid checksum (expected {expected:?}, found {found:?})")]
    CrcMismatch { expected: u32, found: u32 },

    #[error("invalid utf-8 in key or value")]
    InvalidString(#[from] std::string::FromUtf8Error),
}

#[derive(Error, Debug)]
pub enum HintError {
    #[error("hint file is truncated or malformed")]
    Malformed,

    #[error("invalid string in hint file")]
    InvalidString(#[from] std::string::FromUtf8Error),

    #[error("IO error")]
    IOError(#[from] io::Error),
}
