// Embedded, single-process, Bitcask-style key-value store: an
// append-only log of records, an in-memory key directory, and
// background rotation and merge workers.

mod config;
mod error;
mod keydir;
mod record;
mod segment;
mod store;
mod worker;

pub use config::Config;
pub use error::{
    CloseError, DelError, GetError, HintError, MergeError, RecordError, RotationError,
    SegmentError, SetError, StoreError,
};
pub use keydir::Meta;
pub use record::{Record, TOMBSTONE};
pub use store::Store;
