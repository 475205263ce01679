// The store coordinates one active segment plus zero or more
// immutable older segments and the in-memory key directory. All
// public operations and both background workers serialize through a
// single exclusive lock; there is no reader/writer distinction.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{
    CloseError, DelError, GetError, HintError, MergeError, RotationError, SegmentError, SetError,
    StoreError,
};
use crate::keydir::{KeyDir, Meta};
use crate::record::Record;
use crate::segment::{self, Segment};
use crate::worker::{self, Worker};

const HINT_FILE: &str = "berry.hint";
const MERGE_TMP_FILE: &str = "berry_merge.tmp";

fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as u32
}

// The mutable state behind the store's single exclusive lock.
pub(crate) struct Inner {
    dir: PathBuf,
    active: Segment,
    olders: HashMap<u32, Segment>,
    keydir: KeyDir,
    next_id: u32,
}

impl Inner {
    fn open(dir: &Path) -> Result<Inner, StoreError> {
        fs::create_dir_all(dir)?;

        let mut ids: Vec<(u32, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !segment::is_segment_file(&path) {
                continue;
            }
            let id = segment::id_from_path(&path)
                .map_err(|_| SegmentError::InvalidPath(path.clone()))?;
            ids.push((id, path));
        }
        ids.sort_by_key(|(id, _)| *id);

        let mut olders = HashMap::with_capacity(ids.len());
        for (id, _) in &ids {
            olders.insert(*id, Segment::open(dir, *id)?);
        }

        let next_id = ids.last().map_or(0, |(id, _)| id + 1);
        let active = Segment::open(dir, next_id)?;

        let hint_path = dir.join(HINT_FILE);
        let keydir = match fs::read(&hint_path) {
            Ok(bytes) => match KeyDir::decode(&bytes) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("hint file at {hint_path:?} is corrupt ({e}), replaying segments");
                    Self::replay(&ids, &mut olders)?
                }
            },
            Err(_) => {
                log::info!("no hint file at {hint_path:?}, replaying segments");
                Self::replay(&ids, &mut olders)?
            }
        };

        Ok(Inner {
            dir: dir.to_path_buf(),
            active,
            olders,
            keydir,
            next_id: next_id + 1,
        })
    }

    // Rebuilds the key directory by scanning every older segment in
    // ascending id order and applying each record in turn: the
    // latest write for a key wins, a tombstone removes it. The log,
    // not the hint, is authoritative.
    fn replay(
        ids: &[(u32, PathBuf)],
        olders: &mut HashMap<u32, Segment>,
    ) -> Result<KeyDir, StoreError> {
        let mut dir = KeyDir::new();
        for (id, _) in ids {
            let segment = olders.get_mut(id).expect("segment opened above");
            for (record, offset, size) in segment.replay()? {
                if record.is_tombstone() {
                    dir.remove(&record.key);
                } else {
                    dir.insert(
                        record.key.clone(),
                        Meta {
                            file_id: *id,
                            entry_offset: offset,
                            entry_size: size,
                            timestamp: record.timestamp,
                        },
                    );
                }
            }
        }
        Ok(dir)
    }

    fn segment_mut(&mut self, file_id: u32) -> Result<&mut Segment, GetError> {
        if file_id == self.active.id() {
            Ok(&mut self.active)
        } else {
            self.olders
                .get_mut(&file_id)
                .ok_or(GetError::DataFileNotFound(file_id))
        }
    }

    fn read_value(&mut self, meta: &Meta) -> Result<String, GetError> {
        let segment = self.segment_mut(meta.file_id)?;
        let record = segment.read_at(meta.entry_offset, meta.entry_size)?;
        Ok(record.value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SetError> {
        if key.len() > u32::MAX as usize {
            return Err(SetError::KeyExceedsMaxSize);
        }
        if value.len() > u32::MAX as usize {
            return Err(SetError::ValueExceedsMaxSize);
        }

        let timestamp = now();
        let record = Record::new(key, value, timestamp);
        let encoded = record.encode();
        let entry_size = encoded.len() as u32;
        let entry_offset = self.active.append(&encoded)?;

        self.keydir.insert(
            key.to_owned(),
            Meta {
                file_id: self.active.id(),
                entry_offset,
                entry_size,
                timestamp,
            },
        );
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<String, GetError> {
        let meta = *self.keydir.get(key).ok_or(GetError::KeyNotFound)?;
        self.read_value(&meta)
    }

    fn del(&mut self, key: &str) -> Result<(), DelError> {
        if self.keydir.get(key).is_none() {
            // Deleting an absent key succeeds silently.
            return Ok(());
        }

        let tombstone = Record::tombstone(key, now());
        self.active.append(&tombstone.encode())?;
        self.keydir.remove(key);
        Ok(())
    }

    fn write_hint(&self) -> Result<(), HintError> {
        fs::write(self.dir.join(HINT_FILE), self.keydir.encode())?;
        Ok(())
    }

    // Seals the active segment once it crosses `max_segment_size` and
    // opens a fresh one. Never touches the key directory: entries
    // that point at the now-sealed segment remain valid, it's just
    // read-only from here on.
    pub(crate) fn rotate(&mut self, config: &Config) -> Result<(), RotationError> {
        if self.active.len() < config.max_segment_size {
            return Ok(());
        }

        let sealed_id = self.active.id();
        let sealed_len = self.active.len();
        let fresh = Segment::open(&self.dir, self.next_id)?;
        let sealed = std::mem::replace(&mut self.active, fresh);
        self.olders.insert(sealed_id, sealed);
        self.next_id += 1;
        log::info!("rotated segment {sealed_id} at {sealed_len} bytes");
        Ok(())
    }

    // Rewrites the log to contain exactly one record per live key.
    // Builds the merged segment under a temporary name, fsyncs it,
    // atomically renames it into place as `berry_0.db`, persists the
    // hint, and only then deletes the superseded files. Deleting the
    // old files before the rename would lose data on a crash in
    // between.
    pub(crate) fn merge(&mut self) -> Result<(), MergeError> {
        if self.keydir.is_empty() && self.olders.is_empty() && self.active.len() == 0 {
            return Ok(());
        }

        let live: Vec<(String, Meta)> = self
            .keydir
            .iter()
            .map(|(k, m)| (k.clone(), *m))
            .collect();

        let tmp_path = self.dir.join(MERGE_TMP_FILE);
        let mut tmp_segment = Segment::create_for_merge(&tmp_path)?;

        let mut fresh = KeyDir::new();
        for (key, meta) in &live {
            let value = self.read_value(meta)?;
            let record = Record::new(key, &value, meta.timestamp);
            let encoded = record.encode();
            let entry_size = encoded.len() as u32;
            let entry_offset = tmp_segment.append(&encoded)?;
            fresh.insert(
                key.clone(),
                Meta {
                    file_id: 0,
                    entry_offset,
                    entry_size,
                    timestamp: meta.timestamp,
                },
            );
        }
        tmp_segment.sync()?;
        drop(tmp_segment);

        let final_path = segment::segment_path(&self.dir, 0);
        fs::rename(&tmp_path, &final_path)?;

        self.keydir = fresh;
        self.write_hint()?;

        // Close every old handle, including the superseded active
        // segment, before unlinking the files behind them.
        let stale_ids: Vec<u32> = self.olders.keys().copied().collect();
        self.olders.clear();
        self.active = Segment::open(&self.dir, 0)?;

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if segment::is_segment_file(&path) && path != final_path {
                fs::remove_file(&path)?;
            }
        }

        self.next_id = 1;
        log::info!(
            "merge complete: {} live keys, {} segments reclaimed",
            self.keydir.len(),
            stale_ids.len() + 1
        );
        Ok(())
    }
}

// Embedded, single-process Bitcask-style key-value store. The store
// owns its segments and key directory outright; `set`/`get`/`del`
// each take its exclusive lock for the duration of one operation.
pub struct Store {
    inner: Arc<Mutex<Inner>>,
    rotation: Option<Worker>,
    merge: Option<Worker>,
}

impl Store {
    // Opens (or creates) the data directory at `dir` with default
    // tunables.
    pub fn open(dir: &Path) -> Result<Store, StoreError> {
        Store::with_config(dir, Config::default())
    }

    // Opens (or creates) the data directory at `dir`, spawning the
    // rotation and merge workers with the given periods and threshold.
    pub fn with_config(dir: &Path, config: Config) -> Result<Store, StoreError> {
        let inner = Arc::new(Mutex::new(Inner::open(dir)?));
        let rotation = worker::spawn_rotation(Arc::clone(&inner), config);
        let merge = worker::spawn_merge(Arc::clone(&inner), config);

        Ok(Store {
            inner,
            rotation: Some(rotation),
            merge: Some(merge),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // Encodes a record for `(key, value)`, appends it to the active
    // segment, and points the key directory at the new location.
    // Overwrites any previous entry for `key`.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SetError> {
        self.lock().set(key, value)
    }

    // Looks up `key` in the directory and returns the value of its
    // latest record, or `KeyNotFound` if the key is absent.
    pub fn get(&self, key: &str) -> Result<String, GetError> {
        self.lock().get(key)
    }

    // Appends a tombstone for `key` and removes it from the
    // directory. Succeeds silently if `key` is already absent.
    pub fn del(&self, key: &str) -> Result<(), DelError> {
        self.lock().del(key)
    }

    // Stops both background workers, persists a final hint snapshot,
    // and drops the store.
    pub fn close(mut self) -> Result<(), CloseError> {
        if let Some(worker) = self.rotation.take() {
            worker.stop();
        }
        if let Some(worker) = self.merge.take() {
            worker.stop();
        }

        self.lock().write_hint()?;
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(worker) = self.rotation.take() {
            worker.stop();
        }
        if let Some(worker) = self.merge.take() {
            worker.stop();
        }
    }
}
