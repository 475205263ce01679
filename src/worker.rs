// Background workers. Both run on fixed-period timers and take the
// store's exclusive lock once per tick; a failed tick is logged and
// the store is left at its pre-tick state rather than torn down. Each
// worker carries a stop channel so `Store::close` can join it cleanly.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::Config;
use crate::store::Inner;

pub(crate) struct Worker {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    // Signals the worker to stop and waits for its thread to exit.
    pub(crate) fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.join();
    }
}

fn spawn_periodic<F>(period: Duration, mut tick: F) -> Worker
where
    F: FnMut() + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel();

    let handle = thread::spawn(move || loop {
        match stop_rx.recv_timeout(period) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => tick(),
        }
    });

    Worker {
        stop: stop_tx,
        handle,
    }
}

fn lock(inner: &Mutex<Inner>) -> std::sync::MutexGuard<'_, Inner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn spawn_rotation(inner: Arc<Mutex<Inner>>, config: Config) -> Worker {
    spawn_periodic(config.rotation_period, move || {
        if let Err(e) = lock(&inner).rotate(&config) {
            log::warn!("rotation tick failed, store left at its pre-tick state: {e}");
        }
    })
}

pub(crate) fn spawn_merge(inner: Arc<Mutex<Inner>>, config: Config) -> Worker {
    spawn_periodic(config.merge_period, move || {
        if let Err(e) = lock(&inner).merge() {
            log::warn!("merge tick failed, store left at its pre-tick state: {e}");
        }
    })
}
