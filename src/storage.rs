use crate::error::{Result, StepDistError};
use crossbeam::channel::{bounded, unbounded, Sender};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Durable key-value storage for calibration values
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Volatile store, used in tests and when no file is configured
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a pretty-printed JSON object on disk.
///
/// Every mutation rewrites the file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file starts out empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

enum StoreOp {
    Get(String, Sender<Result<Option<Value>>>),
    Set(String, Value),
    Remove(String),
}

/// Moves writes of a wrapped store onto a writer thread.
///
/// `set` and `remove` return as soon as the operation is queued; failures are logged by the
/// writer. Operations run in submission order, so a `get` observes every earlier write.
pub struct BackgroundStore {
    ops: Option<Sender<StoreOp>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundStore {
    pub fn spawn<S: KeyValueStore + 'static>(mut store: S) -> Result<Self> {
        let (tx, rx) = unbounded::<StoreOp>();
        let handle = thread::Builder::new()
            .name("calibration-store".into())
            .spawn(move || {
                for op in rx.iter() {
                    match op {
                        StoreOp::Get(key, reply) => {
                            let _ = reply.send(store.get(&key));
                        }
                        StoreOp::Set(key, value) => {
                            if let Err(e) = store.set(&key, value) {
                                log::warn!("Background write of {} failed: {}", key, e);
                            }
                        }
                        StoreOp::Remove(key) => {
                            if let Err(e) = store.remove(&key) {
                                log::warn!("Background removal of {} failed: {}", key, e);
                            }
                        }
                    }
                }
                log::debug!("Calibration store writer exiting");
            })?;

        Ok(Self {
            ops: Some(tx),
            handle: Some(handle),
        })
    }

    fn submit(&self, op: StoreOp) -> Result<()> {
        self.ops
            .as_ref()
            .ok_or(StepDistError::ChannelClosed)?
            .send(op)
            .map_err(|_| StepDistError::ChannelClosed)
    }
}

impl KeyValueStore for BackgroundStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let (reply_tx, reply_rx) = bounded(1);
        self.submit(StoreOp::Get(key.to_string(), reply_tx))?;
        reply_rx.recv().map_err(|_| StepDistError::ChannelClosed)?
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.submit(StoreOp::Set(key.to_string(), value))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.submit(StoreOp::Remove(key.to_string()))
    }
}

impl Drop for BackgroundStore {
    fn drop(&mut self) {
        // Closing the queue lets the writer drain pending writes and exit
        self.ops.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Calibration store writer panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.get("stepLength").unwrap().is_none());

        store.set("stepLength", json!(0.72)).unwrap();
        assert_eq!(store.get("stepLength").unwrap(), Some(json!(0.72)));

        store.remove("stepLength").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");

        {
            let mut store = JsonFileStore::open(&path).unwrap();
            store.set("stepLength", json!(0.7)).unwrap();
            store.set("lastCalibratedAt", json!(1_700_000_000i64)).unwrap();
        }

        let mut reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("stepLength").unwrap(), Some(json!(0.7)));
        assert_eq!(
            reopened.get("lastCalibratedAt").unwrap(),
            Some(json!(1_700_000_000i64))
        );

        reopened.remove("stepLength").unwrap();
        let again = JsonFileStore::open(&path).unwrap();
        assert!(again.get("stepLength").unwrap().is_none());
    }

    #[test]
    fn test_background_store_flushes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");

        {
            let mut store = BackgroundStore::spawn(JsonFileStore::open(&path).unwrap()).unwrap();
            store.set("bodyHeight", json!(1.8)).unwrap();
            // Reads are queued behind earlier writes
            assert_eq!(store.get("bodyHeight").unwrap(), Some(json!(1.8)));
            store.remove("bodyHeight").unwrap();
            store.set("stepLength", json!(0.68)).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("stepLength").unwrap(), Some(json!(0.68)));
        assert!(reopened.get("bodyHeight").unwrap().is_none());
    }

    #[test]
    fn test_json_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        fs::write(&path, "not json").unwrap();

        assert!(JsonFileStore::open(&path).is_err());
    }
}
