/// In-memory blob backend for tests
///
/// Records every call and can be told to fail for particular keys.
use crate::{
    blob_store::BlobBackend,
    error::{PostError, PostResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    blobs: HashMap<String, Vec<u8>>,
    puts: Vec<String>,
    deletes: Vec<String>,
    fail_suffixes: Vec<String>,
}

/// Blob backend keeping everything in memory
#[derive(Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<State>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any put or delete whose key ends with `suffix`
    pub fn fail_on(&self, suffix: &str) {
        self.state.lock().unwrap().fail_suffixes.push(suffix.to_string());
    }

    /// Keys passed to `put`, in call order
    pub fn puts(&self) -> Vec<String> {
        self.state.lock().unwrap().puts.clone()
    }

    /// Keys passed to `delete`, in call order
    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().unwrap().blobs.contains_key(key)
    }

    fn check(state: &State, key: &str) -> PostResult<()> {
        if state.fail_suffixes.iter().any(|s| key.ends_with(s.as_str())) {
            Err(PostError::Storage(format!("injected failure for {}", key)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobBackend for RecordingBackend {
    async fn put(&self, key: &str, data: Vec<u8>, _mime_type: &str) -> PostResult<()> {
        let mut state = self.state.lock().unwrap();
        state.puts.push(key.to_string());
        Self::check(&state, key)?;
        state.blobs.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> PostResult<Option<Vec<u8>>> {
        Ok(self.state.lock().unwrap().blobs.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> PostResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deletes.push(key.to_string());
        Self::check(&state, key)?;
        state.blobs.remove(key);
        Ok(())
    }
}
