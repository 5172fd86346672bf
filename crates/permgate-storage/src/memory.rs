use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use permgate_core::UserId;

use crate::traits::{StateStore, StorageError};

#[derive(Debug, Default)]
struct InnerState {
    system_state: Option<String>,
    user_states: BTreeMap<UserId, String>,
    write_count: usize,
}

/// Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.lock().map(|state| state.write_count).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InnerState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Internal("state store lock poisoned".to_string()))
    }
}

impl StateStore for InMemoryStateStore {
    fn read_system_state(&self) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.system_state.clone())
    }

    fn write_system_state(&self, document: &str) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.system_state = Some(document.to_string());
        state.write_count += 1;
        Ok(())
    }

    fn read_user_state(&self, user_id: UserId) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.user_states.get(&user_id).cloned())
    }

    fn write_user_state(&self, user_id: UserId, document: &str) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.user_states.insert(user_id, document.to_string());
        state.write_count += 1;
        Ok(())
    }

    fn delete_user_state(&self, user_id: UserId) -> Result<(), StorageError> {
        self.lock()?.user_states.remove(&user_id);
        Ok(())
    }

    fn list_user_ids(&self) -> Result<Vec<UserId>, StorageError> {
        Ok(self.lock()?.user_states.keys().copied().collect())
    }
}
