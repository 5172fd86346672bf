use permgate_core::UserId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("i/o error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Reads return `None` when nothing has been written yet.
pub trait StateStore: Send + Sync {
    fn read_system_state(&self) -> Result<Option<String>, StorageError>;

    fn write_system_state(&self, document: &str) -> Result<(), StorageError>;

    fn read_user_state(&self, user_id: UserId) -> Result<Option<String>, StorageError>;

    fn write_user_state(&self, user_id: UserId, document: &str) -> Result<(), StorageError>;

    fn delete_user_state(&self, user_id: UserId) -> Result<(), StorageError>;

    /// Users with a persisted document, in ascending order.
    fn list_user_ids(&self) -> Result<Vec<UserId>, StorageError>;
}
