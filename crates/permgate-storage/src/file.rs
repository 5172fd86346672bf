use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use permgate_core::UserId;

use crate::traits::{StateStore, StorageError};

const SYSTEM_FILE: &str = "system.xml";
const USERS_DIR: &str = "users";
const XML_EXTENSION: &str = "xml";

/// Stores documents under a state directory:
///
/// ```text
/// <root>/system.xml
/// <root>/users/<user id>.xml
/// ```
///
/// Every write goes to a temporary sibling first and is renamed into place,
/// so a crash leaves either the old or the new document.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let users_dir = root.join(USERS_DIR);
        fs::create_dir_all(&users_dir).map_err(|e| StorageError::io(&users_dir, &e))?;
        tracing::debug!(root = %root.display(), "opened file state store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn system_path(&self) -> PathBuf {
        self.root.join(SYSTEM_FILE)
    }

    fn user_path(&self, user_id: UserId) -> PathBuf {
        self.root
            .join(USERS_DIR)
            .join(format!("{user_id}.{XML_EXTENSION}"))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(path) {
        Ok(document) => Ok(Some(document)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, &e)),
    }
}

fn write_atomically(path: &Path, document: &str) -> Result<(), StorageError> {
    let tmp_path = path.with_extension("xml.tmp");
    let mut file = fs::File::create(&tmp_path).map_err(|e| StorageError::io(&tmp_path, &e))?;
    file.write_all(document.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| StorageError::io(&tmp_path, &e))?;
    fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, &e))?;
    tracing::trace!(path = %path.display(), bytes = document.len(), "wrote state document");
    Ok(())
}

impl StateStore for FileStateStore {
    fn read_system_state(&self) -> Result<Option<String>, StorageError> {
        read_optional(&self.system_path())
    }

    fn write_system_state(&self, document: &str) -> Result<(), StorageError> {
        write_atomically(&self.system_path(), document)
    }

    fn read_user_state(&self, user_id: UserId) -> Result<Option<String>, StorageError> {
        read_optional(&self.user_path(user_id))
    }

    fn write_user_state(&self, user_id: UserId, document: &str) -> Result<(), StorageError> {
        write_atomically(&self.user_path(user_id), document)
    }

    fn delete_user_state(&self, user_id: UserId) -> Result<(), StorageError> {
        let path = self.user_path(user_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&path, &e)),
        }
    }

    fn list_user_ids(&self) -> Result<Vec<UserId>, StorageError> {
        let users_dir = self.root.join(USERS_DIR);
        let entries = fs::read_dir(&users_dir).map_err(|e| StorageError::io(&users_dir, &e))?;
        let mut user_ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StorageError::io(&users_dir, &e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(XML_EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()).map(str::parse::<UserId>) {
                Some(Ok(user_id)) => user_ids.push(user_id),
                _ => tracing::warn!(path = %path.display(), "ignoring unexpected file in users dir"),
            }
        }
        user_ids.sort_unstable();
        Ok(user_ids)
    }
}
