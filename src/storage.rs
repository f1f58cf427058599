use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::RecordLog;
use crate::timer::TimerSession;

const RECORDS_FILE: &str = "records.json";
const EXCEPTIONS_FILE: &str = "exception_schedule.json";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    JsonDecode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode {path}: {source}")]
    JsonEncode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Persisted state: the record log, the exception schedule and the running session.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load_records(&self) -> Result<RecordLog, StorageError> {
        Ok(self.read_json(RECORDS_FILE)?.unwrap_or_default())
    }

    pub fn save_records(&self, log: &RecordLog) -> Result<(), StorageError> {
        self.write_json(RECORDS_FILE, log)
    }

    pub fn load_exception_tasks(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read_json(EXCEPTIONS_FILE)?.unwrap_or_default())
    }

    pub fn save_exception_tasks(&self, tasks: &[String]) -> Result<(), StorageError> {
        self.write_json(EXCEPTIONS_FILE, tasks)
    }

    pub fn load_session(&self) -> Result<Option<TimerSession>, StorageError> {
        self.read_json(SESSION_FILE)
    }

    pub fn save_session(&self, session: &TimerSession) -> Result<(), StorageError> {
        self.write_json(SESSION_FILE, session)
    }

    pub fn clear_session(&self) -> Result<(), StorageError> {
        let path = self.dir.join(SESSION_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let path = self.dir.join(name);
        let raw = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::JsonDecode { path, source })
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(name);
        let encoded = serde_json::to_string_pretty(value).map_err(|source| {
            StorageError::JsonEncode {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, encoded).map_err(|source| StorageError::Io { path, source })
    }
}
