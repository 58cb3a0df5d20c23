//! Durable token storage.

use super::token::Token;
use crate::error::CoreResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "oauth-token-";
const FILE_SUFFIX: &str = ".json";

/// Key-value store mirroring the provider's in-memory token cache.
///
/// Operations are synchronous. The provider treats every failure as
/// best-effort: it is logged and the token is fetched again.
pub trait TokenStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> CoreResult<Option<Token>>;
    fn set(&self, key: &str, token: &Token) -> CoreResult<()>;
    fn delete(&self, key: &str) -> CoreResult<()>;
    /// Remove every token held by this store
    fn flush(&self) -> CoreResult<()>;
}

/// Stores each token as a JSON file in one directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{FILE_PREFIX}{safe}{FILE_SUFFIX}"))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> CoreResult<Option<Token>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, token: &Token) -> CoreResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec(token)?;
        std::fs::write(self.path_for(key), bytes)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CoreResult<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn flush(&self) -> CoreResult<()> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

/// In-process store, mostly useful in tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> CoreResult<Option<Token>> {
        Ok(self.tokens.lock().get(key).cloned())
    }

    fn set(&self, key: &str, token: &Token) -> CoreResult<()> {
        self.tokens.lock().insert(key.to_string(), token.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> CoreResult<()> {
        self.tokens.lock().remove(key);
        Ok(())
    }

    fn flush(&self) -> CoreResult<()> {
        self.tokens.lock().clear();
        Ok(())
    }
}
