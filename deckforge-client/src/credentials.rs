//! Bearer credential stores.
use deckforge_core::CredentialStore;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Token held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    token: RwLock<Option<String>>,
}

impl MemoryCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentials {
    type Error = Infallible;

    fn token(&self) -> Result<Option<String>, Self::Error> {
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn store_token(&self, token: &str) -> Result<(), Self::Error> {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<(), Self::Error> {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum FileCredentialError {
    #[error("credential file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Token persisted in a single file, one line.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> FileCredentialError {
        FileCredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentials {
    type Error = FileCredentialError;

    fn token(&self) -> Result<Option<String>, Self::Error> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn store_token(&self, token: &str) -> Result<(), Self::Error> {
        fs::write(&self.path, token.trim()).map_err(|err| self.io_error(err))
    }

    fn clear_token(&self) -> Result<(), Self::Error> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}
