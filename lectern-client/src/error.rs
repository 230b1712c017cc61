//! Error types for the client.

use crate::api_client::ClientError;
use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use lectern_cache::CacheError;

#[derive(Debug, thiserror::Error)]
pub enum LecternError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type LecternResult<T> = Result<T, LecternError>;
