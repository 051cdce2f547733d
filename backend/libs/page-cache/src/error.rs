//! Cache error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

pub type CacheResult<T> = Result<T, CacheError>;
