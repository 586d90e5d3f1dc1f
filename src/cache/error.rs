use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use super::keys::CacheKey;

/// Failure observed by a `get_or_fetch` caller.
///
/// Cloned to every caller that joined the same in-flight request, so all of
/// them see the identical failure.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The producer returned an error. The original error is kept intact.
    #[error("{0}")]
    Producer(Arc<dyn StdError + Send + Sync>),
    /// The producer panicked before settling.
    #[error("producer for `{key}` panicked")]
    Panicked { key: CacheKey },
    /// The value stored under `key` is not of the requested type; two
    /// different operations derived the same key.
    #[error("cached value for `{key}` is not a `{expected}`")]
    TypeMismatch {
        key: CacheKey,
        expected: &'static str,
    },
}

impl FetchError {
    pub fn producer<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(error))
    }

    /// Borrow the producer's error as its concrete type.
    pub fn downcast_producer<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            Self::Producer(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// True when two errors are the same shared producer failure.
    pub fn same_failure(&self, other: &FetchError) -> bool {
        match (self, other) {
            (Self::Producer(a), Self::Producer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
