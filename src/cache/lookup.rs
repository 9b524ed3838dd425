use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheFailure {
    #[error("cache storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cached entry '{key}' could not be decoded: {reason}")]
    Decode { key: String, reason: String },
}

/// Outcome of a cache read, so stages can branch without error types
/// standing in for "not cached".
#[derive(Debug)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    Failure(CacheFailure),
}

impl<T> CacheLookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheLookup<U> {
        match self {
            CacheLookup::Hit(value) => CacheLookup::Hit(f(value)),
            CacheLookup::Miss => CacheLookup::Miss,
            CacheLookup::Failure(failure) => CacheLookup::Failure(failure),
        }
    }
}
