//! Error types shared by every store implementation
//!
//! Backend errors from PostgreSQL and Redis are classified into the handful
//! of outcomes callers actually branch on: a unique-key conflict, a missing
//! row, a transient failure worth retrying, or everything else.

use redis::RedisError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The addressed record does not exist
    #[error("Record not found")]
    NotFound,

    /// Connection failure, pool exhaustion or timeout
    #[error("Transient store failure: {0}")]
    Transient(String),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error returned by Redis that is not connection related
    #[error("Redis error: {0}")]
    Redis(#[source] RedisError),

    /// Configuration error
    #[error("Store configuration error: {0}")]
    Configuration(String),

    /// Any other failure inside a store (hashing, encoding)
    #[error("Store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether retrying the same operation can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => StoreError::NotFound,
            SqlxError::Database(ref db) if db.is_unique_violation() => {
                StoreError::DuplicateKey(db.constraint().unwrap_or("unique key").to_string())
            }
            SqlxError::PoolTimedOut
            | SqlxError::PoolClosed
            | SqlxError::WorkerCrashed
            | SqlxError::Io(_)
            | SqlxError::Tls(_) => StoreError::Transient(err.to_string()),
            other => StoreError::Query(other),
        }
    }
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
        {
            StoreError::Transient(err.to_string())
        } else {
            StoreError::Redis(err)
        }
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = StoreError::from(SqlxError::RowNotFound);
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn pool_timeout_is_transient() {
        let err = StoreError::from(SqlxError::PoolTimedOut);
        assert!(err.is_transient());
    }

    #[test]
    fn io_failures_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(StoreError::from(SqlxError::Io(io)).is_transient());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(StoreError::from(RedisError::from(io)).is_transient());
    }

    #[test]
    fn protocol_errors_are_not_transient() {
        let err = StoreError::from(SqlxError::Protocol("bad message".to_string()));
        assert!(matches!(err, StoreError::Query(_)));
        assert!(!err.is_transient());

        let err = StoreError::from(RedisError::from((
            redis::ErrorKind::TypeError,
            "unexpected reply",
        )));
        assert!(matches!(err, StoreError::Redis(_)));
    }
}
