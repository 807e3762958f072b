use thiserror::Error;

/// Errors raised by a [`crate::Store`] backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether retrying the same operation could reasonably succeed.
    ///
    /// Constraint violations are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Connection(_) | StorageError::Timeout(_))
    }
}

enum ErrorClass {
    Connection,
    Timeout,
    Constraint,
}

fn classify(err: &sqlx::Error) -> Option<ErrorClass> {
    match err {
        sqlx::Error::PoolTimedOut => Some(ErrorClass::Timeout),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => Some(ErrorClass::Connection),
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation()
            {
                Some(ErrorClass::Constraint)
            } else if db.code().as_deref() == Some("57014") {
                // query_canceled, raised for statement_timeout
                Some(ErrorClass::Timeout)
            } else {
                None
            }
        }
        _ => None,
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match classify(&err) {
            Some(ErrorClass::Connection) => StorageError::Connection(err.to_string()),
            Some(ErrorClass::Timeout) => StorageError::Timeout(err.to_string()),
            Some(ErrorClass::Constraint) => StorageError::Constraint(err.to_string()),
            None => StorageError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        let err = StorageError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StorageError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_pool_closed_is_connection() {
        let err = StorageError::from(sqlx::Error::PoolClosed);
        assert!(matches!(err, StorageError::Connection(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_row_not_found_is_not_transient() {
        let err = StorageError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::Database(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_constraint_is_not_transient() {
        assert!(!StorageError::Constraint("duplicate".to_string()).is_transient());
    }
}
