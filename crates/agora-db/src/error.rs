use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{table}: count of values does not match count of fields (expected {expected}, got {got})")]
    FieldCountMismatch {
        table: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{table} has no column {column:?}")]
    UnknownColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{table}: parent {id} does not exist")]
    ParentNotFound { table: &'static str, id: i64 },

    #[error("{table}: row {id} does not exist")]
    NotFound { table: &'static str, id: i64 },

    #[error("{table}: parent chain loops back to {id}")]
    CycleDetected { table: &'static str, id: i64 },

    #[error("database lock poisoned: {0}")]
    LockPoisoned(String),
}

impl DbError {
    /// True when SQLite refused the statement because of a UNIQUE, FOREIGN
    /// KEY or similar constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// The thing a table stores, as it is named to clients.
pub fn entity_name(table: &str) -> &'static str {
    match table {
        "tbl_section" => "section",
        "tbl_group" => "group",
        "tbl_user" => "user",
        "tbl_group_section_permission" => "permission",
        "tbl_creation_data" => "creation data",
        "tbl_thread" => "thread",
        _ => "record",
    }
}
