//! Shared database error helpers (SQLSTATE categorization).

use sea_orm::{DbErr, RuntimeErr, SqlErr};

/// Returns true if the given SQLSTATE / driver code represents a unique
/// constraint violation (Postgres 23505, SQLite 2067 / 1555, MySQL 1062).
pub fn is_unique_violation_code(code: &str) -> bool {
    matches!(code, "23505" | "2067" | "1555" | "1062")
}

pub fn is_sqlx_unique_violation(db: &dyn sqlx::error::DatabaseError) -> bool {
    db.code()
        .map(|c| is_unique_violation_code(c.as_ref()))
        .unwrap_or(false)
}

/// Classify a SeaORM error as a unique constraint violation.
pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => {
            is_sqlx_unique_violation(db.as_ref())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_unique_codes() {
        for code in ["23505", "2067", "1555", "1062"] {
            assert!(is_unique_violation_code(code), "{code}");
        }
        assert!(!is_unique_violation_code("23503"));
        assert!(!is_unique_violation_code(""));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&DbErr::RecordNotFound("x".into())));
        assert!(!is_unique_violation(&DbErr::Custom("boom".into())));
    }
}
