use thiserror::Error;

/// Fatal errors: raised before any row is processed, or while a table
/// cannot be interpreted at all. Row-level problems are flags, never errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (threshold out of range, empty unit table, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A mapped column is absent from the table header.
    #[error("{table} table: missing column '{column}'")]
    MissingColumn { table: String, column: String },
    /// Malformed CSV structure (not a malformed field).
    #[error("{table} table: {message}")]
    Csv { table: String, message: String },
}

/// Unit lookup / conversion failures. Recorded as line status, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UomError {
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("cannot convert '{from}' ({from_family}) to '{to}' ({to_family})")]
    IncompatibleUnits {
        from: String,
        from_family: String,
        to: String,
        to_family: String,
    },
}
