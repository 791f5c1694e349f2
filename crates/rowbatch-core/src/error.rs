//! Error taxonomy and the driver-failure classifier.
//!
//! Every raw database failure is translated into exactly one typed error
//! before it leaves this library. Drivers report [`DriverError`]s (message,
//! SQLSTATE, vendor code, failing SQL); [`classify`] maps those onto the
//! closed [`DatabaseErrorKind`] taxonomy using SQLSTATE class prefixes,
//! vendor sub-codes, and — for foreign-key direction — statement shape.

use std::fmt;

/// The primary error type for all rowbatch operations.
#[derive(Debug)]
pub enum Error {
    /// A classified database failure.
    Database(DatabaseError),
    /// A required single-row query yielded zero rows.
    NoResult {
        /// The failing SQL text.
        sql: String,
    },
    /// A single-row query yielded more than one row.
    NonUniqueResult {
        /// The failing SQL text.
        sql: String,
        /// How many rows came back.
        rows: usize,
    },
    /// A result row could not be converted to the requested type.
    Mapping(MappingError),
    /// A local precondition failed before any I/O was attempted.
    Validation(ValidationError),
}

/// A raw, unclassified failure reported by a driver.
///
/// Connection implementations produce these; the engine converts them via
/// [`classify`] (or the `From<DriverError> for Error` impl) so that no raw
/// failure escapes untyped.
#[derive(Debug, Clone)]
pub struct DriverError {
    /// The driver's error message.
    pub message: String,
    /// Five-character SQLSTATE, if the driver reports one.
    pub sqlstate: Option<String>,
    /// Vendor-specific error code.
    pub vendor_code: Option<i32>,
    /// The SQL text that failed.
    pub sql: Option<String>,
    /// Vendor detail text (e.g. which key value collided).
    pub detail: Option<String>,
}

impl DriverError {
    /// Create a raw driver error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sqlstate: None,
            vendor_code: None,
            sql: None,
            detail: None,
        }
    }

    /// Attach a SQLSTATE.
    pub fn sqlstate(mut self, state: impl Into<String>) -> Self {
        self.sqlstate = Some(state.into());
        self
    }

    /// Attach a vendor code.
    pub fn vendor_code(mut self, code: i32) -> Self {
        self.vendor_code = Some(code);
        self
    }

    /// Attach the failing SQL text.
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach vendor detail text.
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DriverError {}

/// A database failure after classification.
#[derive(Debug)]
pub struct DatabaseError {
    /// The classified category.
    pub kind: DatabaseErrorKind,
    /// The original driver message.
    pub message: String,
    /// The SQL text that failed.
    pub sql: Option<String>,
    /// Five-character SQLSTATE, if available.
    pub sqlstate: Option<String>,
    /// Vendor-specific error code, if available.
    pub vendor_code: Option<i32>,
    /// Vendor detail text, if available.
    pub detail: Option<String>,
}

impl DatabaseError {
    /// Create a classified error directly, bypassing the SQLSTATE rules.
    ///
    /// Used for failures the engine detects itself, such as a generated-key
    /// count mismatch.
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql: None,
            sqlstate: None,
            vendor_code: None,
            detail: None,
        }
    }

    /// Attach the failing SQL text.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

/// Classified category of a database failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// Connection-level failure (SQLSTATE class 08).
    Connection,
    /// Integrity constraint violation (SQLSTATE class 23).
    Constraint(ConstraintKind),
    /// Syntax error or access rule violation (SQLSTATE class 42).
    Syntax,
    /// Transaction rollback: serialization failure or deadlock
    /// (SQLSTATE class 40). The only retryable category.
    Rollback,
    /// Anything else, including a missing SQLSTATE.
    Unknown,
}

/// Which integrity constraint was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Unique or primary-key constraint.
    Unique,
    /// NOT NULL constraint.
    NotNull,
    /// CHECK constraint.
    Check,
    /// Foreign-key constraint, with the violated direction.
    ForeignKey(ForeignKeyKind),
}

/// Direction of a foreign-key violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyKind {
    /// An insert or update referenced a parent row that does not exist.
    ParentMissing,
    /// A delete was blocked because child rows still reference the row.
    ChildExists,
}

/// A row-to-type conversion failure.
#[derive(Debug)]
pub struct MappingError {
    /// The Rust type the caller asked for.
    pub expected: &'static str,
    /// What the row actually held.
    pub actual: String,
    /// The column involved, when known.
    pub column: Option<String>,
}

/// A local precondition failure, raised before any I/O.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Human-readable description of the violated precondition.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(ValidationError::new(message))
    }

    /// Is a transparent re-execution of the failed operation likely to
    /// succeed? True only for transaction-rollback failures (serialization
    /// conflicts, deadlocks).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Database(DatabaseError {
                kind: DatabaseErrorKind::Rollback,
                ..
            })
        )
    }

    /// The SQL text that failed, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Database(e) => e.sql.as_deref(),
            Error::NoResult { sql } | Error::NonUniqueResult { sql, .. } => Some(sql),
            Error::Mapping(_) | Error::Validation(_) => None,
        }
    }

    /// The SQLSTATE of the underlying failure, if available.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Database(e) => e.sqlstate.as_deref(),
            _ => None,
        }
    }
}

/// Classify a raw driver failure into the typed taxonomy.
///
/// First match wins on the SQLSTATE class prefix: `08` connection, `23`
/// integrity constraint, `42` syntax, `40` transaction rollback; anything
/// else — or a missing SQLSTATE — is `Unknown`.
pub fn classify(raw: DriverError) -> DatabaseError {
    let kind = match raw.sqlstate.as_deref() {
        Some(state) if state.starts_with("08") => DatabaseErrorKind::Connection,
        Some(state) if state.starts_with("23") => {
            DatabaseErrorKind::Constraint(classify_constraint(&raw, state))
        }
        Some(state) if state.starts_with("42") => DatabaseErrorKind::Syntax,
        Some(state) if state.starts_with("40") => DatabaseErrorKind::Rollback,
        other => {
            if let Some(state) = other {
                tracing::debug!(sqlstate = state, "unrecognized SQLSTATE class");
            }
            DatabaseErrorKind::Unknown
        }
    };
    DatabaseError {
        kind,
        message: raw.message,
        sql: raw.sql,
        sqlstate: raw.sqlstate,
        vendor_code: raw.vendor_code,
        detail: raw.detail,
    }
}

/// Sub-classify a class-23 failure.
///
/// Resolution order: full SQLSTATE (PostgreSQL-style sub-codes), then vendor
/// code tables (SQLite extended codes, MySQL error numbers), then keyword
/// scan of the message, defaulting to `Unique` — the overwhelmingly most
/// common integrity failure in practice.
fn classify_constraint(raw: &DriverError, state: &str) -> ConstraintKind {
    match state {
        "23505" => return ConstraintKind::Unique,
        "23502" => return ConstraintKind::NotNull,
        "23514" => return ConstraintKind::Check,
        "23503" => return ConstraintKind::ForeignKey(foreign_key_direction(raw)),
        _ => {}
    }
    match raw.vendor_code {
        // SQLite extended constraint codes
        Some(2067 | 1555) => return ConstraintKind::Unique,
        Some(1299) => return ConstraintKind::NotNull,
        Some(275) => return ConstraintKind::Check,
        Some(787) => return ConstraintKind::ForeignKey(foreign_key_direction(raw)),
        // MySQL error numbers
        Some(1062) => return ConstraintKind::Unique,
        Some(1048) => return ConstraintKind::NotNull,
        Some(3819) => return ConstraintKind::Check,
        Some(1452) => return ConstraintKind::ForeignKey(ForeignKeyKind::ParentMissing),
        Some(1451) => return ConstraintKind::ForeignKey(ForeignKeyKind::ChildExists),
        _ => {}
    }
    let message = raw.message.to_ascii_lowercase();
    if message.contains("foreign key") {
        ConstraintKind::ForeignKey(foreign_key_direction(raw))
    } else if message.contains("not null") || message.contains("not-null") {
        ConstraintKind::NotNull
    } else if message.contains("check") {
        ConstraintKind::Check
    } else {
        ConstraintKind::Unique
    }
}

/// Best-effort foreign-key direction heuristic.
///
/// Vendor codes that encode the direction are handled by the caller; here we
/// fall back to statement shape (a DELETE can only violate the child side)
/// and then to vendor detail text. Drivers that report neither get
/// `ParentMissing`, the insert/update case.
fn foreign_key_direction(raw: &DriverError) -> ForeignKeyKind {
    if let Some(sql) = raw.sql.as_deref() {
        let head = sql.trim_start().as_bytes();
        if head
            .get(..6)
            .is_some_and(|p| p.eq_ignore_ascii_case(b"delete"))
        {
            return ForeignKeyKind::ChildExists;
        }
    }
    if let Some(detail) = raw.detail.as_deref() {
        let detail = detail.to_ascii_lowercase();
        if detail.contains("still referenced") {
            return ForeignKeyKind::ChildExists;
        }
        if detail.contains("is not present") {
            return ForeignKeyKind::ParentMissing;
        }
    }
    ForeignKeyKind::ParentMissing
}

impl From<DriverError> for Error {
    fn from(raw: DriverError) -> Self {
        Error::Database(classify(raw))
    }
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        Error::Database(err)
    }
}

impl From<MappingError> for Error {
    fn from(err: MappingError) -> Self {
        Error::Mapping(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(state) = &self.sqlstate {
            write!(f, " (SQLSTATE {state}")?;
            if let Some(code) = self.vendor_code {
                write!(f, ", vendor code {code}")?;
            }
            write!(f, ")")?;
        } else if let Some(code) = self.vendor_code {
            write!(f, " (vendor code {code})")?;
        }
        if let Some(sql) = &self.sql {
            write!(f, "; failing SQL: {sql}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DatabaseError {}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl std::error::Error for MappingError {}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(e) => write!(f, "Database error: {e}"),
            Error::NoResult { sql } => {
                write!(f, "Query returned no rows where one was required: {sql}")
            }
            Error::NonUniqueResult { sql, rows } => {
                write!(f, "Query returned {rows} rows where one was required: {sql}")
            }
            Error::Mapping(e) => write!(f, "Mapping error: {e}"),
            Error::Validation(e) => write!(f, "Validation error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias for rowbatch operations.
pub type Result<T> = std::result::Result<T, Error>;
