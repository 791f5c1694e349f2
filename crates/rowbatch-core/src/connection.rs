//! Database connection and dialect traits.
//!
//! All operations are synchronous and block the calling thread until the
//! statement completes. One connection serves one top-level call; rowbatch
//! never pools, shares, or closes connections — the caller owns their
//! lifecycle. Callers must not share a connection across threads without
//! external synchronization.

use crate::error::DriverError;
use crate::ident::quote_ident;
use crate::row::Row;
use crate::value::Value;

/// Result alias for raw driver operations, before classification.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// A database connection capable of executing parameterized statements.
///
/// Implementations report failures as raw [`DriverError`]s carrying the
/// vendor SQLSTATE and error code; the engine routes every one of them
/// through the classifier before it reaches a caller.
pub trait Connection {
    /// The forward-only cursor type produced by [`Connection::open_cursor`].
    type Cursor<'conn>: RowCursor
    where
        Self: 'conn;

    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> DriverResult<Vec<Row>>;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> DriverResult<u64>;

    /// Execute an INSERT and return the database-assigned keys, one per
    /// inserted row, in insertion order.
    ///
    /// This is the retrieval path for dialects without a RETURNING clause;
    /// dialects with RETURNING go through [`Connection::query`] instead.
    fn insert_returning_keys(&self, sql: &str, params: &[Value]) -> DriverResult<Vec<Value>>;

    /// Open a forward-only cursor over a query.
    ///
    /// The cursor owns its statement; dropping it releases both.
    fn open_cursor(&self, sql: &str, params: &[Value]) -> DriverResult<Self::Cursor<'_>>;
}

/// A forward-only result cursor.
///
/// Implementations release the underlying statement when dropped, so a
/// cursor abandoned before exhaustion does not leak.
pub trait RowCursor {
    /// Fetch the next row, or `None` once the result set is exhausted.
    fn fetch_next(&mut self) -> DriverResult<Option<Row>>;
}

/// Vendor capability descriptor consumed by the batch engine.
///
/// Tells the engine which key-retrieval mechanism the database supports and
/// how to spell the clauses the engine appends itself.
pub trait Dialect {
    /// Does this database return generated keys in the same round trip via
    /// a RETURNING clause?
    fn supports_returning(&self) -> bool;

    /// The RETURNING clause for the given identifier column, including the
    /// leading space.
    fn returning_clause(&self, id_column: &str) -> String {
        format!(" RETURNING {}", quote_ident(id_column))
    }

    /// The placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        let _ = index;
        "?".to_string()
    }
}

/// Generic ANSI dialect with positional `?` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct AnsiDialect {
    returning: bool,
}

impl AnsiDialect {
    /// A dialect that retrieves keys via RETURNING.
    pub const fn with_returning() -> Self {
        Self { returning: true }
    }

    /// A dialect that retrieves keys via a post-insert generated-keys fetch.
    pub const fn without_returning() -> Self {
        Self { returning: false }
    }
}

impl Dialect for AnsiDialect {
    fn supports_returning(&self) -> bool {
        self.returning
    }
}
