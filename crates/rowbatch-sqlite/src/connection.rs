//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API implementing the rowbatch
//! `Connection` trait. All access to the underlying handle goes through a
//! mutex; an open cursor holds the lock for its whole lifetime, so one
//! statement streams at a time per connection. Statements issued while the
//! lock is held fail fast instead of blocking.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::error::{Stage, db_error, nul_in_sql, open_error};
use crate::ffi;
use crate::types;
use rowbatch_core::{
    ColumnInfo, Connection, Dialect, DriverError, DriverResult, Row, RowCursor, Value,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for an in-memory database.
    pub path: String,
    /// Open flags (read-only, create, URI filenames).
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Self::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;
        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    #[must_use]
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the busy timeout.
    #[must_use]
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Inner state of the connection, protected by a mutex.
struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: an SQLite handle may move between threads as long as it is never
// used from two threads at once; the Mutex provides that synchronization.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

// SAFETY: all access to the raw handle goes through the Mutex.
unsafe impl Send for SqliteConnection {}
unsafe impl Sync for SqliteConnection {}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self, DriverError> {
        let c_path = CString::new(config.path.as_str())
            .map_err(|_| open_error(ffi::SQLITE_CANTOPEN, "path contains a null byte".into()))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: we pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
                        .to_string_lossy()
                        .into_owned();
                    ffi::sqlite3_close(db);
                    msg
                }
            };
            return Err(open_error(rc, format!("failed to open database: {msg}")));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DriverError> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self, DriverError> {
        Self::open(&SqliteConfig::file(path))
    }

    /// The database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Execute SQL directly without preparing (DDL, PRAGMAs).
    pub fn execute_raw(&self, sql: &str) -> Result<(), DriverError> {
        let inner = self.try_lock(sql)?;
        let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;

        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();
        // SAFETY: all pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            if !errmsg.is_null() {
                // SAFETY: errmsg was allocated by SQLite
                unsafe { ffi::sqlite3_free(errmsg.cast()) };
            }
            // SAFETY: inner.db is valid
            return Err(unsafe { db_error(inner.db, sql, Stage::Step) });
        }
        Ok(())
    }

    /// The rowid assigned by the most recent successful INSERT.
    pub fn last_insert_rowid(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    /// Rows changed by the most recent statement.
    pub fn changes(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid
        i64::from(unsafe { ffi::sqlite3_changes(inner.db) })
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire the handle without blocking.
    ///
    /// An open cursor holds the lock for its whole lifetime, and a std mutex
    /// is not reentrant, so blocking here would deadlock the calling thread.
    /// Failing fast turns that into a diagnosable error instead.
    fn try_lock(&self, sql: &str) -> Result<MutexGuard<'_, SqliteInner>, DriverError> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(DriverError::new(
                "connection is busy: a statement or cursor is still open on this connection",
            )
            .sql(sql)),
        }
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.lock();
        if !inner.db.is_null() {
            // SAFETY: db is valid and no statements outlive the connection
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
        }
    }
}

impl Connection for SqliteConnection {
    type Cursor<'conn>
        = SqliteCursor<'conn>
    where
        Self: 'conn;

    fn query(&self, sql: &str, params: &[Value]) -> DriverResult<Vec<Row>> {
        let inner = self.try_lock(sql)?;
        run_query(inner.db, sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        let inner = self.try_lock(sql)?;
        run_execute(inner.db, sql, params)
    }

    /// Runs the statement, then derives the keys from the rowid counter.
    ///
    /// SQLite assigns consecutive rowids to the rows of one multi-row
    /// INSERT, so the keys are `last_insert_rowid - n + 1 ..= last_insert_rowid`
    /// in insertion order. Both counters are read under the same lock as the
    /// statement, so no concurrent insert can interleave.
    fn insert_returning_keys(&self, sql: &str, params: &[Value]) -> DriverResult<Vec<Value>> {
        let inner = self.try_lock(sql)?;
        run_execute(inner.db, sql, params)?;

        // SAFETY: db is valid
        let (changes, rowid) = unsafe {
            (
                i64::from(ffi::sqlite3_changes(inner.db)),
                ffi::sqlite3_last_insert_rowid(inner.db),
            )
        };
        Ok((rowid - changes + 1..=rowid).map(Value::BigInt).collect())
    }

    fn open_cursor(&self, sql: &str, params: &[Value]) -> DriverResult<Self::Cursor<'_>> {
        let guard = self.try_lock(sql)?;
        let stmt = prepare_stmt(guard.db, sql)?;
        if let Err(e) = bind_params(guard.db, stmt, params, sql) {
            // SAFETY: stmt is valid
            unsafe { ffi::sqlite3_finalize(stmt) };
            return Err(e);
        }
        Ok(SqliteCursor {
            stmt,
            sql: sql.to_string(),
            columns: None,
            done: false,
            guard,
        })
    }
}

/// A forward-only cursor over one executing statement.
///
/// Holds the connection lock until dropped; the statement is finalized on
/// drop.
pub struct SqliteCursor<'conn> {
    stmt: *mut ffi::sqlite3_stmt,
    sql: String,
    columns: Option<Arc<ColumnInfo>>,
    done: bool,
    guard: MutexGuard<'conn, SqliteInner>,
}

impl SqliteCursor<'_> {
    fn column_info(&mut self) -> Arc<ColumnInfo> {
        if let Some(columns) = &self.columns {
            return Arc::clone(columns);
        }
        // SAFETY: stmt is valid
        let count = unsafe { ffi::sqlite3_column_count(self.stmt) };
        let mut names = Vec::with_capacity(count as usize);
        for i in 0..count {
            // SAFETY: stmt is valid, i is in range
            let name = unsafe { types::column_name(self.stmt, i) }
                .unwrap_or_else(|| format!("col{i}"));
            names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(names));
        self.columns = Some(Arc::clone(&columns));
        columns
    }
}

impl RowCursor for SqliteCursor<'_> {
    fn fetch_next(&mut self) -> DriverResult<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(self.stmt) };
        match rc {
            ffi::SQLITE_ROW => {
                let columns = self.column_info();
                let mut values = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    // SAFETY: stmt is valid and just returned SQLITE_ROW
                    values.push(unsafe { types::read_column(self.stmt, i as c_int) });
                }
                Ok(Some(Row::with_columns(columns, values)))
            }
            ffi::SQLITE_DONE => {
                self.done = true;
                Ok(None)
            }
            _ => {
                self.done = true;
                // SAFETY: the guarded db handle is valid
                Err(unsafe { db_error(self.guard.db, &self.sql, Stage::Step) })
            }
        }
    }
}

impl Drop for SqliteCursor<'_> {
    fn drop(&mut self) {
        if !self.stmt.is_null() {
            // SAFETY: stmt is valid and stepped to completion or abandoned
            unsafe {
                ffi::sqlite3_finalize(self.stmt);
            }
        }
    }
}

/// The SQLite SQL dialect.
///
/// The bundled library is well past 3.35, so RETURNING is always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn supports_returning(&self) -> bool {
        true
    }
}

// Statement helpers, called with the connection lock held.

fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<*mut ffi::sqlite3_stmt, DriverError> {
    let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;
    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: all pointers are valid
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            db,
            c_sql.as_ptr(),
            c_sql.as_bytes().len() as c_int,
            &mut stmt,
            ptr::null_mut(),
        )
    };

    if rc != ffi::SQLITE_OK {
        // SAFETY: db is valid
        return Err(unsafe { db_error(db, sql, Stage::Prepare) });
    }
    Ok(stmt)
}

fn bind_params(
    db: *mut ffi::sqlite3,
    stmt: *mut ffi::sqlite3_stmt,
    params: &[Value],
    sql: &str,
) -> Result<(), DriverError> {
    for (i, param) in params.iter().enumerate() {
        // SAFETY: stmt is valid, index is 1-based
        let rc = unsafe { types::bind_value(stmt, (i + 1) as c_int, param) };
        if rc != ffi::SQLITE_OK {
            // SAFETY: db is valid
            return Err(unsafe { db_error(db, sql, Stage::Step) }
                .detail(format!("binding parameter {}", i + 1)));
        }
    }
    Ok(())
}

fn run_query(db: *mut ffi::sqlite3, sql: &str, params: &[Value]) -> DriverResult<Vec<Row>> {
    let stmt = prepare_stmt(db, sql)?;
    if let Err(e) = bind_params(db, stmt, params, sql) {
        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };
        return Err(e);
    }

    // SAFETY: stmt is valid
    let col_count = unsafe { ffi::sqlite3_column_count(stmt) };
    let mut names = Vec::with_capacity(col_count as usize);
    for i in 0..col_count {
        // SAFETY: stmt is valid, i is in range
        let name = unsafe { types::column_name(stmt, i) }.unwrap_or_else(|| format!("col{i}"));
        names.push(name);
    }
    let columns = Arc::new(ColumnInfo::new(names));

    let mut rows = Vec::new();
    loop {
        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt) };
        match rc {
            ffi::SQLITE_ROW => {
                let mut values = Vec::with_capacity(col_count as usize);
                for i in 0..col_count {
                    // SAFETY: stmt is valid and just returned SQLITE_ROW
                    values.push(unsafe { types::read_column(stmt, i) });
                }
                rows.push(Row::with_columns(Arc::clone(&columns), values));
            }
            ffi::SQLITE_DONE => break,
            _ => {
                // SAFETY: stmt and db are valid
                let err = unsafe { db_error(db, sql, Stage::Step) };
                unsafe { ffi::sqlite3_finalize(stmt) };
                return Err(err);
            }
        }
    }

    // SAFETY: stmt is valid
    unsafe { ffi::sqlite3_finalize(stmt) };
    Ok(rows)
}

fn run_execute(db: *mut ffi::sqlite3, sql: &str, params: &[Value]) -> DriverResult<u64> {
    let stmt = prepare_stmt(db, sql)?;
    if let Err(e) = bind_params(db, stmt, params, sql) {
        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };
        return Err(e);
    }

    // SAFETY: stmt is valid; step until completion, discarding any rows
    let rc = loop {
        let rc = unsafe { ffi::sqlite3_step(stmt) };
        if rc != ffi::SQLITE_ROW {
            break rc;
        }
    };

    if rc != ffi::SQLITE_DONE {
        // SAFETY: db is valid
        let err = unsafe { db_error(db, sql, Stage::Step) };
        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };
        return Err(err);
    }

    // SAFETY: stmt and db are valid
    unsafe { ffi::sqlite3_finalize(stmt) };
    let changes = unsafe { ffi::sqlite3_changes(db) };
    Ok(changes as u64)
}
