//! Translation of SQLite failures into raw driver errors.
//!
//! SQLite reports numeric result codes, not SQLSTATEs, so this module
//! synthesizes the closest SQLSTATE for each code and carries the extended
//! result code as the vendor code. Classification into the error taxonomy
//! happens downstream, in `rowbatch-core`.

use crate::ffi;
use rowbatch_core::DriverError;
use std::ffi::{CStr, c_int};

/// Where in the statement lifecycle the failure occurred. Prepare-time
/// failures with the generic SQLITE_ERROR code are almost always malformed
/// SQL, so they get a syntax-class SQLSTATE; at step time the same code is
/// left unclassified.
#[derive(Clone, Copy)]
pub(crate) enum Stage {
    Prepare,
    Step,
}

/// Synthesize an SQLSTATE for an extended SQLite result code.
fn sqlstate_for(extended: c_int, stage: Stage) -> Option<&'static str> {
    match extended & 0xff {
        ffi::SQLITE_CONSTRAINT => Some(match extended {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => "23505",
            ffi::SQLITE_CONSTRAINT_NOTNULL => "23502",
            ffi::SQLITE_CONSTRAINT_CHECK => "23514",
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => "23503",
            _ => "23000",
        }),
        // A busy or locked database is a retryable concurrency failure.
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => Some("40001"),
        ffi::SQLITE_CANTOPEN | ffi::SQLITE_NOTADB => Some("08001"),
        ffi::SQLITE_ERROR if matches!(stage, Stage::Prepare) => Some("42000"),
        _ => None,
    }
}

/// Build a driver error from the connection's current error state.
///
/// # Safety
/// `db` must be a valid, non-null connection handle.
pub(crate) unsafe fn db_error(db: *mut ffi::sqlite3, sql: &str, stage: Stage) -> DriverError {
    // SAFETY: db is valid, errmsg returns a valid C string owned by SQLite
    let (message, extended) = unsafe {
        let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
            .to_string_lossy()
            .into_owned();
        (msg, ffi::sqlite3_extended_errcode(db))
    };

    let mut err = DriverError::new(message).vendor_code(extended).sql(sql);
    if let Some(state) = sqlstate_for(extended, stage) {
        err = err.sqlstate(state);
    }
    err
}

/// Build a driver error for a failed open, where no usable handle exists.
pub(crate) fn open_error(rc: c_int, message: String) -> DriverError {
    let mut err = DriverError::new(message).vendor_code(rc);
    if let Some(state) = sqlstate_for(rc, Stage::Step) {
        err = err.sqlstate(state);
    } else {
        err = err.sqlstate("08001");
    }
    err
}

/// A string that cannot cross the FFI boundary (embedded NUL byte).
pub(crate) fn nul_in_sql(sql: &str) -> DriverError {
    DriverError::new("SQL contains a null byte")
        .sqlstate("42000")
        .sql(sql)
}
