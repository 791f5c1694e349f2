//! SQLite driver for rowbatch.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! Implements the synchronous `Connection` trait from `rowbatch-core` over
//! hand-written FFI bindings to libsqlite3, plus the SQLite dialect used by
//! the batch engine.
//!
//! # Type Mapping
//!
//! | rowbatch value | SQLite storage |
//! |----------------|----------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Timestamp` | INTEGER (microseconds since the Unix epoch) |
//! | `Uuid` | BLOB (16 bytes) |
//!
//! # Thread Safety
//!
//! `SqliteConnection` is `Send` and `Sync`; an internal mutex serializes
//! access to the handle. A cursor opened by `open_cursor` holds that mutex
//! until it is dropped, so no other statement can run on the connection
//! while a lazy read is in progress. Issuing one anyway fails fast with a
//! driver error rather than blocking on the non-reentrant lock.

// The linked SQLite library comes from libsqlite3-sys's bundled build.
use libsqlite3_sys as _;

pub mod connection;
mod error;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection, SqliteCursor, SqliteDialect};

/// The SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// The SQLite library version as a number, e.g. 3.45.0 = 3045000.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
