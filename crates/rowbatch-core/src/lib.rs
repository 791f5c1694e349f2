//! Core types and traits for rowbatch.
//!
//! This crate provides the foundational abstractions for the batch-write /
//! chunked-read engine:
//!
//! - [`Value`] and [`Row`] for dynamically-typed parameters and results
//! - The [`Error`] taxonomy and the driver-failure [`classify`]r
//! - [`TableSchema`] / [`IdStrategy`] static descriptors and the [`Entity`]
//!   contract
//! - The synchronous [`Connection`] / [`Dialect`] traits drivers implement
//! - The [`Query`] boundary object the engine paginates over

pub mod connection;
pub mod error;
pub mod ident;
pub mod query;
pub mod row;
pub mod schema;
pub mod value;

pub use connection::{AnsiDialect, Connection, Dialect, DriverResult, RowCursor};
pub use error::{
    ConstraintKind, DatabaseError, DatabaseErrorKind, DriverError, Error, ForeignKeyKind,
    MappingError, Result, ValidationError, classify,
};
pub use ident::quote_ident;
pub use query::Query;
pub use row::{ColumnInfo, FromValue, Row, RowMapper};
pub use schema::{Entity, IdKind, IdStrategy, TableSchema, generate_id};
pub use value::Value;
