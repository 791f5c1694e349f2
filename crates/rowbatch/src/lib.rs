//! rowbatch - batched writes, memory-bounded reads, and classified errors
//! for SQL databases.
//!
//! rowbatch is a small data-access layer, not an ORM. It provides:
//!
//! - Batched multi-row insertion with pluggable primary-key strategies
//! - Chunked, keyset, and lazy iteration over large result sets
//! - Page- and cursor-based pagination
//! - A typed, retry-aware error taxonomy over raw driver failures
//!
//! Everything is synchronous and blocking: operations run on the caller's
//! thread, one statement at a time, over a caller-owned connection.
//!
//! # Quick Start
//!
//! ```ignore
//! use rowbatch::prelude::*;
//! use rowbatch_sqlite::{SqliteConnection, SqliteDialect};
//!
//! #[derive(Debug, Default)]
//! struct Hero {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! static HERO_SCHEMA: TableSchema =
//!     TableSchema::new("heroes", "id", IdStrategy::DatabaseAssigned, &["name"]);
//!
//! impl Entity for Hero {
//!     fn schema() -> &'static TableSchema { &HERO_SCHEMA }
//!     fn insert_values(&self) -> Vec<Value> { vec![Value::Text(self.name.clone())] }
//!     fn id_value(&self) -> Value { Value::from(self.id) }
//!     fn set_id(&mut self, id: Value) { self.id = id.as_i64(); }
//!     fn from_row(row: &Row) -> Result<Hero> {
//!         Ok(Hero { id: row.get_named("id")?, name: row.get_named("name")? })
//!     }
//! }
//!
//! fn run(conn: &SqliteConnection) -> Result<()> {
//!     let mut heroes = vec![Hero { name: "Spider-Boy".into(), ..Hero::default() }];
//!     save_all(conn, &SqliteDialect, &mut heroes, None)?;
//!
//!     let query = Query::new("SELECT id, name FROM heroes");
//!     let page = paginate(conn, &query, 1, 10, &Hero::from_row)?;
//!     println!("{} of {} heroes", page.data.len(), page.total);
//!     Ok(())
//! }
//! ```

// Re-export the public surface of the sub-crates
pub use rowbatch_core::{
    // Connection boundary
    AnsiDialect,
    ColumnInfo,
    Connection,
    // Error taxonomy
    ConstraintKind,
    DatabaseError,
    DatabaseErrorKind,
    Dialect,
    DriverError,
    DriverResult,
    // Schema and entities
    Entity,
    Error,
    ForeignKeyKind,
    FromValue,
    IdKind,
    IdStrategy,
    MappingError,
    // Queries and rows
    Query,
    Result,
    Row,
    RowCursor,
    RowMapper,
    TableSchema,
    ValidationError,
    Value,
    classify,
    generate_id,
    quote_ident,
};

pub use rowbatch_engine::{
    Cursor, CursorPage, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_PER_PAGE, LazyRows,
    MAX_BATCH_SIZE, Page, chunk, chunk_by_id, count, cursor_paginate, lazy, paginate, save_all,
};

// SQLite driver (feature-gated)
#[cfg(feature = "sqlite")]
pub use rowbatch_sqlite::{SqliteConfig, SqliteConnection, SqliteDialect};

/// The commonly used subset of the API, for glob import.
pub mod prelude {
    pub use crate::{
        Connection, Cursor, CursorPage, Dialect, Entity, Error, IdKind, IdStrategy, Page, Query,
        Result, Row, RowMapper, TableSchema, Value, chunk, chunk_by_id, count, cursor_paginate,
        lazy, paginate, save_all,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // The facade must expose enough surface to define an entity and drive
    // every engine operation without reaching into the sub-crates.
    #[derive(Debug, Default)]
    struct Widget {
        id: Option<i64>,
        name: String,
    }

    static WIDGET_SCHEMA: TableSchema =
        TableSchema::new("widgets", "id", IdStrategy::DatabaseAssigned, &["name"]);

    impl Entity for Widget {
        fn schema() -> &'static TableSchema {
            &WIDGET_SCHEMA
        }

        fn insert_values(&self) -> Vec<Value> {
            vec![Value::Text(self.name.clone())]
        }

        fn id_value(&self) -> Value {
            Value::from(self.id)
        }

        fn set_id(&mut self, id: Value) {
            self.id = id.as_i64();
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                name: row.get_named("name")?,
            })
        }
    }

    #[test]
    fn entity_surface_is_complete() {
        let widget = Widget {
            id: None,
            name: "gear".into(),
        };
        assert!(widget.id_value().is_null());
        assert_eq!(Widget::schema().table, "widgets");
        assert_eq!(widget.insert_values().len(), 1);
    }

    #[test]
    fn defaults_are_re_exported() {
        assert_eq!(DEFAULT_BATCH_SIZE, 500);
        assert_eq!(MAX_BATCH_SIZE, 1000);
        assert_eq!(DEFAULT_CHUNK_SIZE, 1000);
        assert_eq!(DEFAULT_PER_PAGE, 10);
    }
}
