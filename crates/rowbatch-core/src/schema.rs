//! Static table descriptors, identifier strategies, and the entity contract.
//!
//! Metadata is declared once per entity type as a `'static` descriptor and
//! passed by reference; nothing is discovered reflectively at call time.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use uuid::Uuid;

/// How an entity's primary key is produced.
///
/// Exactly one strategy applies per entity type, resolved statically from
/// the table descriptor — never re-evaluated per row.
#[derive(Debug, Clone, Copy)]
pub enum IdStrategy {
    /// The caller assigns the key before saving. A null key fails
    /// validation before any statement executes.
    Preassigned,
    /// The client generates the key before execution when it is null;
    /// a non-null key supplied by the caller always wins.
    Generated(IdKind),
    /// A caller-supplied generator is invoked per missing key. The function
    /// must not rely on call serialization; rowbatch does not synchronize
    /// concurrent callers.
    Custom(fn() -> Value),
    /// The database assigns the key (identity/serial); it is written back
    /// onto the entity after execution.
    DatabaseAssigned,
}

/// Kind of client-generated identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Random UUID (version 4).
    Uuid,
    /// Time-ordered UUID (version 7), monotonic enough for keyset scans.
    TimeOrderedUuid,
}

/// Generate a key value for a client-side strategy.
///
/// Returns `None` for strategies where the client never generates
/// (`Preassigned`, `DatabaseAssigned`).
pub fn generate_id(strategy: &IdStrategy) -> Option<Value> {
    match strategy {
        IdStrategy::Generated(IdKind::Uuid) => Some(Value::Uuid(*Uuid::new_v4().as_bytes())),
        IdStrategy::Generated(IdKind::TimeOrderedUuid) => {
            Some(Value::Uuid(*Uuid::now_v7().as_bytes()))
        }
        IdStrategy::Custom(generator) => Some(generator()),
        IdStrategy::Preassigned | IdStrategy::DatabaseAssigned => None,
    }
}

/// Static descriptor of a table an entity type maps to.
///
/// `columns` lists the insertable data columns in statement order. The
/// identifier and timestamp columns are declared separately; the engine
/// decides per strategy whether the identifier participates in the insert.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    /// Table name.
    pub table: &'static str,
    /// Identifier column name.
    pub id_column: &'static str,
    /// How the identifier is produced.
    pub id_strategy: IdStrategy,
    /// Insertable data columns, in order, excluding id and timestamps.
    pub columns: &'static [&'static str],
    /// Creation timestamp column, stamped on insert.
    pub created_at: Option<&'static str>,
    /// Update timestamp column, stamped on every insert.
    pub updated_at: Option<&'static str>,
}

impl TableSchema {
    /// Create a descriptor with no timestamp columns.
    pub const fn new(
        table: &'static str,
        id_column: &'static str,
        id_strategy: IdStrategy,
        columns: &'static [&'static str],
    ) -> Self {
        Self {
            table,
            id_column,
            id_strategy,
            columns,
            created_at: None,
            updated_at: None,
        }
    }

    /// Declare creation/update timestamp columns.
    pub const fn timestamps(mut self, created_at: &'static str, updated_at: &'static str) -> Self {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
        self
    }

    /// Does this schema stamp any timestamp column on insert?
    pub const fn has_timestamps(&self) -> bool {
        self.created_at.is_some() || self.updated_at.is_some()
    }
}

/// Contract for types that map to a table row.
///
/// Implemented by hand against a static [`TableSchema`]; there is no derive
/// macro and no runtime reflection.
pub trait Entity: Sized + Send + Sync {
    /// The static table descriptor for this type.
    fn schema() -> &'static TableSchema;

    /// Values for `schema().columns`, in the same order. Must not include
    /// the identifier or timestamp columns.
    fn insert_values(&self) -> Vec<Value>;

    /// Current identifier value; `Value::Null` when unset.
    fn id_value(&self) -> Value;

    /// Write a generated or database-assigned identifier back.
    fn set_id(&mut self, id: Value);

    /// Stamp the creation timestamp (microseconds since epoch).
    /// Entities without a creation column ignore this.
    fn set_created_at(&mut self, _micros: i64) {}

    /// Stamp the update timestamp (microseconds since epoch).
    /// Entities without an update column ignore this.
    fn set_updated_at(&mut self, _micros: i64) {}

    /// Construct an instance from a result row.
    fn from_row(row: &Row) -> Result<Self>;
}
