//! Batch persistence engine.
//!
//! Partitions an entity slice into bounded-size batches, resolves
//! client-side keys before execution, stamps timestamps, executes one
//! parameterized multi-row INSERT per batch, and writes database-assigned
//! keys back onto the entities in insertion order.

use rowbatch_core::{
    Connection, DatabaseError, DatabaseErrorKind, Dialect, Entity, Error, IdStrategy, Result,
    TableSchema, Value, generate_id, quote_ident,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Batch size used when the caller passes `None` or zero.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Upper bound on a single batch; larger requests are clamped.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Persist every entity in `entities`, mutating them in place (generated
/// keys, timestamps) and returning the number of rows written.
///
/// Batches execute strictly in input order, one at a time, on the caller's
/// thread. The first failing batch aborts the call with a classified error;
/// batches the database already committed stay committed — atomicity across
/// the whole call belongs to an enclosing transaction, not to this engine.
#[tracing::instrument(level = "debug", skip_all, fields(entities = entities.len()))]
pub fn save_all<E, C>(
    conn: &C,
    dialect: &dyn Dialect,
    entities: &mut [E],
    batch_size: Option<usize>,
) -> Result<u64>
where
    E: Entity,
    C: Connection,
{
    if entities.is_empty() {
        return Ok(0);
    }
    let schema = E::schema();
    let size = effective_batch_size(batch_size);
    tracing::debug!(table = schema.table, batch_size = size, "saving entities");

    let mut written = 0u64;
    for batch in entities.chunks_mut(size) {
        written += insert_batch(conn, dialect, schema, batch)?;
    }
    Ok(written)
}

/// Clamp a requested batch size to `1..=MAX_BATCH_SIZE`, defaulting to
/// [`DEFAULT_BATCH_SIZE`] when absent or zero.
pub fn effective_batch_size(requested: Option<usize>) -> usize {
    match requested {
        None | Some(0) => DEFAULT_BATCH_SIZE,
        Some(n) => n.min(MAX_BATCH_SIZE),
    }
}

fn insert_batch<E, C>(
    conn: &C,
    dialect: &dyn Dialect,
    schema: &TableSchema,
    batch: &mut [E],
) -> Result<u64>
where
    E: Entity,
    C: Connection,
{
    resolve_ids(schema, batch)?;
    let stamped_at = stamp_timestamps(schema, batch);

    let include_id = !matches!(schema.id_strategy, IdStrategy::DatabaseAssigned);
    let sql = build_insert_sql(dialect, schema, batch.len(), include_id);
    let params = collect_params(schema, batch, include_id, stamped_at)?;

    match schema.id_strategy {
        IdStrategy::DatabaseAssigned if dialect.supports_returning() => {
            let sql = format!("{sql}{}", dialect.returning_clause(schema.id_column));
            tracing::trace!(sql = %sql, rows = batch.len(), "batch insert (returning)");
            let rows = conn.query(&sql, &params).map_err(Error::from)?;
            if rows.len() != batch.len() {
                return Err(key_count_mismatch(rows.len(), batch.len(), &sql));
            }
            for (entity, row) in batch.iter_mut().zip(rows) {
                let key = row.get(0).cloned().unwrap_or(Value::Null);
                entity.set_id(key);
            }
        }
        IdStrategy::DatabaseAssigned => {
            tracing::trace!(sql = %sql, rows = batch.len(), "batch insert (generated keys)");
            let keys = conn.insert_returning_keys(&sql, &params).map_err(Error::from)?;
            if keys.len() != batch.len() {
                return Err(key_count_mismatch(keys.len(), batch.len(), &sql));
            }
            for (entity, key) in batch.iter_mut().zip(keys) {
                entity.set_id(key);
            }
        }
        _ => {
            tracing::trace!(sql = %sql, rows = batch.len(), "batch insert");
            conn.execute(&sql, &params).map_err(Error::from)?;
        }
    }
    Ok(batch.len() as u64)
}

/// Resolve identifiers for a batch before execution.
///
/// Client-side strategies fill in missing keys; an existing non-null key is
/// never overwritten. A `Preassigned` entity with a null key fails the whole
/// call before any statement runs.
fn resolve_ids<E: Entity>(schema: &TableSchema, batch: &mut [E]) -> Result<()> {
    match schema.id_strategy {
        IdStrategy::Preassigned => {
            for entity in batch.iter() {
                if entity.id_value().is_null() {
                    return Err(Error::validation(format!(
                        "entity for table '{}' uses a preassigned id but none was set",
                        schema.table
                    )));
                }
            }
        }
        IdStrategy::Generated(_) | IdStrategy::Custom(_) => {
            for entity in batch.iter_mut() {
                if entity.id_value().is_null() {
                    if let Some(id) = generate_id(&schema.id_strategy) {
                        entity.set_id(id);
                    }
                }
            }
        }
        IdStrategy::DatabaseAssigned => {}
    }
    Ok(())
}

/// Stamp creation and update timestamps with one instant for the whole
/// batch, so every row of a batch carries identical times. Returns the
/// instant used so the statement binds the very same value.
fn stamp_timestamps<E: Entity>(schema: &TableSchema, batch: &mut [E]) -> Option<i64> {
    if !schema.has_timestamps() {
        return None;
    }
    let now = now_micros();
    for entity in batch.iter_mut() {
        if schema.created_at.is_some() {
            entity.set_created_at(now);
        }
        if schema.updated_at.is_some() {
            entity.set_updated_at(now);
        }
    }
    Some(now)
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// Build one parameterized multi-row INSERT for a batch.
fn build_insert_sql(
    dialect: &dyn Dialect,
    schema: &TableSchema,
    rows: usize,
    include_id: bool,
) -> String {
    let mut columns: Vec<&str> = Vec::with_capacity(schema.columns.len() + 3);
    if include_id {
        columns.push(schema.id_column);
    }
    columns.extend_from_slice(schema.columns);
    if let Some(created) = schema.created_at {
        columns.push(created);
    }
    if let Some(updated) = schema.updated_at {
        columns.push(updated);
    }

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let width = columns.len();
    let mut placeholder_index = 0;
    let mut tuples = Vec::with_capacity(rows);
    for _ in 0..rows {
        let tuple = (0..width)
            .map(|_| {
                placeholder_index += 1;
                dialect.placeholder(placeholder_index)
            })
            .collect::<Vec<_>>()
            .join(", ");
        tuples.push(format!("({tuple})"));
    }

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(schema.table),
        column_list,
        tuples.join(", ")
    )
}

/// Collect the flat parameter list for a batch, in column order per row.
/// `stamped_at` is the instant [`stamp_timestamps`] wrote onto the entities.
fn collect_params<E: Entity>(
    schema: &TableSchema,
    batch: &[E],
    include_id: bool,
    stamped_at: Option<i64>,
) -> Result<Vec<Value>> {
    let mut timestamps = 0;
    if schema.created_at.is_some() {
        timestamps += 1;
    }
    if schema.updated_at.is_some() {
        timestamps += 1;
    }

    let width = usize::from(include_id) + schema.columns.len() + timestamps;
    let mut params = Vec::with_capacity(width * batch.len());
    for entity in batch {
        if include_id {
            params.push(entity.id_value());
        }
        let values = entity.insert_values();
        if values.len() != schema.columns.len() {
            return Err(Error::validation(format!(
                "entity for table '{}' supplied {} values for {} declared columns",
                schema.table,
                values.len(),
                schema.columns.len()
            )));
        }
        params.extend(values);
        for _ in 0..timestamps {
            params.push(Value::Timestamp(stamped_at.unwrap_or(0)));
        }
    }
    Ok(params)
}

fn key_count_mismatch(got: usize, expected: usize, sql: &str) -> Error {
    Error::Database(
        DatabaseError::new(
            DatabaseErrorKind::Unknown,
            format!("driver returned {got} generated keys for a batch of {expected} rows"),
        )
        .with_sql(sql),
    )
}
