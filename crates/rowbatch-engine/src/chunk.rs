//! Chunked and lazy consumption of large result sets.
//!
//! Three modes over the same capability — process all matching rows without
//! materializing them at once: offset chunking, keyset ("chunk by id")
//! chunking, and a lazy one-row-at-a-time sequence bound to a forward-only
//! cursor.

use rowbatch_core::{Connection, Error, Query, Result, Row, RowCursor, RowMapper, Value};
use std::marker::PhantomData;

/// Chunk size used when the caller requests zero.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Clamp a requested chunk size, defaulting to [`DEFAULT_CHUNK_SIZE`] for a
/// non-positive request.
pub fn effective_chunk_size(requested: usize) -> usize {
    if requested == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        requested
    }
}

/// Process a query in fixed-size chunks using increasing OFFSET windows.
///
/// `on_chunk` receives each mapped chunk and returns whether to continue;
/// returning `false` stops immediately and no further chunk is fetched. The
/// returned count covers only rows delivered to the callback, including the
/// stopping chunk. An empty first page returns 0 without invoking the
/// callback.
#[tracing::instrument(level = "debug", skip_all, fields(size))]
pub fn chunk<T, C, M, F>(
    conn: &C,
    query: &Query,
    size: usize,
    mapper: &M,
    mut on_chunk: F,
) -> Result<u64>
where
    C: Connection,
    M: RowMapper<T>,
    F: FnMut(&[T]) -> bool,
{
    let size = effective_chunk_size(size);
    let mut page = 0u64;
    let mut total = 0u64;
    loop {
        let (sql, params) = query.build_page(size as u64, page * size as u64);
        let rows = conn.query(&sql, &params).map_err(Error::from)?;
        if rows.is_empty() {
            break;
        }
        let fetched = rows.len();
        let items = map_rows(&rows, mapper)?;
        total += fetched as u64;
        tracing::trace!(page, rows = fetched, "delivering chunk");
        if !on_chunk(&items) {
            break;
        }
        if fetched < size {
            break;
        }
        page += 1;
    }
    Ok(total)
}

/// Process a query in fixed-size chunks by seeking on `id_column` instead of
/// an offset, avoiding the cost growth of deep OFFSET scans.
///
/// Each chunk's starting point is the identifier of the last row of the
/// previous chunk; correctness requires `id_column` to be unique and
/// monotonic per row. Stop semantics match [`chunk`].
#[tracing::instrument(level = "debug", skip_all, fields(size, id_column))]
pub fn chunk_by_id<T, C, M, F>(
    conn: &C,
    query: &Query,
    size: usize,
    id_column: &str,
    mapper: &M,
    mut on_chunk: F,
) -> Result<u64>
where
    C: Connection,
    M: RowMapper<T>,
    F: FnMut(&[T]) -> bool,
{
    let size = effective_chunk_size(size);
    let mut last_seen: Option<Value> = None;
    let mut total = 0u64;
    loop {
        let (sql, params) = query.build_keyset(id_column, last_seen.as_ref(), size as u64);
        let rows = conn.query(&sql, &params).map_err(Error::from)?;
        if rows.is_empty() {
            break;
        }
        let fetched = rows.len();
        if let Some(last_row) = rows.last() {
            last_seen = Some(keyset_value(last_row, id_column)?);
        }
        let items = map_rows(&rows, mapper)?;
        total += fetched as u64;
        tracing::trace!(rows = fetched, "delivering keyset chunk");
        if !on_chunk(&items) {
            break;
        }
        if fetched < size {
            break;
        }
    }
    Ok(total)
}

/// Read the keyset column from a raw row, before mapping.
fn keyset_value(row: &Row, id_column: &str) -> Result<Value> {
    row.get_by_name(id_column).cloned().ok_or_else(|| {
        Error::validation(format!(
            "keyset column '{id_column}' is absent from the query's result rows"
        ))
    })
}

fn map_rows<T, M: RowMapper<T>>(rows: &[Row], mapper: &M) -> Result<Vec<T>> {
    rows.iter().map(|row| mapper.map_row(row)).collect()
}

/// Open a lazy sequence over a query: one statement, one forward-only
/// cursor, rows mapped on demand.
pub fn lazy<'conn, T, C, M>(
    conn: &'conn C,
    query: &Query,
    mapper: M,
) -> Result<LazyRows<'conn, C, M, T>>
where
    C: Connection,
    M: RowMapper<T>,
{
    let (sql, params) = query.build();
    tracing::trace!(sql = %sql, "opening lazy cursor");
    let cursor = conn.open_cursor(&sql, &params).map_err(Error::from)?;
    Ok(LazyRows {
        cursor: Some(cursor),
        mapper,
        _item: PhantomData,
    })
}

/// A lazy, finite, non-restartable sequence of mapped rows.
///
/// The underlying statement and cursor are released exactly once, on the
/// first of: explicit [`LazyRows::close`], iteration exhaustion, a row
/// failure, or drop. Closing before exhaustion is safe.
pub struct LazyRows<'conn, C, M, T>
where
    C: Connection + 'conn,
    M: RowMapper<T>,
{
    cursor: Option<C::Cursor<'conn>>,
    mapper: M,
    _item: PhantomData<fn() -> T>,
}

impl<'conn, C, M, T> LazyRows<'conn, C, M, T>
where
    C: Connection + 'conn,
    M: RowMapper<T>,
{
    /// Release the cursor and statement now. Idempotent.
    pub fn close(&mut self) {
        self.cursor = None;
    }

    /// Has the underlying cursor been released?
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }
}

impl<'conn, C, M, T> Iterator for LazyRows<'conn, C, M, T>
where
    C: Connection + 'conn,
    M: RowMapper<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        match cursor.fetch_next() {
            Ok(Some(row)) => match self.mapper.map_row(&row) {
                Ok(item) => Some(Ok(item)),
                Err(e) => {
                    self.close();
                    Some(Err(e))
                }
            },
            Ok(None) => {
                self.close();
                None
            }
            Err(e) => {
                self.close();
                Some(Err(Error::from(e)))
            }
        }
    }
}
