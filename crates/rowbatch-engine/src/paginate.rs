//! Page- and cursor-based pagination.
//!
//! Page pagination issues a total-count side query derived from the same
//! base query; cursor pagination seeks by the last-seen key value and hands
//! the caller an opaque token to resume from.

use rowbatch_core::{Connection, Error, Query, Result, Row, RowMapper, Value};

/// Per-page size used when the caller requests zero.
pub const DEFAULT_PER_PAGE: u64 = 10;

/// One page of an offset-paginated listing.
#[derive(Debug)]
pub struct Page<T> {
    /// The mapped rows of this page.
    pub data: Vec<T>,
    /// 1-based page number actually served.
    pub current_page: u64,
    /// Page size actually served.
    pub per_page: u64,
    /// Total matching rows, independent of the window.
    pub total: u64,
}

impl<T> Page<T> {
    /// The last page number (`ceil(total / per_page)`).
    pub fn last_page(&self) -> u64 {
        self.total.div_ceil(self.per_page)
    }

    /// Are there pages after this one?
    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}

/// An opaque token encoding the position to resume a keyset scan from.
///
/// The encoding is an implementation detail and not a stable format;
/// callers should treat the token as a black box. A missing cursor denotes
/// the start of the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    /// Encode the last-seen key value into a token.
    fn encode(value: &Value) -> Result<Self> {
        serde_json::to_string(value).map(Cursor).map_err(|e| {
            Error::validation(format!("could not encode pagination cursor: {e}"))
        })
    }

    /// Decode the token back into the key value it wraps.
    fn decode(&self) -> Result<Value> {
        serde_json::from_str(&self.0)
            .map_err(|e| Error::validation(format!("malformed pagination cursor: {e}")))
    }

    /// The token text, for transport to a client.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Cursor(token)
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug)]
pub struct CursorPage<T> {
    /// The mapped rows of this page.
    pub data: Vec<T>,
    /// Page size actually served.
    pub per_page: u64,
    /// Token for the next page, or `None` at the end of the sequence.
    pub next_cursor: Option<Cursor>,
}

/// Count the rows matching a query's filter, ignoring its ordering and any
/// limit/offset.
pub fn count<C: Connection>(conn: &C, query: &Query) -> Result<u64> {
    let (sql, params) = query.build_count();
    let row = fetch_single_row(conn, &sql, &params)?;
    let total: i64 = row.get_as(0)?;
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Serve one page of an offset-paginated listing.
///
/// A `page` of 0 is treated as 1 and a `per_page` of 0 as
/// [`DEFAULT_PER_PAGE`]. Requesting a page beyond the last yields empty
/// data with the true total.
#[tracing::instrument(level = "debug", skip_all, fields(page, per_page))]
pub fn paginate<T, C, M>(
    conn: &C,
    query: &Query,
    page: u64,
    per_page: u64,
    mapper: &M,
) -> Result<Page<T>>
where
    C: Connection,
    M: RowMapper<T>,
{
    let current_page = page.max(1);
    let per_page = effective_per_page(per_page);
    let total = count(conn, query)?;

    let (sql, params) = query.build_page(per_page, (current_page - 1) * per_page);
    let rows = conn.query(&sql, &params).map_err(Error::from)?;
    let data = rows
        .iter()
        .map(|row| mapper.map_row(row))
        .collect::<Result<Vec<T>>>()?;

    Ok(Page {
        data,
        current_page,
        per_page,
        total,
    })
}

/// Serve one page of a cursor-paginated listing.
///
/// A missing cursor starts from the beginning; otherwise rows are filtered
/// to keys greater than the decoded cursor, ascending. `next_cursor` is
/// absent when fewer than `per_page` rows came back.
#[tracing::instrument(level = "debug", skip_all, fields(per_page, id_column))]
pub fn cursor_paginate<T, C, M>(
    conn: &C,
    query: &Query,
    cursor: Option<&Cursor>,
    per_page: u64,
    id_column: &str,
    mapper: &M,
) -> Result<CursorPage<T>>
where
    C: Connection,
    M: RowMapper<T>,
{
    let per_page = effective_per_page(per_page);
    let last_seen = cursor.map(Cursor::decode).transpose()?;

    let (sql, params) = query.build_keyset(id_column, last_seen.as_ref(), per_page);
    let rows = conn.query(&sql, &params).map_err(Error::from)?;

    let next_cursor = if rows.len() as u64 == per_page {
        match rows.last().and_then(|row| row.get_by_name(id_column)) {
            Some(key) => Some(Cursor::encode(key)?),
            None => {
                return Err(Error::validation(format!(
                    "cursor column '{id_column}' is absent from the query's result rows"
                )));
            }
        }
    } else {
        None
    };

    let data = rows
        .iter()
        .map(|row| mapper.map_row(row))
        .collect::<Result<Vec<T>>>()?;

    Ok(CursorPage {
        data,
        per_page,
        next_cursor,
    })
}

fn effective_per_page(requested: u64) -> u64 {
    if requested == 0 {
        DEFAULT_PER_PAGE
    } else {
        requested
    }
}

/// Fetch a query expected to yield exactly one row, raising no-result /
/// non-unique-result failures otherwise.
fn fetch_single_row<C: Connection>(conn: &C, sql: &str, params: &[Value]) -> Result<Row> {
    let mut rows = conn.query(sql, params).map_err(Error::from)?;
    match rows.len() {
        1 => Ok(rows.remove(0)),
        0 => Err(Error::NoResult {
            sql: sql.to_string(),
        }),
        n => Err(Error::NonUniqueResult {
            sql: sql.to_string(),
            rows: n,
        }),
    }
}
