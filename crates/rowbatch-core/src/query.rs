//! The query representation consumed by the engine.
//!
//! Queries arrive already built — select list, filter predicate, ordering,
//! parameter bindings — and the engine treats them as opaque beyond the
//! pagination and keyset clauses it appends itself. Placeholders are
//! positional `?`.

use crate::ident::quote_ident;
use crate::value::Value;

/// A parameterized query at the boundary between the external builder and
/// the engine.
#[derive(Debug, Clone)]
pub struct Query {
    select: String,
    filter: Option<String>,
    order: Option<String>,
    params: Vec<Value>,
}

impl Query {
    /// Create a query from its select text, e.g. `SELECT id, name FROM users`.
    pub fn new(select: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            filter: None,
            order: None,
            params: Vec::new(),
        }
    }

    /// Attach a filter predicate (WHERE body, without the keyword) and its
    /// parameter bindings.
    pub fn filter(mut self, predicate: impl Into<String>, params: Vec<Value>) -> Self {
        self.filter = Some(predicate.into());
        self.params = params;
        self
    }

    /// Attach an ordering clause (ORDER BY body, without the keyword).
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// The parameter bindings of the base query.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Build the base query unchanged.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = self.select.clone();
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if let Some(order) = &self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        (sql, self.params.clone())
    }

    /// Build the base query with a LIMIT/OFFSET window appended.
    pub fn build_page(&self, limit: u64, offset: u64) -> (String, Vec<Value>) {
        let (mut sql, params) = self.build();
        sql.push_str(&format!(" LIMIT {limit}"));
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        (sql, params)
    }

    /// Build a keyset fetch: base filter AND `id_column > last_seen`,
    /// ordered ascending by `id_column`, limited to `limit` rows.
    ///
    /// The base ordering is replaced — keyset correctness requires the scan
    /// to be ordered by the key column and nothing else.
    pub fn build_keyset(
        &self,
        id_column: &str,
        last_seen: Option<&Value>,
        limit: u64,
    ) -> (String, Vec<Value>) {
        let key = quote_ident(id_column);
        let mut sql = self.select.clone();
        let mut params = self.params.clone();
        match (&self.filter, last_seen) {
            (Some(filter), Some(last)) => {
                sql.push_str(&format!(" WHERE ({filter}) AND {key} > ?"));
                params.push(last.clone());
            }
            (Some(filter), None) => {
                sql.push_str(" WHERE ");
                sql.push_str(filter);
            }
            (None, Some(last)) => {
                sql.push_str(&format!(" WHERE {key} > ?"));
                params.push(last.clone());
            }
            (None, None) => {}
        }
        sql.push_str(&format!(" ORDER BY {key} ASC LIMIT {limit}"));
        (sql, params)
    }

    /// Build the total-count side query: same filter, no ordering, no
    /// limit/offset.
    pub fn build_count(&self) -> (String, Vec<Value>) {
        let mut inner = self.select.clone();
        if let Some(filter) = &self.filter {
            inner.push_str(" WHERE ");
            inner.push_str(filter);
        }
        (
            format!("SELECT COUNT(*) FROM ({inner}) AS rowbatch_count"),
            self.params.clone(),
        )
    }
}
