//! Scripted in-memory connection for engine tests.
//!
//! Replies are queued in the order the engine is expected to issue
//! statements; every call is recorded so tests can assert on the SQL and
//! bindings actually produced.

use rowbatch_core::{
    ColumnInfo, Connection, DriverError, DriverResult, Row, RowCursor, Value,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

/// One recorded statement execution.
#[derive(Debug, Clone)]
pub struct Call {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A scripted reply for the next call.
pub enum Reply {
    Rows(Vec<Row>),
    Affected(u64),
    Keys(Vec<Value>),
    Fail(DriverError),
}

#[derive(Default)]
pub struct MockConnection {
    replies: RefCell<VecDeque<Reply>>,
    calls: RefCell<Vec<Call>>,
    cursor_flags: RefCell<Vec<Rc<Cell<bool>>>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Reply) {
        self.replies.borrow_mut().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Release flags of every cursor handed out, in open order.
    pub fn cursor_released(&self) -> Vec<bool> {
        self.cursor_flags.borrow().iter().map(|f| f.get()).collect()
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.calls.borrow_mut().push(Call {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }

    fn next_reply(&self) -> Reply {
        self.replies
            .borrow_mut()
            .pop_front()
            .expect("mock connection ran out of scripted replies")
    }
}

impl Connection for MockConnection {
    type Cursor<'conn>
        = MockCursor
    where
        Self: 'conn;

    fn query(&self, sql: &str, params: &[Value]) -> DriverResult<Vec<Row>> {
        self.record(sql, params);
        match self.next_reply() {
            Reply::Rows(rows) => Ok(rows),
            Reply::Fail(e) => Err(e),
            _ => panic!("scripted reply for query() must be Rows or Fail"),
        }
    }

    fn execute(&self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        self.record(sql, params);
        match self.next_reply() {
            Reply::Affected(n) => Ok(n),
            Reply::Fail(e) => Err(e),
            _ => panic!("scripted reply for execute() must be Affected or Fail"),
        }
    }

    fn insert_returning_keys(&self, sql: &str, params: &[Value]) -> DriverResult<Vec<Value>> {
        self.record(sql, params);
        match self.next_reply() {
            Reply::Keys(keys) => Ok(keys),
            Reply::Fail(e) => Err(e),
            _ => panic!("scripted reply for insert_returning_keys() must be Keys or Fail"),
        }
    }

    fn open_cursor(&self, sql: &str, params: &[Value]) -> DriverResult<Self::Cursor<'_>> {
        self.record(sql, params);
        match self.next_reply() {
            Reply::Rows(rows) => {
                let released = Rc::new(Cell::new(false));
                self.cursor_flags.borrow_mut().push(Rc::clone(&released));
                Ok(MockCursor {
                    rows: rows.into_iter().collect(),
                    released,
                })
            }
            Reply::Fail(e) => Err(e),
            _ => panic!("scripted reply for open_cursor() must be Rows or Fail"),
        }
    }
}

pub struct MockCursor {
    rows: VecDeque<Row>,
    released: Rc<Cell<bool>>,
}

impl RowCursor for MockCursor {
    fn fetch_next(&mut self) -> DriverResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}

impl Drop for MockCursor {
    fn drop(&mut self) {
        self.released.set(true);
    }
}

/// Build rows with `id` (BigInt) and `name` (Text) columns for the half-open
/// id range `start..end`.
pub fn id_rows(start: i64, end: i64) -> Vec<Row> {
    let columns = Arc::new(ColumnInfo::new(vec!["id".into(), "name".into()]));
    (start..end)
        .map(|id| {
            Row::with_columns(
                Arc::clone(&columns),
                vec![Value::BigInt(id), Value::Text(format!("row-{id}"))],
            )
        })
        .collect()
}

/// A single-column COUNT(*) result row.
pub fn count_row(total: i64) -> Vec<Row> {
    vec![Row::new(vec!["COUNT(*)".into()], vec![Value::BigInt(total)])]
}

// ---- test entities -------------------------------------------------------

use rowbatch_core::{Entity, IdKind, IdStrategy, Result, TableSchema};

/// Database-assigned identity key, with timestamp columns.
#[derive(Debug, Default)]
pub struct User {
    pub id: Option<i64>,
    pub email: String,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl User {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            ..Self::default()
        }
    }
}

static USER_SCHEMA: TableSchema =
    TableSchema::new("users", "id", IdStrategy::DatabaseAssigned, &["email"])
        .timestamps("created_at", "updated_at");

impl Entity for User {
    fn schema() -> &'static TableSchema {
        &USER_SCHEMA
    }

    fn insert_values(&self) -> Vec<Value> {
        vec![Value::Text(self.email.clone())]
    }

    fn id_value(&self) -> Value {
        Value::from(self.id)
    }

    fn set_id(&mut self, id: Value) {
        self.id = id.as_i64();
    }

    fn set_created_at(&mut self, micros: i64) {
        self.created_at = Some(micros);
    }

    fn set_updated_at(&mut self, micros: i64) {
        self.updated_at = Some(micros);
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            email: row.get_named("email")?,
            created_at: row.get_named("created_at")?,
            updated_at: row.get_named("updated_at")?,
        })
    }
}

/// Client-generated time-ordered UUID key.
#[derive(Debug)]
pub struct Note {
    pub id: Option<[u8; 16]>,
    pub body: String,
}

impl Note {
    pub fn new(body: &str) -> Self {
        Self {
            id: None,
            body: body.to_string(),
        }
    }
}

static NOTE_SCHEMA: TableSchema = TableSchema::new(
    "notes",
    "id",
    IdStrategy::Generated(IdKind::TimeOrderedUuid),
    &["body"],
);

impl Entity for Note {
    fn schema() -> &'static TableSchema {
        &NOTE_SCHEMA
    }

    fn insert_values(&self) -> Vec<Value> {
        vec![Value::Text(self.body.clone())]
    }

    fn id_value(&self) -> Value {
        self.id.map_or(Value::Null, Value::Uuid)
    }

    fn set_id(&mut self, id: Value) {
        self.id = id.as_uuid();
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            body: row.get_named("body")?,
        })
    }
}

/// Caller-preassigned key.
#[derive(Debug)]
pub struct Tag {
    pub id: Option<i64>,
    pub label: String,
}

static TAG_SCHEMA: TableSchema =
    TableSchema::new("tags", "id", IdStrategy::Preassigned, &["label"]);

impl Entity for Tag {
    fn schema() -> &'static TableSchema {
        &TAG_SCHEMA
    }

    fn insert_values(&self) -> Vec<Value> {
        vec![Value::Text(self.label.clone())]
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
            label: row.get_named("label")?,
        })
    }
}
