//! Raw driver behavior against an in-memory database.

use rowbatch_core::{
    Connection, ConstraintKind, DatabaseErrorKind, RowCursor, Value, classify,
};
use rowbatch_sqlite::{SqliteConnection, sqlite_version_number};

fn seeded() -> SqliteConnection {
    let conn = SqliteConnection::open_memory().expect("open");
    conn.execute_raw("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)")
        .expect("create table");
    conn
}

#[test]
fn bundled_library_supports_returning() {
    // RETURNING arrived in 3.35.0.
    assert!(sqlite_version_number() >= 3_035_000);
}

#[test]
fn execute_and_query_round_trip() {
    let conn = seeded();

    let affected = conn
        .execute(
            "INSERT INTO items (name) VALUES (?), (?)",
            &[Value::Text("a".into()), Value::Text("b".into())],
        )
        .expect("insert");
    assert_eq!(affected, 2);

    let rows = conn
        .query("SELECT id, name FROM items ORDER BY id", &[])
        .expect("select");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_named::<i64>("id").expect("id"), 1);
    assert_eq!(rows[1].get_named::<String>("name").expect("name"), "b");
}

#[test]
fn storage_classes_round_trip() {
    let conn = SqliteConnection::open_memory().expect("open");
    conn.execute_raw("CREATE TABLE vals (i INTEGER, f REAL, t TEXT, b BLOB, ts INTEGER, u BLOB)")
        .expect("create table");

    let uuid = [7u8; 16];
    conn.execute(
        "INSERT INTO vals (i, f, t, b, ts, u) VALUES (?, ?, ?, ?, ?, ?)",
        &[
            Value::BigInt(1 << 40),
            Value::Double(2.5),
            Value::Text("hi".into()),
            Value::Bytes(vec![1, 2, 3]),
            Value::Timestamp(1_700_000_000_000_000),
            Value::Uuid(uuid),
        ],
    )
    .expect("insert");

    let rows = conn.query("SELECT * FROM vals", &[]).expect("select");
    let row = &rows[0];
    assert_eq!(row.get_named::<i64>("i").expect("i"), 1 << 40);
    assert!((row.get_named::<f64>("f").expect("f") - 2.5).abs() < f64::EPSILON);
    assert_eq!(row.get_named::<String>("t").expect("t"), "hi");
    assert_eq!(row.get_named::<Vec<u8>>("b").expect("b"), vec![1, 2, 3]);
    // Timestamps come back as plain integers.
    assert_eq!(row.get_named::<i64>("ts").expect("ts"), 1_700_000_000_000_000);
    // A 16-byte blob reads back as a UUID.
    assert_eq!(row.get_named::<[u8; 16]>("u").expect("u"), uuid);
}

#[test]
fn null_round_trip() {
    let conn = seeded();
    conn.execute(
        "INSERT INTO items (id, name) VALUES (?, ?)",
        &[Value::Null, Value::Text("x".into())],
    )
    .expect("insert");

    let rows = conn
        .query("SELECT NULL AS nothing FROM items", &[])
        .expect("select");
    assert!(rows[0].get_named::<Option<i64>>("nothing").expect("nothing").is_none());
}

#[test]
fn unique_violation_carries_an_integrity_sqlstate() {
    let conn = seeded();
    conn.execute("INSERT INTO items (name) VALUES (?)", &[Value::Text("a".into())])
        .expect("insert");

    let err = conn
        .execute("INSERT INTO items (name) VALUES (?)", &[Value::Text("a".into())])
        .expect_err("duplicate must fail");

    assert_eq!(err.sqlstate.as_deref(), Some("23505"));
    assert_eq!(err.vendor_code, Some(2067));
    assert!(err.sql.is_some());

    let classified = classify(err);
    assert_eq!(
        classified.kind,
        DatabaseErrorKind::Constraint(ConstraintKind::Unique)
    );
}

#[test]
fn not_null_violation_carries_an_integrity_sqlstate() {
    let conn = seeded();
    let err = conn
        .execute("INSERT INTO items (name) VALUES (?)", &[Value::Null])
        .expect_err("null name must fail");
    assert_eq!(err.sqlstate.as_deref(), Some("23502"));
    assert_eq!(
        classify(err).kind,
        DatabaseErrorKind::Constraint(ConstraintKind::NotNull)
    );
}

#[test]
fn malformed_sql_is_a_syntax_error() {
    let conn = seeded();
    let err = conn.query("SELEKT wat", &[]).expect_err("must fail");
    assert_eq!(err.sqlstate.as_deref(), Some("42000"));
    assert_eq!(classify(err).kind, DatabaseErrorKind::Syntax);
}

#[test]
fn multi_row_insert_reports_consecutive_keys() {
    let conn = seeded();
    let keys = conn
        .insert_returning_keys(
            "INSERT INTO items (name) VALUES (?), (?), (?)",
            &[
                Value::Text("a".into()),
                Value::Text("b".into()),
                Value::Text("c".into()),
            ],
        )
        .expect("insert");
    assert_eq!(
        keys,
        vec![Value::BigInt(1), Value::BigInt(2), Value::BigInt(3)]
    );

    let keys = conn
        .insert_returning_keys("INSERT INTO items (name) VALUES (?)", &[Value::Text("d".into())])
        .expect("insert");
    assert_eq!(keys, vec![Value::BigInt(4)]);
}

#[test]
fn cursor_streams_rows_and_finalizes() {
    let conn = seeded();
    for name in ["a", "b", "c"] {
        conn.execute("INSERT INTO items (name) VALUES (?)", &[Value::Text(name.into())])
            .expect("insert");
    }

    {
        let mut cursor = conn
            .open_cursor("SELECT name FROM items ORDER BY id", &[])
            .expect("open cursor");
        let mut names = Vec::new();
        while let Some(row) = cursor.fetch_next().expect("fetch") {
            names.push(row.get_named::<String>("name").expect("name"));
        }
        assert_eq!(names, vec!["a", "b", "c"]);
        // Exhausted cursors keep answering None.
        assert!(cursor.fetch_next().expect("fetch").is_none());
    }

    // The cursor released the connection lock; statements run again.
    let rows = conn.query("SELECT COUNT(*) FROM items", &[]).expect("count");
    assert_eq!(rows[0].get_as::<i64>(0).expect("count"), 3);
}

#[test]
fn a_statement_while_a_cursor_is_open_fails_fast() {
    let conn = seeded();
    for name in ["a", "b"] {
        conn.execute("INSERT INTO items (name) VALUES (?)", &[Value::Text(name.into())])
            .expect("insert");
    }

    let mut cursor = conn
        .open_cursor("SELECT name FROM items ORDER BY id", &[])
        .expect("open cursor");
    assert!(cursor.fetch_next().expect("fetch").is_some());

    // The cursor holds the connection; a second statement must error out
    // instead of deadlocking the thread.
    let err = conn
        .query("SELECT COUNT(*) FROM items", &[])
        .expect_err("busy connection must fail");
    assert!(err.message.contains("busy"));
    assert_eq!(err.sql.as_deref(), Some("SELECT COUNT(*) FROM items"));

    // The cursor itself is unaffected and the lock frees on drop.
    assert!(cursor.fetch_next().expect("fetch").is_some());
    drop(cursor);
    let rows = conn.query("SELECT COUNT(*) FROM items", &[]).expect("count");
    assert_eq!(rows[0].get_as::<i64>(0).expect("count"), 2);
}

#[test]
fn returning_clause_yields_rows_from_query() {
    let conn = seeded();
    let rows = conn
        .query(
            "INSERT INTO items (name) VALUES (?), (?) RETURNING id",
            &[Value::Text("a".into()), Value::Text("b".into())],
        )
        .expect("insert returning");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_as::<i64>(0).expect("id"), 1);
    assert_eq!(rows[1].get_as::<i64>(0).expect("id"), 2);
}
