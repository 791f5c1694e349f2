//! Batch insertion against a scripted connection.

mod common;

use common::{MockConnection, Note, Reply, Tag, User};
use rowbatch_core::{
    AnsiDialect, ConstraintKind, DatabaseErrorKind, DriverError, Error, Row, Value,
};
use rowbatch_engine::save_all;

fn tags(n: usize) -> Vec<Tag> {
    (0..n)
        .map(|i| Tag {
            id: Some(i as i64 + 1),
            label: format!("tag-{i}"),
        })
        .collect()
}

fn id_result_rows(ids: impl IntoIterator<Item = i64>) -> Vec<Row> {
    ids.into_iter()
        .map(|id| Row::new(vec!["id".into()], vec![Value::BigInt(id)]))
        .collect()
}

#[test]
fn splits_into_ceiling_many_statements() {
    let conn = MockConnection::new();
    conn.push(Reply::Affected(100));
    conn.push(Reply::Affected(50));

    let mut entities = tags(150);
    let written = save_all(&conn, &AnsiDialect::with_returning(), &mut entities, Some(100))
        .expect("save_all");

    assert_eq!(written, 150);
    assert_eq!(conn.call_count(), 2);
    let calls = conn.calls();
    // 100 rows of 2 columns each, then 50.
    assert_eq!(calls[0].params.len(), 200);
    assert_eq!(calls[1].params.len(), 100);
}

#[test]
fn oversize_batch_request_is_clamped() {
    let conn = MockConnection::new();
    conn.push(Reply::Affected(1000));
    conn.push(Reply::Affected(500));

    let mut entities = tags(1500);
    let written = save_all(&conn, &AnsiDialect::with_returning(), &mut entities, Some(2000))
        .expect("save_all");

    assert_eq!(written, 1500);
    assert_eq!(conn.call_count(), 2);
}

#[test]
fn empty_input_issues_no_statements() {
    let conn = MockConnection::new();
    let mut entities: Vec<Tag> = vec![];
    let written =
        save_all(&conn, &AnsiDialect::with_returning(), &mut entities, None).expect("save_all");
    assert_eq!(written, 0);
    assert_eq!(conn.call_count(), 0);
}

#[test]
fn preassigned_entity_without_id_fails_before_any_statement() {
    let conn = MockConnection::new();
    let mut entities = vec![
        Tag {
            id: Some(1),
            label: "ok".into(),
        },
        Tag {
            id: None,
            label: "missing".into(),
        },
    ];

    let err = save_all(&conn, &AnsiDialect::with_returning(), &mut entities, None)
        .expect_err("must fail");
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(conn.call_count(), 0);
}

#[test]
fn generated_ids_fill_nulls_and_preserve_existing() {
    let conn = MockConnection::new();
    conn.push(Reply::Affected(3));

    let preset = [9u8; 16];
    let mut notes = vec![Note::new("a"), Note::new("b"), Note::new("c")];
    notes[1].id = Some(preset);

    save_all(&conn, &AnsiDialect::with_returning(), &mut notes, None).expect("save_all");

    let ids: Vec<[u8; 16]> = notes.iter().map(|n| n.id.expect("id set")).collect();
    assert_eq!(ids[1], preset);
    assert_ne!(ids[0], ids[2]);
    assert!(ids.iter().all(|id| *id != [0u8; 16]));

    // The ids on the entities are the ids that were bound.
    let call = &conn.calls()[0];
    assert_eq!(call.params[0], Value::Uuid(ids[0]));
    assert_eq!(call.params[2], Value::Uuid(preset));
}

#[test]
fn returning_branch_writes_keys_back_in_order() {
    let conn = MockConnection::new();
    conn.push(Reply::Rows(id_result_rows([41, 42, 43])));

    let mut users = vec![User::new("a@x"), User::new("b@x"), User::new("c@x")];
    let written = save_all(&conn, &AnsiDialect::with_returning(), &mut users, None)
        .expect("save_all");

    assert_eq!(written, 3);
    let call = &conn.calls()[0];
    assert!(call.sql.starts_with("INSERT INTO \"users\""));
    assert!(call.sql.ends_with(" RETURNING \"id\""));
    assert!(!call.sql.contains("(\"id\""));
    assert_eq!(
        users.iter().map(|u| u.id).collect::<Vec<_>>(),
        vec![Some(41), Some(42), Some(43)]
    );
}

#[test]
fn generated_keys_branch_writes_keys_back_in_order() {
    let conn = MockConnection::new();
    conn.push(Reply::Keys(vec![Value::BigInt(7), Value::BigInt(8)]));

    let mut users = vec![User::new("a@x"), User::new("b@x")];
    save_all(&conn, &AnsiDialect::without_returning(), &mut users, None).expect("save_all");

    let call = &conn.calls()[0];
    assert!(!call.sql.contains("RETURNING"));
    assert_eq!(users[0].id, Some(7));
    assert_eq!(users[1].id, Some(8));
}

#[test]
fn key_count_mismatch_is_a_database_error() {
    let conn = MockConnection::new();
    conn.push(Reply::Keys(vec![Value::BigInt(7)]));

    let mut users = vec![User::new("a@x"), User::new("b@x")];
    let err = save_all(&conn, &AnsiDialect::without_returning(), &mut users, None)
        .expect_err("must fail");
    match err {
        Error::Database(db) => {
            assert_eq!(db.kind, DatabaseErrorKind::Unknown);
            assert!(db.sql.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn whole_batch_shares_one_timestamp_instant() {
    let conn = MockConnection::new();
    conn.push(Reply::Keys(vec![Value::BigInt(1), Value::BigInt(2)]));

    let mut users = vec![User::new("a@x"), User::new("b@x")];
    save_all(&conn, &AnsiDialect::without_returning(), &mut users, None).expect("save_all");

    let created = users[0].created_at.expect("stamped");
    assert_eq!(users[0].updated_at, Some(created));
    assert_eq!(users[1].created_at, Some(created));
    assert_eq!(users[1].updated_at, Some(created));

    // Bound parameters carry the very same instant.
    let call = &conn.calls()[0];
    assert_eq!(call.params[1], Value::Timestamp(created));
    assert_eq!(call.params[2], Value::Timestamp(created));
    assert_eq!(call.params[4], Value::Timestamp(created));
    assert_eq!(call.params[5], Value::Timestamp(created));
}

#[test]
fn unique_violation_surfaces_classified_and_not_retryable() {
    let conn = MockConnection::new();
    conn.push(Reply::Fail(
        DriverError::new("UNIQUE constraint failed: tags.id")
            .sqlstate("23505")
            .vendor_code(2067),
    ));

    let mut entities = tags(1);
    let err = save_all(&conn, &AnsiDialect::with_returning(), &mut entities, None)
        .expect_err("must fail");
    assert!(!err.is_retryable());
    match err {
        Error::Database(db) => assert_eq!(
            db.kind,
            DatabaseErrorKind::Constraint(ConstraintKind::Unique)
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn serialization_failure_surfaces_retryable() {
    let conn = MockConnection::new();
    conn.push(Reply::Fail(
        DriverError::new("could not serialize access").sqlstate("40001"),
    ));

    let mut entities = tags(1);
    let err = save_all(&conn, &AnsiDialect::with_returning(), &mut entities, None)
        .expect_err("must fail");
    assert!(err.is_retryable());
    match err {
        Error::Database(db) => assert_eq!(db.kind, DatabaseErrorKind::Rollback),
        other => panic!("unexpected error: {other:?}"),
    }
}
