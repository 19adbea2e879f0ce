//! Cursor protocol tests: exec, query, rows_next, rows_close, query_row.

use veneer_core::{ColumnType, WireValue};

use super::{create_test_executor, exec_ok};
use crate::{Command, Error, Output};

const CREATE_T: &str = "create table t (name varchar(16), v integer)";

async fn seed(ex: &crate::Executor, ctx: &crate::SessionContext, n: i32) {
    exec_ok(ex, ctx, CREATE_T).await;
    for i in 0..n {
        let r = ex
            .exec(
                ctx,
                "insert into t values (?, ?)",
                vec![WireValue::String(format!("n{}", i)), WireValue::Int32(i)],
                None,
            )
            .await
            .unwrap();
        assert!(r.status.success, "{}", r.status.reason);
        assert_eq!(r.rows_affected, 1);
    }
}

// =============================================================================
// Exec
// =============================================================================

#[tokio::test]
async fn test_exec_reports_rows_affected() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    seed(&ex, &session, 5).await;
    let deleted = exec_ok(&ex, &session, "delete from t where v < 2").await;
    assert_eq!(deleted, 2);
    assert!(ex.registry().is_empty());
}

#[tokio::test]
async fn test_exec_engine_error_in_body() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    let r = ex.exec(&session, "select * from missing", vec![], None).await.unwrap();
    assert!(!r.status.success);
    assert_eq!(r.status.code.as_deref(), Some("Engine"));
    assert!(r.status.reason.contains("MISSING"));
}

#[tokio::test]
async fn test_param_count_mismatch() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_T).await;
    let r = ex
        .exec(&session, "insert into t values (?, ?)", vec![WireValue::Int32(1)], None)
        .await
        .unwrap();
    assert!(!r.status.success);
    assert_eq!(r.status.code.as_deref(), Some("ParamCountMismatch"));
    assert_eq!(r.status.reason, "params required 2, but got 1");
}

#[tokio::test]
async fn test_string_bound_to_int_param_is_type_mismatch() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, "create table w (v long)").await;
    let r = ex
        .exec(
            &session,
            "insert into w values (?)",
            vec![WireValue::String("abc".into())],
            None,
        )
        .await
        .unwrap();
    assert!(!r.status.success);
    assert_eq!(r.status.code.as_deref(), Some("TypeMismatch"));
    assert!(r.status.reason.contains("string"));
    assert!(r.status.reason.contains("int64"));
}

#[tokio::test]
async fn test_narrower_param_widens() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, "create table w (v long)").await;
    let r = ex
        .exec(&session, "insert into w values (?)", vec![WireValue::Int16(7)], None)
        .await
        .unwrap();
    assert!(r.status.success, "{}", r.status.reason);
    let row = ex.query_row(&session, "select v from w", vec![], None).await.unwrap();
    assert_eq!(row.values, vec![WireValue::Int64(7)]);
}

// =============================================================================
// Query / RowsNext / RowsClose
// =============================================================================

#[tokio::test]
async fn test_query_iterates_then_exhausts() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    seed(&ex, &session, 3).await;

    let q = ex
        .query(&session, "select * from t order by v", vec![], None)
        .await
        .unwrap();
    assert!(q.status.success);
    assert_eq!(q.columns.len(), 2);
    assert_eq!(q.columns[0].name, "NAME");
    assert_eq!(q.columns[1].column_type, ColumnType::Int32);
    let handle = q.handle.unwrap();
    assert_eq!(ex.registry().len(), 1);

    for i in 0..3 {
        let r = ex.rows_next(&session, &handle, None).await.unwrap();
        assert!(r.status.success);
        assert!(r.has_row);
        assert_eq!(
            r.values,
            vec![WireValue::String(format!("n{}", i)), WireValue::Int32(i)]
        );
    }
    for _ in 0..2 {
        let r = ex.rows_next(&session, &handle, None).await.unwrap();
        assert!(r.status.success, "exhausted is not an error");
        assert!(!r.has_row);
        assert!(r.values.is_empty());
    }

    let closed = ex.rows_close(&session, &handle, None).await.unwrap();
    assert!(closed.status.success);
    assert!(ex.registry().is_empty());
}

#[tokio::test]
async fn test_rows_close_twice_succeeds() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    seed(&ex, &session, 1).await;
    let handle = ex
        .query(&session, "select * from t", vec![], None)
        .await
        .unwrap()
        .handle
        .unwrap();
    assert!(ex.rows_close(&session, &handle, None).await.unwrap().status.success);
    assert!(ex.rows_close(&session, &handle, None).await.unwrap().status.success);

    let r = ex.rows_next(&session, &handle, None).await.unwrap();
    assert!(!r.status.success);
    assert_eq!(r.status.code.as_deref(), Some("HandleNotFound"));
}

#[tokio::test]
async fn test_never_issued_handle_not_found() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    let r = ex.rows_next(&session, "999999", None).await.unwrap();
    assert!(!r.status.success);
    assert_eq!(r.status.code.as_deref(), Some("HandleNotFound"));
    assert_eq!(r.status.reason, "handle '999999' not found");

    let c = ex.rows_close(&session, "999999", None).await.unwrap();
    assert_eq!(c.status.code.as_deref(), Some("HandleNotFound"));
}

#[tokio::test]
async fn test_malformed_handle_is_transport_fault() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    let err = ex.rows_next(&session, "not-a-handle", None).await.unwrap_err();
    assert!(matches!(err, Error::HandleInvalid { .. }));
    assert!(err.is_transport_fault());
}

#[tokio::test]
async fn test_query_on_non_select_returns_no_handle() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    let q = ex.query(&session, CREATE_T, vec![], None).await.unwrap();
    assert!(q.status.success);
    assert!(q.handle.is_none());
    assert!(ex.registry().is_empty());
}

#[tokio::test]
async fn test_query_with_params_and_limit() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    seed(&ex, &session, 10).await;
    let q = ex
        .query(
            &session,
            "select v from t where v >= ? order by v desc limit ?",
            vec![WireValue::Int32(5), WireValue::Int64(2)],
            None,
        )
        .await
        .unwrap();
    let handle = q.handle.unwrap();
    let first = ex.rows_next(&session, &handle, None).await.unwrap();
    let second = ex.rows_next(&session, &handle, None).await.unwrap();
    let third = ex.rows_next(&session, &handle, None).await.unwrap();
    assert_eq!(first.values, vec![WireValue::Int32(9)]);
    assert_eq!(second.values, vec![WireValue::Int32(8)]);
    assert!(!third.has_row);
}

// =============================================================================
// QueryRow
// =============================================================================

#[tokio::test]
async fn test_query_row_returns_first_row_without_handle() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    seed(&ex, &session, 3).await;
    let r = ex
        .query_row(&session, "select name from t where v = ?", vec![WireValue::Int32(2)], None)
        .await
        .unwrap();
    assert!(r.status.success);
    assert!(r.has_row);
    assert_eq!(r.values, vec![WireValue::String("n2".into())]);
    assert!(ex.registry().is_empty());
}

#[tokio::test]
async fn test_query_row_no_rows() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    seed(&ex, &session, 1).await;
    let r = ex
        .query_row(&session, "select * from t where v > 100", vec![], None)
        .await
        .unwrap();
    assert!(r.status.success);
    assert!(!r.has_row);
}

// =============================================================================
// Command dispatch
// =============================================================================

#[tokio::test]
async fn test_execute_dispatches_commands() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    seed(&ex, &session, 2).await;

    let out = ex.execute(&session, Command::Ping).await.unwrap();
    assert!(matches!(out, Output::Pong { .. }));

    let out = ex
        .execute(
            &session,
            Command::Query {
                sql: "select * from t".into(),
                params: vec![],
                timeout_ms: None,
            },
        )
        .await
        .unwrap();
    let handle = match out {
        Output::Query(q) => q.handle.unwrap(),
        other => panic!("Expected Query, got {:?}", other),
    };

    let out = ex
        .execute(
            &session,
            Command::RowsNext {
                handle: handle.clone(),
                timeout_ms: None,
            },
        )
        .await
        .unwrap();
    assert!(matches!(out, Output::Row(ref r) if r.has_row));

    let out = ex
        .execute(
            &session,
            Command::RowsClose {
                handle,
                timeout_ms: Some(1_000),
            },
        )
        .await
        .unwrap();
    assert!(matches!(out, Output::Ack(ref a) if a.status.success));
}

#[tokio::test]
async fn test_every_response_has_elapsed() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    let r = ex.exec(&session, CREATE_T, vec![], None).await.unwrap();
    assert_eq!(r.status.reason, "success");
    assert!(!r.status.elapsed.is_empty());
    let r = ex.exec(&session, "drop table nope", vec![], None).await.unwrap();
    assert!(!r.status.elapsed.is_empty());
}
