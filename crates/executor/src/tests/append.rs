//! Appender protocol tests.

use tokio::sync::mpsc;
use veneer_core::{TableKind, TimeFormat, WireValue};

use super::{create_test_executor, exec_ok};
use crate::{Executor, ServerConfig, SessionContext};

const CREATE_TAG: &str = "create tag table tag (name varchar(20) primary key, time datetime basetime, value double summarized)";
const CREATE_LOG: &str = "create log table lg (msg varchar(32), level integer)";

fn tag_row(name: &str, ns: i64, value: f64) -> Vec<WireValue> {
    vec![
        WireValue::String(name.into()),
        WireValue::DateTime(ns),
        WireValue::Float64(value),
    ]
}

async fn open(ex: &Executor, ctx: &SessionContext, table: &str, threshold: Option<u32>) -> String {
    let r = ex.append_open(ctx, table, threshold, None, None).await.unwrap();
    assert!(r.status.success, "{}", r.status.reason);
    r.handle.unwrap()
}

// =============================================================================
// Open
// =============================================================================

#[tokio::test]
async fn test_open_describes_tag_table() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let r = ex.append_open(&session, "tag", None, None, None).await.unwrap();
    assert!(r.status.success);
    assert_eq!(r.table, "TAG");
    assert_eq!(r.kind, Some(TableKind::Tag));
    let names: Vec<_> = r.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["NAME", "TIME", "VALUE"]);
}

#[tokio::test]
async fn test_open_hides_log_arrival_column() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_LOG).await;
    let r = ex.append_open(&session, "LG", None, None, None).await.unwrap();
    assert_eq!(r.kind, Some(TableKind::Log));
    let names: Vec<_> = r.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["MSG", "LEVEL"]);
}

#[tokio::test]
async fn test_open_missing_table() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    let r = ex.append_open(&session, "nope", None, None, None).await.unwrap();
    assert!(!r.status.success);
    assert_eq!(r.status.code.as_deref(), Some("TableNotFound"));
    assert!(r.handle.is_none());
    assert!(ex.registry().is_empty());
}

#[tokio::test]
async fn test_open_lookup_table_not_appendable() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, "create lookup table lk (k integer)").await;
    let r = ex.append_open(&session, "lk", None, None, None).await.unwrap();
    assert_eq!(r.status.code.as_deref(), Some("NotAppendable"));
    assert!(r.status.reason.contains("LK"));
}

// =============================================================================
// Append / Close
// =============================================================================

#[tokio::test]
async fn test_counts_and_close() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let handle = open(&ex, &session, "tag", None).await;

    let ok = ex.append(&session, &handle, tag_row("a", 1, 1.0), None, None).await.unwrap();
    assert!(ok.status.success);
    assert_eq!((ok.success_count, ok.fail_count), (1, 0));

    let bad = ex
        .append(&session, &handle, vec![WireValue::String("short".into())], None, None)
        .await
        .unwrap();
    assert!(!bad.status.success);
    assert_eq!(bad.status.code.as_deref(), Some("InvalidInput"));
    assert!(bad.status.reason.contains("value count 1"));
    assert_eq!((bad.success_count, bad.fail_count), (1, 1));

    let closed = ex.append_close(&session, &handle, None).await.unwrap();
    assert!(closed.status.success);
    assert_eq!((closed.success_count, closed.fail_count), (1, 1));

    let again = ex.append_close(&session, &handle, None).await.unwrap();
    assert!(again.status.success);
    assert_eq!((again.success_count, again.fail_count), (1, 1));

    let row = ex.query_row(&session, "select value from tag", vec![], None).await.unwrap();
    assert_eq!(row.values, vec![WireValue::Float64(1.0)]);
}

#[tokio::test]
async fn test_flush_commits_and_is_safe_when_empty() {
    let mut config = ServerConfig::default();
    config.engine.append_batch_size = 1000;
    let ex = Executor::in_memory(config);
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let handle = open(&ex, &session, "tag", None).await;

    assert!(ex.append_flush(&session, &handle, None).await.unwrap().status.success);
    ex.append(&session, &handle, tag_row("a", 1, 1.0), None, None).await.unwrap();
    let count = ex.query_row(&session, "select * from tag", vec![], None).await.unwrap();
    assert!(!count.has_row, "buffered rows are not visible before flush");

    assert!(ex.append_flush(&session, &handle, None).await.unwrap().status.success);
    let count = ex.query_row(&session, "select * from tag", vec![], None).await.unwrap();
    assert!(count.has_row);
}

#[tokio::test]
async fn test_threshold_fails_fast() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let handle = open(&ex, &session, "tag", Some(2)).await;

    let bad = vec![WireValue::Int64(1)];
    for _ in 0..2 {
        let r = ex.append(&session, &handle, bad.clone(), None, None).await.unwrap();
        assert_eq!(r.status.code.as_deref(), Some("InvalidInput"));
    }
    // A valid row is now rejected without reaching the engine
    let r = ex.append(&session, &handle, tag_row("a", 1, 1.0), None, None).await.unwrap();
    assert_eq!(r.status.code.as_deref(), Some("AppendAborted"));
    assert_eq!((r.success_count, r.fail_count), (0, 3));

    let closed = ex.append_close(&session, &handle, None).await.unwrap();
    assert_eq!((closed.success_count, closed.fail_count), (0, 3));
}

#[tokio::test]
async fn test_success_resets_failure_run() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let handle = open(&ex, &session, "tag", Some(2)).await;

    let bad = vec![WireValue::Int64(1)];
    ex.append(&session, &handle, bad.clone(), None, None).await.unwrap();
    ex.append(&session, &handle, tag_row("a", 1, 1.0), None, None).await.unwrap();
    ex.append(&session, &handle, bad.clone(), None, None).await.unwrap();
    let r = ex.append(&session, &handle, tag_row("a", 2, 2.0), None, None).await.unwrap();
    assert!(r.status.success);
    assert_eq!((r.success_count, r.fail_count), (2, 2));
}

#[tokio::test]
async fn test_explicit_timestamp_on_tag_table() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let r = ex
        .append_open(&session, "tag", None, Some(TimeFormat::Seconds), None)
        .await
        .unwrap();
    let handle = r.handle.unwrap();

    let r = ex
        .append(
            &session,
            &handle,
            vec![WireValue::String("a".into()), WireValue::Float64(3.5)],
            Some(WireValue::Int64(60)),
            None,
        )
        .await
        .unwrap();
    assert!(r.status.success, "{}", r.status.reason);
    ex.append_close(&session, &handle, None).await.unwrap();

    let row = ex.query_row(&session, "select time from tag", vec![], None).await.unwrap();
    assert_eq!(row.values, vec![WireValue::DateTime(60_000_000_000)]);
}

#[tokio::test]
async fn test_pattern_timestamp_in_row() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let handle = open(&ex, &session, "tag", None).await;
    let r = ex
        .append(
            &session,
            &handle,
            vec![
                WireValue::String("a".into()),
                WireValue::String("1970-01-01 00:00:02".into()),
                WireValue::Float64(1.0),
            ],
            None,
            None,
        )
        .await
        .unwrap();
    assert!(r.status.success, "{}", r.status.reason);
    ex.append_close(&session, &handle, None).await.unwrap();
    let row = ex.query_row(&session, "select time from tag", vec![], None).await.unwrap();
    assert_eq!(row.values, vec![WireValue::DateTime(2_000_000_000)]);
}

#[tokio::test]
async fn test_default_tag_name_fills_name_and_time() {
    let mut config = ServerConfig::default();
    config.append.default_tag_name = Some("dflt".into());
    let ex = Executor::in_memory(config);
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let handle = open(&ex, &session, "tag", None).await;
    let r = ex
        .append(&session, &handle, vec![WireValue::Float64(9.0)], None, None)
        .await
        .unwrap();
    assert!(r.status.success, "{}", r.status.reason);
    ex.append_close(&session, &handle, None).await.unwrap();
    let row = ex.query_row(&session, "select name from tag", vec![], None).await.unwrap();
    assert_eq!(row.values, vec![WireValue::String("dflt".into())]);
}

#[tokio::test]
async fn test_log_table_with_explicit_arrival() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_LOG).await;
    let r = ex
        .append_open(&session, "lg", None, Some(TimeFormat::Millis), None)
        .await
        .unwrap();
    let handle = r.handle.unwrap();
    let r = ex
        .append(
            &session,
            &handle,
            vec![WireValue::String("boot".into()), WireValue::Int32(1)],
            Some(WireValue::Int64(5)),
            None,
        )
        .await
        .unwrap();
    assert!(r.status.success, "{}", r.status.reason);
    ex.append_close(&session, &handle, None).await.unwrap();
    let row = ex
        .query_row(&session, "select _arrival_time, msg from lg", vec![], None)
        .await
        .unwrap();
    assert_eq!(
        row.values,
        vec![WireValue::DateTime(5_000_000), WireValue::String("boot".into())]
    );
}

#[tokio::test]
async fn test_wrong_handle_kind_is_invalid() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;
    let handle = open(&ex, &session, "tag", None).await;
    let err = ex.rows_next(&session, &handle, None).await.unwrap_err();
    assert!(matches!(err, crate::Error::HandleInvalid { .. }));
}

// =============================================================================
// Streams
// =============================================================================

#[tokio::test]
async fn test_append_stream() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, CREATE_TAG).await;

    let (tx, rx) = mpsc::channel(16);
    let producer = tokio::spawn(async move {
        for i in 0..100 {
            tx.send(tag_row("s", i, i as f64)).await.unwrap();
        }
        tx.send(vec![WireValue::Null]).await.unwrap();
    });
    let r = ex.append_stream(&session, "tag", None, rx).await.unwrap();
    producer.await.unwrap();
    assert!(r.status.success);
    assert_eq!((r.success_count, r.fail_count), (100, 1));
    assert!(ex.registry().is_empty());
}

#[tokio::test]
async fn test_append_stream_missing_table() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    let (_tx, rx) = mpsc::channel(1);
    let r = ex.append_stream(&session, "nope", None, rx).await.unwrap();
    assert_eq!(r.status.code.as_deref(), Some("TableNotFound"));
}
