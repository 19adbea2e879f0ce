//! Session tests: scoped values, overrides and teardown.

use veneer_core::{DisplayZone, TimeFormat, WireValue};

use super::{create_test_executor, exec_ok};
use crate::session::{SessionValue, TIME_FORMAT_KEY, TIME_ZONE_KEY};
use crate::{ServerConfig, SessionContext};

#[test]
fn test_typed_accessors() {
    let ctx = SessionContext::new(1);
    ctx.set("user", "SYS");
    ctx.set("fetch_size", 100_i64);
    ctx.set("verbose", true);
    assert_eq!(ctx.get_str("user").as_deref(), Some("SYS"));
    assert_eq!(ctx.get_i64("fetch_size"), Some(100));
    assert_eq!(ctx.get_bool("verbose"), Some(true));
    assert_eq!(ctx.get_i64("user"), None, "wrong type reads as absent");
    assert_eq!(ctx.remove("user"), Some(SessionValue::Str("SYS".into())));
    assert_eq!(ctx.get("user"), None);
}

#[test]
fn test_codec_overrides() {
    let ctx = SessionContext::new(1);
    let base = ServerConfig::default().codec_options();
    assert_eq!(ctx.codec_options(&base), base);

    ctx.set(TIME_FORMAT_KEY, "ms");
    ctx.set(TIME_ZONE_KEY, "+09:00");
    let opts = ctx.codec_options(&base);
    assert_eq!(opts.time_format, TimeFormat::Millis);
    assert!(matches!(opts.zone, DisplayZone::Fixed(_)));

    ctx.set(TIME_ZONE_KEY, "nowhere");
    assert_eq!(ctx.codec_options(&base).zone, DisplayZone::Utc);
}

#[tokio::test]
async fn test_session_ids_distinct() {
    let ex = create_test_executor();
    let a = ex.begin_session();
    let b = ex.begin_session();
    assert_ne!(a.id(), b.id());
    assert!(b.created_at() >= a.created_at());
}

#[tokio::test]
async fn test_teardown_releases_open_handles() {
    let ex = create_test_executor();
    {
        let setup = ex.begin_session();
        exec_ok(&ex, &setup, "create table t (v integer)").await;
        exec_ok(&ex, &setup, "create tag table tag (name varchar(8), time datetime, value double)").await;
    }

    let session = ex.begin_session();
    for _ in 0..3 {
        ex.query(&session, "select * from t", vec![], None).await.unwrap();
    }
    let appender = ex.append_open(&session, "tag", None, None, None).await.unwrap();
    ex.append(
        &session,
        appender.handle.as_deref().unwrap(),
        vec![
            WireValue::String("a".into()),
            WireValue::DateTime(1),
            WireValue::Float64(1.0),
        ],
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(ex.registry().len(), 4);

    let other = ex.begin_session();
    ex.query(&other, "select * from t", vec![], None).await.unwrap();

    drop(session);
    assert_eq!(ex.registry().len(), 1, "only the other session's handle remains");

    // Teardown closed the appender, which committed its buffered row
    let row = ex.query_row(&other, "select name from tag", vec![], None).await.unwrap();
    assert_eq!(row.values, vec![WireValue::String("a".into())]);
}

#[tokio::test]
async fn test_handle_not_visible_across_sessions() {
    let ex = create_test_executor();
    let a = ex.begin_session();
    let b = ex.begin_session();
    exec_ok(&ex, &a, "create table t (v integer)").await;
    let handle = ex
        .query(&a, "select * from t", vec![], None)
        .await
        .unwrap()
        .handle
        .unwrap();
    let r = ex.rows_next(&b, &handle, None).await.unwrap();
    assert_eq!(r.status.code.as_deref(), Some("HandleNotFound"));
    let r = ex.rows_close(&b, &handle, None).await.unwrap();
    assert_eq!(r.status.code.as_deref(), Some("HandleNotFound"));
    assert_eq!(ex.registry().len(), 1);
}

#[tokio::test]
async fn test_session_time_format_applies_to_params() {
    let ex = create_test_executor();
    let session = ex.begin_session();
    exec_ok(&ex, &session, "create table ev (ts datetime)").await;
    session.set(TIME_FORMAT_KEY, "s");
    let r = ex
        .exec(&session, "insert into ev values (?)", vec![WireValue::Int64(3)], None)
        .await
        .unwrap();
    assert!(r.status.success, "{}", r.status.reason);
    let row = ex.query_row(&session, "select ts from ev", vec![], None).await.unwrap();
    assert_eq!(row.values, vec![WireValue::DateTime(3_000_000_000)]);
}
