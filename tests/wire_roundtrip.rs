//! JSON-lines Transport Round Trips
//!
//! A real server on an ephemeral port, driven by the async client. Each
//! client connection is its own session.

mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{create_executor, CREATE_TAG};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use veneer::wire::envelope::{decode_request, encode_response, Response};
use veneer::wire::{serve, Client, ClientOptions, WireError};
use veneer::{Executor, WireValue};

async fn start_server() -> (SocketAddr, Executor) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let executor = create_executor();
    let served = executor.clone();
    tokio::spawn(async move {
        let _ = serve(listener, served).await;
    });
    (addr, executor)
}

#[tokio::test]
async fn ping() {
    let (addr, _executor) = start_server().await;
    let mut client = Client::connect(addr).await.unwrap();
    let version = client.ping().await.unwrap();
    assert!(!version.is_empty());
}

#[tokio::test]
async fn query_rows_over_tcp() {
    let (addr, _executor) = start_server().await;
    let mut client = Client::connect(addr).await.unwrap();

    client.exec("create table t (name varchar(16), v integer)", vec![]).await.unwrap();
    for (i, name) in ["a", "b", "c"].iter().enumerate() {
        let n = client
            .exec(
                "insert into t values (?, ?)",
                vec![WireValue::String(name.to_string()), WireValue::Int32(i as i32)],
            )
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    let mut rows = client.query("select name, v from t order by v", vec![]).await.unwrap();
    assert_eq!(rows.columns().len(), 2);
    assert!(rows.handle().is_some());
    let mut names = Vec::new();
    while let Some(row) = rows.next().await.unwrap() {
        names.push(row[0].as_str().unwrap().to_string());
    }
    rows.close().await.unwrap();
    assert_eq!(names, vec!["a", "b", "c"]);

    let row = client
        .query_row("select v from t where name = ?", vec![WireValue::String("b".into())])
        .await
        .unwrap();
    assert_eq!(row, Some(vec![WireValue::Int32(1)]));
}

#[tokio::test]
async fn special_values_survive_the_json_envelope() {
    let (addr, _executor) = start_server().await;
    let mut client = Client::connect(addr).await.unwrap();
    client.exec("create table s (f double, b binary, ip ipv6)", vec![]).await.unwrap();

    let row = vec![
        WireValue::Float64(f64::NEG_INFINITY),
        WireValue::Binary(vec![0, 159, 146, 150]),
        WireValue::IPv6([0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]),
    ];
    client.exec("insert into s values (?, ?, ?)", row.clone()).await.unwrap();
    let got = client.query_row("select * from s", vec![]).await.unwrap();
    assert_eq!(got, Some(row));
}

#[tokio::test]
async fn failures_carry_codes() {
    let (addr, _executor) = start_server().await;
    let mut client = Client::connect(addr).await.unwrap();
    client.exec("create table t (v long)", vec![]).await.unwrap();

    let err = client
        .exec("insert into t values (?)", vec![WireValue::String("x".into())])
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("TypeMismatch"));

    let err = client.exec("insert into t values (?)", vec![]).await.unwrap_err();
    assert_eq!(err.code(), Some("ParamCountMismatch"));
    assert!(err.to_string().contains("params required 1, but got 0"));

    let err = client.exec("selec nothing", vec![]).await.unwrap_err();
    assert_eq!(err.code(), Some("Engine"));
}

#[tokio::test]
async fn appender_over_tcp() {
    let (addr, _executor) = start_server().await;
    let mut client = Client::connect(addr).await.unwrap();
    client.exec(CREATE_TAG, vec![]).await.unwrap();

    let appender = client.append_open("tag", None).await.unwrap();
    assert_eq!(appender.table, "TAG");
    for i in 0..100i64 {
        let r = client
            .append(
                &appender,
                vec![
                    WireValue::String(format!("s{}", i % 4)),
                    WireValue::DateTime(i * 1_000),
                    WireValue::Float64(i as f64),
                ],
            )
            .await
            .unwrap();
        assert!(r.status.success, "{}", r.status.reason);
    }
    let r = client.append(&appender, vec![WireValue::Int16(1)]).await.unwrap();
    assert!(!r.status.success);
    assert_eq!((r.success_count, r.fail_count), (100, 1));

    client.append_flush(&appender).await.unwrap();
    assert_eq!(client.append_close(&appender).await.unwrap(), (100, 1));
}

#[tokio::test]
async fn handles_are_private_to_their_connection() {
    let (addr, _executor) = start_server().await;
    let mut owner = Client::connect(addr).await.unwrap();
    let mut other = Client::connect(addr).await.unwrap();
    owner.exec("create table t (v integer)", vec![]).await.unwrap();

    let rows = owner.query("select v from t", vec![]).await.unwrap();
    let handle = rows.handle().unwrap().to_string();
    drop(rows);

    let result = other
        .call(veneer::Command::RowsNext {
            handle: handle.clone(),
            timeout_ms: None,
        })
        .await
        .unwrap();
    assert_eq!(result.status().unwrap().code.as_deref(), Some("HandleNotFound"));
}

#[tokio::test]
async fn disconnect_releases_session_handles() {
    let (addr, executor) = start_server().await;
    {
        let mut client = Client::connect(addr).await.unwrap();
        client.exec("create table t (v integer)", vec![]).await.unwrap();
        for _ in 0..3 {
            let rows = client.query("select v from t", vec![]).await.unwrap();
            drop(rows);
        }
        assert_eq!(executor.registry().len(), 3);
    }

    for _ in 0..100 {
        if executor.registry().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(executor.registry().is_empty());
}

#[tokio::test]
async fn malformed_line_gets_a_fault_and_the_connection_survives() {
    let (addr, _executor) = start_server().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    write.write_all(b"{\"id\":\"7\",\"command\":{\"Nope\":{}}}\n").await.unwrap();
    let reply: serde_json::Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["id"], "7");
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["error"]["code"], "InvalidRequest");

    write.write_all(b"{\"id\":\"8\",\"command\":\"Ping\"}\n").await.unwrap();
    let reply: serde_json::Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["ok"], true);
}

#[tokio::test]
async fn closed_server_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });
    let mut client = Client::connect(addr).await.unwrap();
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, WireError::Closed | WireError::Io(_)));
}

/// Serves one connection against a real executor, recording each command's
/// name and `timeout_ms`.
async fn start_recording_server() -> (SocketAddr, Arc<Mutex<Vec<(String, Option<u64>)>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    tokio::spawn(async move {
        let executor = create_executor();
        let session = executor.begin_session();
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        while let Some(line) = lines.next_line().await.unwrap() {
            let request = decode_request(&line).unwrap();
            let name = request.command.name().to_string();
            let body = serde_json::to_value(&request.command).unwrap();
            let timeout = body
                .get(name.as_str())
                .and_then(|b| b.get("timeout_ms"))
                .and_then(|t| t.as_u64());
            recorded.lock().unwrap().push((name, timeout));
            let output = executor.execute(&session, request.command).await.unwrap();
            let mut reply = encode_response(&Response::success(&request.id, output)).unwrap();
            reply.push('\n');
            write.write_all(reply.as_bytes()).await.unwrap();
        }
    });
    (addr, seen)
}

#[tokio::test]
async fn client_deadlines_are_sent_with_every_call() {
    let (addr, seen) = start_recording_server().await;
    let options = ClientOptions::default()
        .query_timeout(Duration::from_millis(700))
        .append_timeout(Duration::from_millis(300))
        .close_timeout(Duration::from_millis(90));
    let mut client = Client::connect_with(addr, options).await.unwrap();

    client.exec(CREATE_TAG, vec![]).await.unwrap();
    let appender = client.append_open("tag", None).await.unwrap();
    client
        .append(
            &appender,
            vec![
                WireValue::String("a".into()),
                WireValue::DateTime(1_000),
                WireValue::Float64(1.0),
            ],
        )
        .await
        .unwrap();
    client.append_flush(&appender).await.unwrap();
    client.append_close(&appender).await.unwrap();

    let mut rows = client.query("select value from tag", vec![]).await.unwrap();
    assert_eq!(rows.next().await.unwrap(), Some(vec![WireValue::Float64(1.0)]));
    rows.close().await.unwrap();
    client.query_row("select value from tag", vec![]).await.unwrap();

    client.set_options(ClientOptions::default());
    client.exec("delete from tag", vec![]).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    let expected: Vec<(String, Option<u64>)> = [
        ("Exec", Some(700)),
        ("AppendOpen", Some(300)),
        ("Append", Some(300)),
        ("AppendFlush", Some(300)),
        ("AppendClose", Some(90)),
        ("Query", Some(700)),
        ("RowsNext", Some(700)),
        ("RowsClose", Some(90)),
        ("QueryRow", Some(700)),
        ("Exec", None),
    ]
    .into_iter()
    .map(|(name, t)| (name.to_string(), t))
    .collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn reply_to_an_abandoned_call_is_skipped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        // Hold the first reply until the second request arrives
        let first = decode_request(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second = decode_request(&lines.next_line().await.unwrap().unwrap()).unwrap();
        for (id, version) in [(first.id, "stale"), (second.id, "fresh")] {
            let output = veneer::Output::Pong {
                version: version.to_string(),
            };
            let mut reply = encode_response(&Response::success(&id, output)).unwrap();
            reply.push('\n');
            write.write_all(reply.as_bytes()).await.unwrap();
        }
    });

    let mut client = Client::connect(addr).await.unwrap();
    let abandoned = tokio::time::timeout(Duration::from_millis(50), client.ping()).await;
    assert!(abandoned.is_err());
    assert_eq!(client.ping().await.unwrap(), "fresh");
}

#[tokio::test]
async fn reply_with_a_future_id_is_a_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        lines.next_line().await.unwrap();
        let output = veneer::Output::Pong {
            version: "x".to_string(),
        };
        let mut reply = encode_response(&Response::success("42", output)).unwrap();
        reply.push('\n');
        write.write_all(reply.as_bytes()).await.unwrap();
        // Keep the connection open until the client gives up
        let _ = lines.next_line().await;
    });

    let mut client = Client::connect(addr).await.unwrap();
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, WireError::Protocol(_)));
}
