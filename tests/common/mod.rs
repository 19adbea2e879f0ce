//! Shared helpers for the scenario tests.

#![allow(dead_code)]

use veneer::{Executor, ServerConfig, SessionContext};

pub const CREATE_TAG: &str =
    "create tag table tag (name varchar(20) primary key, time datetime basetime, value double summarized)";

/// Executor over a fresh in-memory engine.
pub fn create_executor() -> Executor {
    Executor::in_memory(ServerConfig::default())
}

/// Run a statement and assert it succeeded.
pub async fn exec_ok(executor: &Executor, ctx: &SessionContext, sql: &str) -> u64 {
    let r = executor.exec(ctx, sql, vec![], None).await.unwrap();
    assert!(r.status.success, "{} failed: {}", sql, r.status.reason);
    r.rows_affected
}
