//! Test modules for the executor crate.

pub mod append;
pub mod cursor;
pub mod session;

use crate::{Executor, ServerConfig, SessionContext};

/// Executor over a fresh in-memory engine with default settings.
pub(crate) fn create_test_executor() -> Executor {
    Executor::in_memory(ServerConfig::default())
}

/// Run a statement and assert it succeeded.
pub(crate) async fn exec_ok(ex: &Executor, ctx: &SessionContext, sql: &str) -> u64 {
    let response = ex.exec(ctx, sql, vec![], None).await.unwrap();
    assert!(
        response.status.success,
        "{} failed: {}",
        sql,
        response.status.reason
    );
    response.rows_affected
}
