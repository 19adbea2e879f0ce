//! Session context
//!
//! A session is one client's identity across independent RPC calls. It
//! owns the handles created under it and carries session-scoped values
//! such as a preferred time format.
//!
//! # Usage
//!
//! ```ignore
//! let session = executor.begin_session();
//! let out = executor.query(&session, "select * from t", vec![], None).await?;
//! // ... rows_next / rows_close ...
//! drop(session); // releases every handle still open
//! ```

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use veneer_core::{CodecOptions, DisplayZone, TimeFormat};

use crate::registry::Registry;

/// Session identifier.
pub type SessionId = u64;

/// Session value key overriding the time format of returned timestamps.
pub const TIME_FORMAT_KEY: &str = "time_format";

/// Session value key overriding the display zone.
pub const TIME_ZONE_KEY: &str = "time_zone";

/// A session-scoped value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionValue {
    /// Text
    Str(String),
    /// Integer
    Int(i64),
    /// Flag
    Bool(bool),
}

impl From<&str> for SessionValue {
    fn from(s: &str) -> Self {
        SessionValue::Str(s.to_string())
    }
}

impl From<String> for SessionValue {
    fn from(s: String) -> Self {
        SessionValue::Str(s)
    }
}

impl From<i64> for SessionValue {
    fn from(v: i64) -> Self {
        SessionValue::Int(v)
    }
}

impl From<bool> for SessionValue {
    fn from(v: bool) -> Self {
        SessionValue::Bool(v)
    }
}

/// Identity and scoped values of one client session.
#[derive(Debug)]
pub struct SessionContext {
    id: SessionId,
    created_at: DateTime<Utc>,
    values: RwLock<HashMap<String, SessionValue>>,
}

impl SessionContext {
    /// Create a context with no values.
    pub fn new(id: SessionId) -> Self {
        SessionContext {
            id,
            created_at: Utc::now(),
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Set a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<SessionValue>) -> Option<SessionValue> {
        self.values.write().insert(key.into(), value.into())
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) -> Option<SessionValue> {
        self.values.write().remove(key)
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<SessionValue> {
        self.values.read().get(key).cloned()
    }

    /// String value, `None` if absent or of another type.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            SessionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value, `None` if absent or of another type.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            SessionValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Flag value, `None` if absent or of another type.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            SessionValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Time format override, if set and well-formed.
    pub fn time_format(&self) -> Option<TimeFormat> {
        self.get_str(TIME_FORMAT_KEY)?.parse().ok()
    }

    /// Display zone override, if set and well-formed.
    pub fn time_zone(&self) -> Option<DisplayZone> {
        self.get_str(TIME_ZONE_KEY)?.parse().ok()
    }

    /// `base` with this session's overrides applied.
    pub fn codec_options(&self, base: &CodecOptions) -> CodecOptions {
        CodecOptions::new(
            self.time_format().unwrap_or_else(|| base.time_format.clone()),
            self.time_zone().unwrap_or(base.zone),
        )
    }
}

/// Owns a session for its lifetime. Dropping it tears the session down and
/// releases every handle the session still holds.
pub struct SessionGuard {
    ctx: Arc<SessionContext>,
    registry: Arc<Registry>,
}

impl SessionGuard {
    pub(crate) fn begin(id: SessionId, registry: Arc<Registry>) -> Self {
        info!(session = id, "Session started");
        SessionGuard {
            ctx: Arc::new(SessionContext::new(id)),
            registry,
        }
    }

    /// Shared context, for callers that outlive a borrow of the guard.
    pub fn context(&self) -> Arc<SessionContext> {
        Arc::clone(&self.ctx)
    }
}

impl Deref for SessionGuard {
    type Target = SessionContext;

    fn deref(&self) -> &SessionContext {
        &self.ctx
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let released = teardown(&self.registry, self.ctx.id);
        info!(session = self.ctx.id, released, "Session ended");
    }
}

/// Release every handle owned by `session`. Returns how many there were.
pub fn teardown(registry: &Registry, session: SessionId) -> usize {
    let handles = registry.drain_session(session);
    if !handles.is_empty() {
        warn!(
            session,
            count = handles.len(),
            "Releasing handles left open at session end"
        );
    }
    for handle in &handles {
        handle.release();
    }
    handles.len()
}
