//! Handle registry
//!
//! Maps opaque handle IDs to the server-side resources behind them: open
//! result cursors and append sessions. IDs come from a monotonic counter,
//! are rendered as decimal strings and are never reused.
//!
//! ## Scoping
//!
//! Every handle belongs to the session that created it. Lookups from any
//! other session behave as if the handle did not exist.
//!
//! ## Locking
//!
//! A resource sits behind its own mutex. Operations take it with
//! [`Handle::lock`], which never waits: a second concurrent operation on the
//! same handle fails with `HandleBusy`.
//!
//! Releasing never waits either. A handle retired while an operation holds
//! its resource (typically one abandoned by a deadline) is released by that
//! operation when it finishes; see [`Handle::with`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::appender::AppendState;
use crate::cursor::CursorState;
use crate::session::SessionId;
use crate::{Error, Result};

/// Kind of resource a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Open result cursor
    Cursor,
    /// Append session
    Appender,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Cursor => f.write_str("cursor"),
            ResourceKind::Appender => f.write_str("appender"),
        }
    }
}

/// Server-side state behind a handle.
pub enum Resource {
    /// Open result cursor
    Cursor(CursorState),
    /// Append session
    Appender(AppendState),
}

impl Resource {
    /// Kind of this resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Cursor(_) => ResourceKind::Cursor,
            Resource::Appender(_) => ResourceKind::Appender,
        }
    }

    /// Release engine-side state. Errors are logged, not returned.
    pub fn release(&mut self) {
        let outcome = match self {
            Resource::Cursor(cursor) => cursor.close(),
            Resource::Appender(appender) => appender.close().map(|_| ()),
        };
        if let Err(e) = outcome {
            warn!(kind = %self.kind(), error = %e, "Error releasing resource");
        }
    }
}

/// A registered resource.
pub struct Handle {
    id: String,
    session: SessionId,
    kind: ResourceKind,
    retired: AtomicBool,
    resource: Mutex<Resource>,
}

impl Handle {
    /// Opaque handle ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning session.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Resource kind, fixed at registration.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Fail with `HandleInvalid` unless this handle is of `expected` kind.
    pub fn expect_kind(&self, expected: ResourceKind) -> Result<()> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(Error::HandleInvalid {
                handle: self.id.clone(),
                reason: format!("{} handle used as {}", self.kind, expected),
            })
        }
    }

    /// Whether [`Handle::release`] has been called.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Take the resource without waiting.
    pub fn lock(&self) -> Result<MutexGuard<'_, Resource>> {
        self.resource.try_lock().ok_or_else(|| Error::HandleBusy {
            handle: self.id.clone(),
        })
    }

    /// Run `f` on the resource without waiting for it.
    ///
    /// If the handle was retired while `f` ran, the resource is released
    /// once `f` returns.
    pub fn with<T>(&self, f: impl FnOnce(&mut Resource) -> Result<T>) -> Result<T> {
        let out = {
            let mut resource = self.lock()?;
            f(&mut *resource)
        };
        if self.is_retired() {
            if let Some(mut resource) = self.resource.try_lock() {
                debug!(handle = %self.id, "Releasing retired handle after in-flight operation");
                resource.release();
            }
        }
        out
    }

    /// Retire the handle and release its resource. Never waits: a resource
    /// held by an in-flight operation is released when that operation ends.
    pub fn release(&self) {
        self.retired.store(true, Ordering::SeqCst);
        match self.resource.try_lock() {
            Some(mut resource) => resource.release(),
            None => debug!(handle = %self.id, "Handle busy at release; deferred to its operation"),
        }
    }
}

/// Result of resolving a handle ID.
pub enum Lookup {
    /// Live and owned by the caller's session
    Live(Arc<Handle>),
    /// Issued by this registry and since removed
    Retired,
    /// Never issued, or owned by another session
    Unknown,
}

/// Registry of live handles.
pub struct Registry {
    handles: DashMap<u64, Arc<Handle>>,
    next_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry {
            handles: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a fully built resource and return its handle.
    pub fn put(&self, session: SessionId, resource: Resource) -> Arc<Handle> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(Handle {
            id: n.to_string(),
            session,
            kind: resource.kind(),
            retired: AtomicBool::new(false),
            resource: Mutex::new(resource),
        });
        self.handles.insert(n, Arc::clone(&handle));
        debug!(handle = %handle.id, session, kind = %handle.kind, "Handle registered");
        handle
    }

    /// Resolve an ID for `session`.
    ///
    /// # Errors
    ///
    /// `HandleInvalid` if `id` is not a well-formed handle ID.
    pub fn lookup(&self, session: SessionId, id: &str) -> Result<Lookup> {
        let n = parse_id(id)?;
        Ok(match self.handles.get(&n) {
            Some(entry) if entry.session == session => Lookup::Live(Arc::clone(entry.value())),
            Some(_) => Lookup::Unknown,
            None if self.was_issued(n) => Lookup::Retired,
            None => Lookup::Unknown,
        })
    }

    /// Resolve a live handle of `session`.
    ///
    /// # Errors
    ///
    /// `HandleInvalid` for a malformed ID, `HandleNotFound` otherwise.
    pub fn get(&self, session: SessionId, id: &str) -> Result<Arc<Handle>> {
        match self.lookup(session, id)? {
            Lookup::Live(handle) => Ok(handle),
            Lookup::Retired | Lookup::Unknown => Err(Error::HandleNotFound {
                handle: id.to_string(),
            }),
        }
    }

    /// Remove a handle of `session`. Idempotent; does not release it.
    pub fn remove(&self, session: SessionId, id: &str) -> Option<Arc<Handle>> {
        let n = id.parse::<u64>().ok()?;
        let (_, handle) = self.handles.remove_if(&n, |_, h| h.session == session)?;
        debug!(handle = %handle.id, session, "Handle removed");
        Some(handle)
    }

    /// Remove every handle owned by `session`. The caller releases them.
    pub fn drain_session(&self, session: SessionId) -> Vec<Arc<Handle>> {
        let ids: Vec<u64> = self
            .handles
            .iter()
            .filter(|entry| entry.session == session)
            .map(|entry| *entry.key())
            .collect();
        ids.into_iter()
            .filter_map(|n| self.handles.remove(&n).map(|(_, h)| h))
            .collect()
    }

    /// IDs of the handles owned by `session`, ascending.
    pub fn ids_for(&self, session: SessionId) -> Vec<String> {
        let mut ids: Vec<u64> = self
            .handles
            .iter()
            .filter(|entry| entry.session == session)
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|n| n.to_string()).collect()
    }

    /// Number of live handles across all sessions.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handles are live.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn was_issued(&self, n: u64) -> bool {
        n >= 1 && n < self.next_id.load(Ordering::Relaxed)
    }
}

fn parse_id(id: &str) -> Result<u64> {
    id.parse::<u64>().map_err(|_| Error::HandleInvalid {
        handle: id.to_string(),
        reason: "not a handle id".to_string(),
    })
}
