/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Process-wide session registry.
//!
//! Replaces the implicit retained-object statics of older designs with an
//! explicit map keyed by a stable [`SessionToken`]: a record is inserted when
//! a request context first initializes and removed on explicit teardown.
//! Lookup is the only surface exposed to embedders.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use parking_lot::RwLock;

/// Stable identity of one request-context session for the life of the
/// process. Tokens are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(u64);

impl SessionToken {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// What the process knows about one live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub label: String,
    pub storage_path: Option<PathBuf>,
}

fn session_map() -> &'static RwLock<HashMap<SessionToken, SessionRecord>> {
    static SESSIONS: OnceLock<RwLock<HashMap<SessionToken, SessionRecord>>> = OnceLock::new();
    SESSIONS.get_or_init(|| RwLock::new(HashMap::new()))
}

pub(crate) fn insert(token: SessionToken, record: SessionRecord) {
    debug!("session {token:?} registered as {:?}", record.label);
    session_map().write().insert(token, record);
}

pub(crate) fn remove(token: SessionToken) -> Option<SessionRecord> {
    let removed = session_map().write().remove(&token);
    if removed.is_some() {
        debug!("session {token:?} removed");
    }
    removed
}

/// Look up a live session by token. `None` once the session has been torn
/// down (or never initialized).
pub fn lookup(token: SessionToken) -> Option<SessionRecord> {
    session_map().read().get(&token).cloned()
}

/// Tokens of every currently live session, sorted.
pub fn active_tokens() -> Vec<SessionToken> {
    let mut tokens: Vec<SessionToken> = session_map().read().keys().copied().collect();
    tokens.sort();
    tokens
}
