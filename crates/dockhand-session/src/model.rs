//! Session records and the update/filter types accepted by the store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Analyzing,
    Failed,
    Completed,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Analyzing => "analyzing",
            SessionStatus::Failed => "failed",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run state shared by the workflow steps.
///
/// A `Session` value is never mutated once it is stored. The store produces a
/// new value for every update and swaps it in under its lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Name of the workflow step currently (or last) executing.
    pub stage: Option<String>,
    /// Step outputs keyed by result name (`analysis_result`, `build_result`, ...).
    pub workflow_state: Map<String, Value>,
    /// Incremented on every update.
    pub version: u64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Longest lifetime a session can be given, in days.
const MAX_TTL_DAYS: i64 = 3650;

/// `now + ttl` with the TTL capped at [`MAX_TTL_DAYS`] either way.
fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let cap = Duration::days(MAX_TTL_DAYS);
    now.checked_add_signed(ttl.clamp(-cap, cap))
        .or_else(|| now.checked_add_signed(cap))
        .unwrap_or(now)
}

impl Session {
    pub(crate) fn new(id: String, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            expires_at: expiry(now, ttl),
            status: SessionStatus::Active,
            stage: None,
            workflow_state: Map::new(),
            version: 0,
            labels: BTreeMap::new(),
            metadata: Map::new(),
        }
    }

    /// Whether the session is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Look up one entry of the workflow state.
    pub fn state(&self, key: &str) -> Option<&Value> {
        self.workflow_state.get(key)
    }

    /// Build the next version of this session with `update` applied.
    pub(crate) fn apply(&self, update: SessionUpdate, now: DateTime<Utc>) -> Session {
        let mut next = self.clone();

        if let Some(status) = update.status {
            next.status = status;
        }
        if let Some(stage) = update.stage {
            next.stage = Some(stage);
        }
        if let Some(state) = update.workflow_state {
            deep_merge_map(&mut next.workflow_state, state);
        }
        if let Some(metadata) = update.metadata {
            deep_merge_map(&mut next.metadata, metadata);
        }
        next.labels.extend(update.labels);

        next.version = self.version + 1;
        // Keep updated_at monotonic even if the wall clock steps backwards.
        next.updated_at = now.max(self.updated_at);
        next
    }
}

/// Parameters for creating a session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    /// Explicit id; a uuid is generated when absent.
    pub id: Option<String>,
    /// Overrides the store's default TTL.
    pub ttl: Option<Duration>,
    pub labels: BTreeMap<String, String>,
    pub metadata: Map<String, Value>,
}

impl NewSession {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Partial update applied by [`crate::SessionStore::update`].
///
/// `status` and `stage` replace the current values. `workflow_state` and
/// `metadata` are deep-merged. `labels` are merged key by key.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub stage: Option<String>,
    pub workflow_state: Option<Map<String, Value>>,
    pub metadata: Option<Map<String, Value>>,
    pub labels: BTreeMap<String, String>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Merge a single `key: value` pair into the workflow state.
    pub fn state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.workflow_state
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Filter for [`crate::SessionStore::list`]. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub label: Option<(String, String)>,
    pub created_after: Option<DateTime<Utc>>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        if let Some((key, value)) = &self.label {
            if session.labels.get(key) != Some(value) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if session.created_at <= after {
                return false;
            }
        }
        true
    }
}

/// Recursively merge `incoming` into `target`.
///
/// Objects merge key by key; any other value (including arrays) replaces the
/// existing one.
pub fn deep_merge_map(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(next)) => deep_merge_map(existing, next),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}
