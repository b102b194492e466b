//! In-flight action markers.
//!
//! One marker set is shared by every handler of this server. A key is held for
//! as long as its `ProcessingGuard` lives, so a second action on the same
//! entity is refused while the first is outstanding. Keys for different
//! entities never contend. There is no cross-server exclusion; atomicity of the
//! transition itself belongs to the stored procedure.

use dashmap::DashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct ProcessingMarker {
    keys: Arc<DashSet<String>>,
}

impl ProcessingMarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the marker key for an entity, e.g. `report:<uuid>`.
    pub fn key(scope: &str, id: Uuid) -> String {
        format!("{}:{}", scope, id)
    }

    /// Marks `key` as processing. Returns None if it already is.
    pub fn try_begin(&self, key: impl Into<String>) -> Option<ProcessingGuard> {
        let key = key.into();
        if self.keys.insert(key.clone()) {
            Some(ProcessingGuard {
                keys: self.keys.clone(),
                key,
            })
        } else {
            log::debug!("Refused duplicate action on {}", key);
            None
        }
    }

    pub fn is_processing(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of actions currently in flight.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Clears its key when dropped.
#[derive(Debug)]
pub struct ProcessingGuard {
    keys: Arc<DashSet<String>>,
    key: String,
}

impl ProcessingGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_is_refused_while_held() {
        let marker = ProcessingMarker::new();
        let id = Uuid::new_v4();

        let guard = marker.try_begin(ProcessingMarker::key("report", id));
        assert!(guard.is_some());
        assert!(marker
            .try_begin(ProcessingMarker::key("report", id))
            .is_none());

        drop(guard);
        assert!(marker
            .try_begin(ProcessingMarker::key("report", id))
            .is_some());
    }

    #[test]
    fn test_different_keys_do_not_contend() {
        let marker = ProcessingMarker::new();
        let a = marker.try_begin(ProcessingMarker::key("report", Uuid::new_v4()));
        let b = marker.try_begin(ProcessingMarker::key("report", Uuid::new_v4()));
        assert!(a.is_some());
        assert!(b.is_some());
        assert_eq!(marker.len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let marker = ProcessingMarker::new();
        let other = marker.clone();
        let _guard = marker.try_begin("user:1").unwrap();
        assert!(other.is_processing("user:1"));
        assert!(other.try_begin("user:1").is_none());
    }
}
