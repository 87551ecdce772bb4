use dashmap::DashMap;

use crate::catalog::{EntryKey, SourceRef};

/// Manual variant pins, scoped to (playback session, entry). Process lifetime only.
#[derive(Debug, Default)]
pub struct OverrideRegistry {
    pins: DashMap<(String, EntryKey), SourceRef>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a variant. Returns the previous pin, if any.
    pub fn pin(&self, session: &str, entry: &EntryKey, source_ref: SourceRef) -> Option<SourceRef> {
        self.pins
            .insert((session.to_string(), entry.clone()), source_ref)
    }

    pub fn get(&self, session: &str, entry: &EntryKey) -> Option<SourceRef> {
        self.pins
            .get(&(session.to_string(), entry.clone()))
            .map(|r| r.value().clone())
    }

    pub fn clear(&self, session: &str, entry: &EntryKey) -> Option<SourceRef> {
        self.pins
            .remove(&(session.to_string(), entry.clone()))
            .map(|(_, r)| r)
    }

    /// Drop every pin of a session. Returns how many were removed.
    pub fn clear_session(&self, session: &str) -> usize {
        let before = self.pins.len();
        self.pins.retain(|(s, _), _| s != session);
        before - self.pins.len()
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}
