use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::Estimate;

pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct SessionEntry {
    ticket: u64,
    latest: Option<Estimate>,
}

#[derive(Debug, Default)]
struct Registry {
    entries: HashMap<String, SessionEntry>,
    /// Tickets are unique across sessions, so they also order entries by age.
    last_ticket: u64,
}

/// Last-write-wins registry for interactive estimation. Each request takes a
/// ticket; a result is only kept if no newer ticket was issued meanwhile.
/// Holds at most `capacity` sessions, dropping the least recently used.
#[derive(Debug)]
pub struct EstimateSessions {
    registry: Mutex<Registry>,
    capacity: usize,
}

impl Default for EstimateSessions {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }
}

impl EstimateSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn begin(&self, session_id: &str) -> u64 {
        let mut registry = self.lock();
        if !registry.entries.contains_key(session_id) && registry.entries.len() >= self.capacity {
            registry.evict_oldest();
        }

        registry.last_ticket += 1;
        let ticket = registry.last_ticket;
        registry
            .entries
            .entry(session_id.to_string())
            .and_modify(|e| e.ticket = ticket)
            .or_insert(SessionEntry {
                ticket,
                latest: None,
            });
        ticket
    }

    /// Stores `estimate` if `ticket` is still the newest. Returns false when
    /// the request was superseded or its session evicted.
    pub fn complete(&self, session_id: &str, ticket: u64, estimate: &Estimate) -> bool {
        let mut registry = self.lock();
        match registry.entries.get_mut(session_id) {
            Some(entry) if entry.ticket == ticket => {
                entry.latest = Some(estimate.clone());
                true
            }
            _ => false,
        }
    }

    pub fn latest(&self, session_id: &str) -> Option<Estimate> {
        self.lock()
            .entries
            .get(session_id)
            .and_then(|e| e.latest.clone())
    }

    pub fn forget(&self, session_id: &str) -> bool {
        self.lock().entries.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Registry {
    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.ticket)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            tracing::debug!(session = %id, "evicting estimate session");
            self.entries.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EstimateSource;

    fn est(minutes: u32) -> Estimate {
        Estimate {
            minutes,
            breakdown: vec![],
            source: EstimateSource::Rules,
            notes: vec![],
        }
    }

    #[test]
    fn test_newer_request_wins() {
        let sessions = EstimateSessions::new();
        let first = sessions.begin("s1");
        let second = sessions.begin("s1");

        assert!(sessions.complete("s1", second, &est(40)));
        assert!(!sessions.complete("s1", first, &est(90)));
        assert_eq!(sessions.latest("s1").unwrap().minutes, 40);
    }

    #[test]
    fn test_sessions_are_independent() {
        let sessions = EstimateSessions::new();
        let a = sessions.begin("a");
        let b = sessions.begin("b");
        assert!(sessions.complete("a", a, &est(30)));
        assert!(sessions.complete("b", b, &est(50)));
        assert_eq!(sessions.latest("a").unwrap().minutes, 30);
    }

    #[test]
    fn test_forget_drops_session() {
        let sessions = EstimateSessions::new();
        let t = sessions.begin("s1");
        sessions.complete("s1", t, &est(30));
        assert!(sessions.forget("s1"));
        assert!(sessions.latest("s1").is_none());
        assert!(!sessions.complete("s1", t, &est(30)));
    }

    #[test]
    fn test_capacity_evicts_least_recent_session() {
        let sessions = EstimateSessions::with_capacity(2);
        let a = sessions.begin("a");
        sessions.begin("b");
        // Touching "a" again makes "b" the oldest.
        let a2 = sessions.begin("a");
        assert!(sessions.complete("a", a2, &est(30)));
        assert!(!sessions.complete("a", a, &est(30)));

        sessions.begin("c");
        assert_eq!(sessions.len(), 2);
        assert!(sessions.latest("a").is_some());
        assert!(!sessions.forget("b"));
    }

    #[test]
    fn test_evicted_ticket_cannot_complete_new_session() {
        let sessions = EstimateSessions::with_capacity(1);
        let old = sessions.begin("a");
        sessions.begin("b");
        let fresh = sessions.begin("a");
        assert_ne!(old, fresh);
        assert!(!sessions.complete("a", old, &est(30)));
        assert!(sessions.complete("a", fresh, &est(40)));
    }
}
