use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::domain::Insight;

/// Short-lived per-user memo of generated insights.
pub struct InsightCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Vec<Insight>)>>,
}

impl InsightCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, user_id: &str) -> Option<Vec<Insight>> {
        let mut entries = self.entries.lock();
        let fresh = entries
            .get(user_id)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, insights)| insights.clone());
        if fresh.is_none() {
            entries.remove(user_id);
        }
        fresh
    }

    pub fn put(&self, user_id: &str, insights: Vec<Insight>) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries
            .lock()
            .insert(user_id.to_string(), (Instant::now(), insights));
    }

    pub fn invalidate(&self, user_id: &str) {
        self.entries.lock().remove(user_id);
    }
}
