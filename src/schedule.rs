//! Deferred actions keyed by frame-clock time

/// Time-ordered queue of pending actions
///
/// Entries scheduled for the same instant fire in insertion order.
#[derive(Debug, Clone)]
pub struct Timeline<A> {
    entries: Vec<(f64, u64, A)>,
    seq: u64,
}

impl<A> Default for Timeline<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            seq: 0,
        }
    }
}

impl<A> Timeline<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` to fire once the clock reaches `at_ms`
    pub fn schedule(&mut self, at_ms: f64, action: A) {
        self.entries.push((at_ms, self.seq, action));
        self.seq += 1;
    }

    /// Remove and return every action due at `now_ms`, earliest first
    pub fn drain_due(&mut self, now_ms: f64) -> Vec<A> {
        if self.entries.iter().all(|(at, _, _)| *at > now_ms) {
            return Vec::new();
        }
        let (mut due, pending): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|(at, _, _)| *at <= now_ms);
        self.entries = pending;
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        due.into_iter().map(|(_, _, action)| action).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
