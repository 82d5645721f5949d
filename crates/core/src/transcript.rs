use serde::Serialize;
use std::collections::VecDeque;

/// Sender label used for text typed by the player.
pub const HUMAN_SENDER: &str = "You";

/// Default number of retained chat entries.
pub const DEFAULT_MAX_ENTRIES: usize = 32;

/// One line of the visible conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    pub sender: String,
    pub text: String,
}

/// The chat view model: an ordered, bounded list of entries.
///
/// When full, the oldest entry is evicted before a new one is appended. A
/// capacity of zero keeps every entry.
#[derive(Debug, Clone)]
pub struct Transcript {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
    appended: u64,
}

impl Transcript {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            appended: 0,
        }
    }

    /// Appends an entry, returning the one evicted to make room, if any.
    pub fn push(&mut self, sender: impl Into<String>, text: impl Into<String>) -> Option<ChatEntry> {
        let evicted = if self.capacity > 0 && self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(ChatEntry {
            sender: sender.into(),
            text: text.into(),
        });
        self.appended += 1;
        evicted
    }

    pub fn entries(&self) -> impl Iterator<Item = &ChatEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of entries ever appended, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    /// Entries appended after the first `seen` appends that are still retained.
    pub fn since(&self, seen: u64) -> impl Iterator<Item = &ChatEntry> {
        let fresh = self.appended.saturating_sub(seen);
        let fresh = usize::try_from(fresh).unwrap_or(usize::MAX).min(self.entries.len());
        self.entries.iter().skip(self.entries.len() - fresh)
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(transcript: &Transcript) -> Vec<&str> {
        transcript.entries().map(|e| e.text.as_str()).collect()
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut transcript = Transcript::new(3);
        for text in ["a", "b", "c"] {
            assert!(transcript.push(HUMAN_SENDER, text).is_none());
        }
        let evicted = transcript.push("Victor", "d").unwrap();
        assert_eq!(evicted.text, "a");
        assert_eq!(texts(&transcript), vec!["b", "c", "d"]);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.total_appended(), 4);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut transcript = Transcript::new(5);
        for i in 0..50 {
            transcript.push(HUMAN_SENDER, i.to_string());
            assert!(transcript.len() <= 5);
        }
        assert_eq!(texts(&transcript), vec!["45", "46", "47", "48", "49"]);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let mut transcript = Transcript::new(0);
        for i in 0..100 {
            transcript.push(HUMAN_SENDER, i.to_string());
        }
        assert_eq!(transcript.len(), 100);
    }

    #[test]
    fn test_since_reports_fresh_entries() {
        let mut transcript = Transcript::new(2);
        transcript.push(HUMAN_SENDER, "a");
        let seen = transcript.total_appended();
        transcript.push(HUMAN_SENDER, "b");
        transcript.push(HUMAN_SENDER, "c");
        transcript.push(HUMAN_SENDER, "d");

        // Three were appended, but only two are still retained.
        let fresh: Vec<_> = transcript.since(seen).map(|e| e.text.as_str()).collect();
        assert_eq!(fresh, vec!["c", "d"]);
        assert_eq!(transcript.since(transcript.total_appended()).count(), 0);
    }
}
