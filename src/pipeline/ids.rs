use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Record id source: `claim-{unix_millis}-{counter}-{8 hex}`.
///
/// The counter makes ids from one generator unique even within the same
/// millisecond; the random suffix separates generators across sessions.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    counter: AtomicU64,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let suffix: u32 = rand::random();
        format!(
            "claim-{}-{}-{:08x}",
            Utc::now().timestamp_millis(),
            seq,
            suffix
        )
    }

    /// Next id not rejected by `taken`.
    pub fn next_unique<F>(&self, taken: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        loop {
            let id = self.next_id();
            if !taken(&id) {
                return id;
            }
            tracing::warn!(%id, "Generated record id already in use, regenerating");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;

    #[test]
    fn id_format() {
        let id = RecordIdGenerator::new().next_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "claim");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2], "0");
        assert_eq!(parts[3].len(), 8);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_unique_within_a_burst() {
        let ids = RecordIdGenerator::new();
        let seen: HashSet<String> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn counter_is_monotonic() {
        let ids = RecordIdGenerator::new();
        let counters: Vec<u64> = (0..5)
            .map(|_| ids.next_id().split('-').nth(2).unwrap().parse().unwrap())
            .collect();
        assert_eq!(counters, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn next_unique_skips_taken_ids() {
        let ids = RecordIdGenerator::new();
        let rejections = Cell::new(2u32);
        let id = ids.next_unique(|_| {
            let left = rejections.get();
            rejections.set(left.saturating_sub(1));
            left > 0
        });
        assert!(id.starts_with("claim-"));
        // Two rejected candidates consumed counter values 0 and 1
        assert_eq!(id.split('-').nth(2), Some("2"));
    }
}
