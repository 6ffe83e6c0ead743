use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out item indices to concurrent workers, each index exactly once.
#[derive(Debug)]
pub struct SharedCursor {
    next: AtomicUsize,
    total: usize,
}

impl SharedCursor {
    /// Creates a cursor over `total` items.
    pub fn new(total: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            total,
        }
    }

    /// Claims the next unclaimed index, or `None` once all items have been handed out.
    pub fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < self.total).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn claims_each_index_once() {
        let cursor = SharedCursor::new(3);
        assert_eq!(cursor.claim(), Some(0));
        assert_eq!(cursor.claim(), Some(1));
        assert_eq!(cursor.claim(), Some(2));
        assert_eq!(cursor.claim(), None);
        assert_eq!(cursor.claim(), None);
    }

    #[test]
    fn empty_cursor_is_exhausted() {
        assert_eq!(SharedCursor::new(0).claim(), None);
    }

    #[test]
    fn concurrent_claims_are_disjoint() {
        let cursor = Arc::new(SharedCursor::new(10_000));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cursor = Arc::clone(&cursor);
                std::thread::spawn(move || {
                    std::iter::from_fn(|| cursor.claim()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for thread in threads {
            for index in thread.join().unwrap() {
                assert!(seen.insert(index), "index {index} claimed twice");
            }
        }
        assert_eq!(seen.len(), 10_000);
    }
}
