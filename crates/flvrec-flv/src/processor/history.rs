//! Ordered record of emitted tags, kept for clip export.

use crate::tag::FlvTag;
use std::collections::VecDeque;
use std::sync::Arc;

/// Append-only tag history with an optional retention window.
#[derive(Debug, Default)]
pub(crate) struct TagHistory {
    tags: VecDeque<Arc<FlvTag>>,
    /// Tags older than `newest - retention_ms` are dropped. `None` keeps all.
    retention_ms: Option<u32>,
}

impl TagHistory {
    pub(crate) fn new(retention_ms: Option<u32>) -> Self {
        Self {
            tags: VecDeque::new(),
            retention_ms,
        }
    }

    /// Append a tag, then evict from the front anything outside the window
    /// ending at `max_timestamp`.
    pub(crate) fn push(&mut self, tag: Arc<FlvTag>, max_timestamp: u32) {
        self.tags.push_back(tag);

        let Some(retention) = self.retention_ms else {
            return;
        };
        let cutoff = max_timestamp.saturating_sub(retention);
        let before = self.tags.len();
        while self.tags.front().is_some_and(|t| t.timestamp < cutoff) {
            self.tags.pop_front();
        }
        let evicted = before - self.tags.len();
        if evicted > 0 {
            tracing::trace!("Evicted {} tags older than {}ms", evicted, cutoff);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tags.len()
    }

    /// Shared copy of the current history.
    pub(crate) fn snapshot(&self) -> Vec<Arc<FlvTag>> {
        self.tags.iter().cloned().collect()
    }

    /// Move the history out, leaving it empty and deallocated.
    pub(crate) fn take(&mut self) -> Vec<Arc<FlvTag>> {
        std::mem::take(&mut self.tags).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagType;

    fn tag(ts: u32) -> Arc<FlvTag> {
        Arc::new(FlvTag::new(TagType::Video, ts, vec![0u8; 1]).unwrap())
    }

    fn timestamps(history: &TagHistory) -> Vec<u32> {
        history.snapshot().iter().map(|t| t.timestamp).collect()
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let mut history = TagHistory::new(None);
        for ts in [0, 1000, 60_000, 120_000] {
            history.push(tag(ts), ts);
        }
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_retention_window() {
        let mut history = TagHistory::new(Some(1000));
        for ts in [0, 500, 1000, 1500] {
            history.push(tag(ts), ts);
        }
        assert_eq!(timestamps(&history), vec![500, 1000, 1500]);

        history.push(tag(2600), 2600);
        assert_eq!(timestamps(&history), vec![2600]);

        history.push(tag(2700), 2700);
        assert_eq!(timestamps(&history), vec![2600, 2700]);
    }

    #[test]
    fn test_take_empties() {
        let mut history = TagHistory::new(None);
        history.push(tag(1), 1);
        history.push(tag(2), 2);
        let taken = history.take();
        assert_eq!(taken.len(), 2);
        assert_eq!(history.len(), 0);
    }
}
