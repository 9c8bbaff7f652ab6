// Batch cache - Partially loaded series keyed by calendar batch
use crate::application::clock::Clock;
use crate::domain::batch::{Batch, BatchRequest, batch_range, day_anchor, ids_covering};
use crate::domain::frame_merge::merge_frames;
use crate::domain::series::{Frame, sanitize_frame};
use crate::domain::time_range::TimeRange;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MAX_CACHE_SIZE: usize = 10;

/// Holds fetched batches for the current metric, admits one fetch at a time
/// and keeps at most `max_batches` entries, dropping the oldest ids first.
pub struct BatchDataCache {
    clock: Arc<dyn Clock>,
    anchor: i64,
    max_batches: usize,
    batches: BTreeMap<i64, Batch>,
    loading_batch_id: Option<i64>,
    current_metric: Option<String>,
}

impl BatchDataCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, MAX_CACHE_SIZE)
    }

    pub fn with_capacity(clock: Arc<dyn Clock>, max_batches: usize) -> Self {
        let anchor = day_anchor(clock.now_ms());
        Self {
            clock,
            anchor,
            max_batches: max_batches.max(1),
            batches: BTreeMap::new(),
            loading_batch_id: None,
            current_metric: None,
        }
    }

    pub fn anchor(&self) -> i64 {
        self.anchor
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batch_ids(&self) -> Vec<i64> {
        self.batches.keys().copied().collect()
    }

    pub fn get(&self, batch_id: i64) -> Option<&Batch> {
        self.batches.get(&batch_id)
    }

    pub fn clear(&mut self) {
        self.batches.clear();
        self.loading_batch_id = None;
    }

    /// Returns true (after clearing everything) when `metric` differs from the
    /// metric the stored batches were fetched for.
    pub fn check_metric_change(&mut self, metric: &str) -> bool {
        if self.current_metric.as_deref() == Some(metric) {
            return false;
        }
        tracing::debug!(
            "Metric changed from {:?} to {}, dropping {} cached batches",
            self.current_metric,
            metric,
            self.batches.len()
        );
        self.clear();
        self.current_metric = Some(metric.to_string());
        true
    }

    pub fn current_metric(&self) -> Option<&str> {
        self.current_metric.as_deref()
    }

    /// Most recent covering batch that is neither cached, loading nor in the future.
    /// With a full cache, ids below the lowest cached one are skipped: storing
    /// them would evict them again straight away.
    pub fn next_batch_to_load(&self, visible_from: i64, visible_to: i64) -> Option<BatchRequest> {
        let now = self.now_ms();
        let floor = match self.batches.first_key_value() {
            Some((lowest, _)) if self.batches.len() >= self.max_batches => *lowest,
            _ => i64::MIN,
        };
        ids_covering(visible_from, visible_to, self.anchor)
            .rev()
            .take_while(|id| *id > floor)
            .filter(|id| !self.batches.contains_key(id) && self.loading_batch_id != Some(*id))
            .find_map(|id| {
                let range = batch_range(id, self.anchor);
                if range.from > now {
                    return None;
                }
                Some(BatchRequest {
                    batch_id: id,
                    range: TimeRange {
                        from: range.from,
                        to: range.to.min(now),
                    },
                })
            })
    }

    pub fn set_loading_batch(&mut self, batch_id: Option<i64>) {
        if let Some(id) = batch_id {
            if self.batches.contains_key(&id) {
                tracing::warn!("Batch {} is already cached, not marking it as loading", id);
                return;
            }
        }
        self.loading_batch_id = batch_id;
    }

    pub fn loading_batch_id(&self) -> Option<i64> {
        self.loading_batch_id
    }

    pub fn store_batch(
        &mut self,
        batch_id: i64,
        from: i64,
        to: i64,
        frames: Vec<Frame>,
        error: Option<String>,
    ) {
        let frames: Vec<Frame> = frames.into_iter().map(sanitize_frame).collect();
        tracing::debug!(
            "Storing batch {} [{}, {}) with {} frames{}",
            batch_id,
            from,
            to,
            frames.len(),
            if error.is_some() { " (error)" } else { "" }
        );

        self.batches.insert(
            batch_id,
            Batch {
                batch_id,
                range: TimeRange { from, to },
                frames,
                error,
            },
        );
        if self.loading_batch_id == Some(batch_id) {
            self.loading_batch_id = None;
        }
        self.evict();
    }

    pub fn store_batch_error(&mut self, batch_id: i64, from: i64, to: i64, message: impl Into<String>) {
        self.store_batch(batch_id, from, to, Vec::new(), Some(message.into()));
    }

    /// Distinct error messages of the batches covering the window.
    pub fn errors(&self, visible_from: i64, visible_to: i64) -> Vec<String> {
        let mut errors: Vec<String> = Vec::new();
        for batch in self.covering(visible_from, visible_to) {
            if let Some(error) = &batch.error {
                if !errors.contains(error) {
                    errors.push(error.clone());
                }
            }
        }
        errors
    }

    pub fn has_errors(&self, visible_from: i64, visible_to: i64) -> bool {
        self.covering(visible_from, visible_to).any(Batch::is_error)
    }

    /// Forget failed batches so the next load pass retries them.
    pub fn clear_errors(&mut self) {
        self.batches.retain(|_, batch| !batch.is_error());
    }

    pub fn cached_data(&self, visible_from: i64, visible_to: i64) -> Vec<Frame> {
        let frames: Vec<Frame> = self
            .covering(visible_from, visible_to)
            .flat_map(|batch| batch.frames.iter().cloned())
            .collect();
        merge_frames(frames)
    }

    pub fn is_fully_loaded(&self, visible_from: i64, visible_to: i64) -> bool {
        let now = self.now_ms();
        ids_covering(visible_from, visible_to, self.anchor)
            .filter(|id| batch_range(*id, self.anchor).from <= now)
            .all(|id| self.batches.contains_key(&id))
    }

    /// Parts of the window still waiting for data, requested or not.
    pub fn loading_ranges(&self, visible_from: i64, visible_to: i64) -> Vec<TimeRange> {
        let now = self.now_ms();
        ids_covering(visible_from, visible_to, self.anchor)
            .filter(|id| !self.batches.contains_key(id))
            .map(|id| batch_range(id, self.anchor))
            .filter(|range| range.from <= now)
            .map(|range| {
                let from = range.from.max(visible_from);
                let to = range.to.min(now).min(visible_to).max(from);
                TimeRange { from, to }
            })
            .collect()
    }

    fn covering(&self, visible_from: i64, visible_to: i64) -> impl Iterator<Item = &Batch> {
        ids_covering(visible_from, visible_to, self.anchor).filter_map(|id| self.batches.get(&id))
    }

    fn evict(&mut self) {
        while self.batches.len() > self.max_batches {
            if let Some((id, _)) = self.batches.pop_first() {
                tracing::debug!("Evicted batch {}", id);
            }
        }
    }
}
