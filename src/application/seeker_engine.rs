// Seeker engine - Context/timeline ranges, gestures and the batch loading loop
use crate::application::batch_cache::BatchDataCache;
use crate::application::interaction::{InteractionEvent, InteractionMode, UpdateGuards};
use crate::domain::error::SeekerResult;
use crate::domain::series::{Frame, SeekerQuery, has_enough_points};
use crate::domain::time_range::{
    ContextPreset, MAX_CONTEXT_WIDTH_MS, MIN_RANGE_WIDTH_MS, PanDirection, TimeRange,
};
use serde::Serialize;

pub const DEFAULT_PAN_FRACTION: f64 = 0.25;
pub const WHEEL_ZOOM_IN: f64 = 0.8;
pub const WHEEL_ZOOM_OUT: f64 = 1.25;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Width of the context window derived from the host range.
    pub default_context: ContextPreset,
    /// Share of the context width moved by one pan step.
    pub pan_fraction: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_context: ContextPreset::hours(24),
            pan_fraction: DEFAULT_PAN_FRACTION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Move,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Finished pointer gesture on the chart.
    User,
    /// Set through the API (buttons, presets, host sync).
    Programmatic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeekerNotification {
    /// The selection changed and the host should adopt it.
    TimeRangeChanged { range: TimeRange },
    /// The context window moved; the host may persist it.
    VisibleRangeChanged { range: TimeRange },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub batch_id: i64,
    pub window: TimeRange,
    pub query: SeekerQuery,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub request: FetchRequest,
    pub result: Result<Vec<Frame>, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataState {
    Loading,
    NotEnoughData,
    Ready,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeekerSnapshot {
    pub query: SeekerQuery,
    pub visible: TimeRange,
    pub timeline: TimeRange,
    pub mode: InteractionMode,
    pub relative_context_duration: Option<String>,
    pub loading_batch_id: Option<i64>,
    pub loading_ranges: Vec<TimeRange>,
    pub errors: Vec<String>,
    pub fully_loaded: bool,
    pub data_state: DataState,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    kind: DragKind,
    origin_pointer: i64,
    origin_timeline: TimeRange,
}

#[derive(Debug, Clone, Copy)]
struct PanState {
    origin_visible: TimeRange,
    origin_timeline: TimeRange,
}

/// Owns the two ranges and the cache. Every range change goes through
/// [`SeekerEngine::set_visible_range`] or [`SeekerEngine::set_timeline_range`];
/// outward effects are queued as [`SeekerNotification`]s.
pub struct SeekerEngine {
    settings: EngineSettings,
    cache: BatchDataCache,
    query: SeekerQuery,
    visible: TimeRange,
    timeline: TimeRange,
    mode: InteractionMode,
    guards: UpdateGuards,
    relative_context_duration: Option<String>,
    drag: Option<DragState>,
    pan: Option<PanState>,
    outbox: Vec<SeekerNotification>,
}

impl SeekerEngine {
    pub fn new(
        cache: BatchDataCache,
        query: SeekerQuery,
        host_range: TimeRange,
        settings: EngineSettings,
    ) -> Self {
        let mut engine = Self {
            visible: host_range,
            timeline: host_range,
            relative_context_duration: Some(settings.default_context.label().to_string()),
            settings,
            cache,
            query,
            mode: InteractionMode::Idle,
            guards: UpdateGuards::default(),
            drag: None,
            pan: None,
            outbox: Vec::new(),
        };
        engine.visible =
            engine.window_around(host_range, engine.settings.default_context.duration_ms());
        engine.cache.check_metric_change(&engine.query.cache_key());
        engine
    }

    pub fn visible(&self) -> TimeRange {
        self.visible
    }

    pub fn timeline(&self) -> TimeRange {
        self.timeline
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn query(&self) -> &SeekerQuery {
        &self.query
    }

    pub fn relative_context_duration(&self) -> Option<&str> {
        self.relative_context_duration.as_deref()
    }

    pub fn cache(&self) -> &BatchDataCache {
        &self.cache
    }

    pub fn take_notifications(&mut self) -> Vec<SeekerNotification> {
        std::mem::take(&mut self.outbox)
    }

    // ---- range mutators ----

    /// The single writer of the context window. `suppress_dashboard_update`
    /// keeps a resulting timeline clamp from being reported to the host.
    pub fn set_visible_range(&mut self, range: TimeRange, suppress_dashboard_update: bool) {
        let range = range.normalized().limited_to(MAX_CONTEXT_WIDTH_MS);
        if suppress_dashboard_update {
            self.guards.suppress_next_dashboard_update.arm();
        }
        if range != self.visible {
            self.visible = range;
            self.outbox
                .push(SeekerNotification::VisibleRangeChanged { range });
        }
        self.keep_timeline_inside_visible();
    }

    /// The single writer of the selection window.
    pub fn set_timeline_range(&mut self, range: TimeRange, source: UpdateSource) {
        if source == UpdateSource::Programmatic {
            self.transition(InteractionEvent::ProgrammaticBegin);
        }

        let range = range.normalized().clamped_within(&self.visible);
        let suppressed = self.guards.suppress_next_time_range_update.take();
        if range != self.timeline {
            self.timeline = range;
            if suppressed {
                tracing::debug!("Timeline set to {} without notifying host", range);
            } else {
                self.outbox.push(SeekerNotification::TimeRangeChanged { range });
            }
        }

        if source == UpdateSource::Programmatic {
            self.transition(InteractionEvent::ProgrammaticEnd);
        }
    }

    fn keep_timeline_inside_visible(&mut self) {
        let suppressed = self.guards.suppress_next_dashboard_update.take();
        let clamped = self.timeline.clamped_within(&self.visible);
        if clamped == self.timeline {
            return;
        }
        self.timeline = clamped;
        if !suppressed {
            self.outbox
                .push(SeekerNotification::TimeRangeChanged { range: clamped });
        }
    }

    // ---- context window controls ----

    pub fn zoom_context_window(&mut self, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            tracing::warn!("Ignoring zoom factor {}", factor);
            return;
        }
        // Zoom-out stops at MAX_CONTEXT_WIDTH_MS around the current center.
        let factor = factor.min(MAX_CONTEXT_WIDTH_MS as f64 / self.visible.width().max(1) as f64);
        let next = self.visible.scaled(factor);
        self.programmatic(|engine| {
            engine.relative_context_duration = None;
            engine.set_visible_range(next, false);
        });
    }

    pub fn pan_context_window(&mut self, direction: PanDirection) {
        let step = (self.visible.width() as f64 * self.settings.pan_fraction).round() as i64;
        let delta = match direction {
            PanDirection::Left => -step,
            PanDirection::Right => step,
        };
        let next = self.visible.shifted(delta);
        self.programmatic(|engine| {
            engine.relative_context_duration = None;
            engine.set_visible_range(next, false);
        });
    }

    /// Re-center a default-width window on the current selection.
    pub fn reset_context_window(&mut self) {
        let preset = self.settings.default_context.clone();
        let next = self.window_around(self.timeline, preset.duration_ms());
        self.programmatic(|engine| {
            engine.relative_context_duration = Some(preset.label().to_string());
            engine.set_visible_range(next, false);
        });
    }

    pub fn apply_context_preset(&mut self, preset: &ContextPreset) {
        let next = if preset.matches_host() {
            self.timeline
        } else {
            self.window_around(self.timeline, preset.duration_ms())
        };
        self.programmatic(|engine| {
            engine.relative_context_duration = Some(preset.label().to_string());
            engine.set_visible_range(next, false);
        });
    }

    /// Parse and apply a preset label; invalid input is logged and ignored.
    pub fn apply_context_input(&mut self, input: &str) -> bool {
        match ContextPreset::parse(input) {
            Ok(preset) => {
                self.apply_context_preset(&preset);
                true
            }
            Err(e) => {
                tracing::warn!("Ignoring context window input: {}", e);
                false
            }
        }
    }

    /// Use an absolute context window. A selection that no longer fits keeps
    /// its relative position inside the new window and is reported to the host.
    pub fn apply_absolute_context(&mut self, from: i64, to: i64) -> SeekerResult<()> {
        let next = TimeRange::new_context(from, to)?;
        let remapped = if next.contains(&self.timeline) {
            self.timeline
        } else {
            remap(self.timeline, self.visible, next)
        };

        self.programmatic(|engine| {
            engine.relative_context_duration = None;
            engine.set_visible_range(next, true);
            engine.set_timeline_range(remapped, UpdateSource::Programmatic);
        });
        Ok(())
    }

    /// Follow a time range change made by the host itself.
    pub fn handle_dashboard_range_change(&mut self, range: TimeRange) {
        let range = range.normalized();
        if range == self.timeline {
            tracing::debug!("Host range {} already selected", range);
            return;
        }

        let next_visible = match self
            .relative_context_duration
            .as_deref()
            .map(ContextPreset::parse)
        {
            Some(Ok(preset)) if preset.matches_host() => range,
            Some(Ok(preset)) => self.window_around(range, preset.duration_ms()),
            _ if self.visible.contains(&range) => self.visible,
            _ => self.window_around(range, self.visible.width()),
        };

        self.set_visible_range(next_visible, true);
        self.guards.suppress_next_time_range_update.arm();
        self.set_timeline_range(range, UpdateSource::Programmatic);
    }

    // ---- chart gestures (time values, already converted from pixels) ----

    /// Selection reported by the chart outside of a drag.
    pub fn on_chart_select(&mut self, range: TimeRange) -> bool {
        if !self.mode.accepts_external_selection() {
            tracing::debug!("Ignoring chart selection while {:?}", self.mode);
            return false;
        }
        if self.guards.skip_next_select_update.take() {
            tracing::debug!("Ignoring echoed chart selection {}", range);
            return false;
        }
        self.set_timeline_range(range, UpdateSource::User);
        true
    }

    /// The binding is about to write the selection to the chart, which will
    /// report it back once.
    pub fn expect_selection_echo(&mut self) {
        self.guards.skip_next_select_update.arm();
    }

    pub fn begin_drag(&mut self, kind: DragKind, pointer_ms: i64) {
        self.transition(InteractionEvent::BrushPointerDown);
        if self.mode == InteractionMode::Dragging {
            self.drag = Some(DragState {
                kind,
                origin_pointer: pointer_ms,
                origin_timeline: self.timeline,
            });
        }
    }

    pub fn drag_to(&mut self, pointer_ms: i64) {
        let Some(drag) = self.drag else {
            return;
        };
        let delta = pointer_ms - drag.origin_pointer;
        let origin = drag.origin_timeline;
        let visible = self.visible;

        self.timeline = match drag.kind {
            DragKind::Move => origin.shifted(delta).clamped_within(&visible),
            DragKind::Left => TimeRange {
                from: (origin.from + delta)
                    .min(origin.to - MIN_RANGE_WIDTH_MS)
                    .max(visible.from),
                to: origin.to,
            },
            DragKind::Right => TimeRange {
                from: origin.from,
                to: (origin.to + delta)
                    .max(origin.from + MIN_RANGE_WIDTH_MS)
                    .min(visible.to),
            },
        };
    }

    /// Commit the dragged selection through the regular user update path.
    pub fn end_drag(&mut self) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        self.transition(InteractionEvent::PointerUp);
        let committed = self.timeline;
        self.timeline = drag.origin_timeline;
        self.set_timeline_range(committed, UpdateSource::User);
    }

    pub fn begin_axis_pan(&mut self) {
        self.transition(InteractionEvent::AxisPointerDown);
        if self.mode == InteractionMode::Panning {
            self.pan = Some(PanState {
                origin_visible: self.visible,
                origin_timeline: self.timeline,
            });
        }
    }

    /// Drag the axis by `delta_ms` since the pan started; dragging right
    /// reveals earlier data.
    pub fn pan_axis_by(&mut self, delta_ms: i64) {
        let Some(pan) = self.pan else {
            return;
        };
        self.relative_context_duration = None;
        self.set_visible_range(pan.origin_visible.shifted(-delta_ms), true);
    }

    pub fn end_axis_pan(&mut self) {
        let Some(pan) = self.pan.take() else {
            return;
        };
        self.transition(InteractionEvent::PointerUp);
        if self.timeline != pan.origin_timeline
            && !self.guards.suppress_next_time_range_update.take()
        {
            self.outbox.push(SeekerNotification::TimeRangeChanged {
                range: self.timeline,
            });
        }
    }

    /// Zoom the context window keeping the instant under the cursor in place.
    pub fn wheel_zoom(&mut self, cursor_ms: i64, delta_y: f64) {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        let factor = if delta_y < 0.0 {
            WHEEL_ZOOM_IN
        } else {
            WHEEL_ZOOM_OUT
        };
        let next = self.visible.scaled_around(cursor_ms, factor);
        self.relative_context_duration = None;
        self.set_visible_range(next, true);
    }

    // ---- loading ----

    pub fn set_query(&mut self, query: SeekerQuery) {
        if query == self.query {
            return;
        }
        tracing::info!("Switching seeker query to {}", query.cache_key());
        self.query = query;
        self.cache.check_metric_change(&self.query.cache_key());
    }

    /// Pick the next batch to fetch for the context window and mark it loading.
    /// Returns `None` while a fetch is outstanding or nothing is missing.
    pub fn poll_load(&mut self) -> Option<FetchRequest> {
        if self.cache.check_metric_change(&self.query.cache_key()) {
            tracing::debug!("Cache reset for {}", self.query.cache_key());
        }
        if self.cache.loading_batch_id().is_some() {
            return None;
        }
        let next = self
            .cache
            .next_batch_to_load(self.visible.from, self.visible.to)?;
        self.cache.set_loading_batch(Some(next.batch_id));
        Some(FetchRequest {
            batch_id: next.batch_id,
            window: next.range,
            query: self.query.clone(),
        })
    }

    /// Store a finished fetch. Returns true when more batches are missing.
    pub fn complete_fetch(&mut self, outcome: FetchOutcome) -> bool {
        let FetchOutcome { request, result } = outcome;
        if self.cache.current_metric() != Some(request.query.cache_key().as_str()) {
            tracing::debug!(
                "Dropping batch {} fetched for stale query {}",
                request.batch_id,
                request.query.cache_key()
            );
            return self.has_pending_batches();
        }

        match result {
            Ok(frames) => self.cache.store_batch(
                request.batch_id,
                request.window.from,
                request.window.to,
                frames,
                None,
            ),
            Err(message) => {
                tracing::warn!("Batch {} failed: {}", request.batch_id, message);
                self.cache.store_batch_error(
                    request.batch_id,
                    request.window.from,
                    request.window.to,
                    message,
                );
            }
        }
        self.has_pending_batches()
    }

    pub fn has_pending_batches(&self) -> bool {
        self.cache.loading_batch_id().is_none()
            && self
                .cache
                .next_batch_to_load(self.visible.from, self.visible.to)
                .is_some()
    }

    /// Forget failed batches; the next poll fetches them again.
    pub fn retry_errors(&mut self) {
        self.cache.clear_errors();
    }

    pub fn loading_ranges(&self) -> Vec<TimeRange> {
        self.cache.loading_ranges(self.visible.from, self.visible.to)
    }

    pub fn snapshot(&self) -> SeekerSnapshot {
        let TimeRange { from, to } = self.visible;
        let frames = self.cache.cached_data(from, to);
        let fully_loaded = self.cache.is_fully_loaded(from, to);
        let data_state = if has_enough_points(&frames) {
            DataState::Ready
        } else if fully_loaded {
            DataState::NotEnoughData
        } else {
            DataState::Loading
        };

        SeekerSnapshot {
            query: self.query.clone(),
            visible: self.visible,
            timeline: self.timeline,
            mode: self.mode,
            relative_context_duration: self.relative_context_duration.clone(),
            loading_batch_id: self.cache.loading_batch_id(),
            loading_ranges: self.cache.loading_ranges(from, to),
            errors: self.cache.errors(from, to),
            fully_loaded,
            data_state,
            frames,
        }
    }

    // ---- helpers ----

    fn transition(&mut self, event: InteractionEvent) {
        let next = self.mode.next(event);
        if next != self.mode {
            tracing::trace!("Interaction {:?} -> {:?}", self.mode, next);
            self.mode = next;
        }
    }

    fn programmatic(&mut self, apply: impl FnOnce(&mut Self)) {
        self.transition(InteractionEvent::ProgrammaticBegin);
        apply(self);
        self.transition(InteractionEvent::ProgrammaticEnd);
    }

    /// Window of at least `width` centered on `range`, not ending after now
    /// unless `range` itself does.
    fn window_around(&self, range: TimeRange, width: i64) -> TimeRange {
        let limit = self.cache.now_ms().max(range.to);
        TimeRange::centered_on(range.center(), width.max(range.width())).ending_no_later_than(limit)
    }
}

/// Keep `range`'s relative position when moving from `old` to `new`.
fn remap(range: TimeRange, old: TimeRange, new: TimeRange) -> TimeRange {
    let old_width = old.width().max(MIN_RANGE_WIDTH_MS) as f64;
    let position = |t: i64| (t.saturating_sub(old.from) as f64 / old_width).clamp(0.0, 1.0);
    let project = |p: f64| new.from.saturating_add((p * new.width() as f64).round() as i64);
    TimeRange {
        from: project(position(range.from)),
        to: project(position(range.to)),
    }
    .normalized()
    .clamped_within(&new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::ManualClock;
    use crate::domain::error::SeekerError;
    use crate::domain::series::{MetricKind, ValueField};
    use crate::domain::time_range::{DAY_MS, HOUR_MS};
    use std::sync::Arc;

    // 2024-01-10T12:00:00Z
    const NOW: i64 = 1_704_888_000_000;

    fn engine_with(host: TimeRange) -> SeekerEngine {
        let cache = BatchDataCache::new(Arc::new(ManualClock::new(NOW)));
        SeekerEngine::new(
            cache,
            SeekerQuery::new(MetricKind::Rate, "svc"),
            host,
            EngineSettings::default(),
        )
    }

    fn host_range() -> TimeRange {
        TimeRange {
            from: NOW - 3 * HOUR_MS,
            to: NOW - HOUR_MS,
        }
    }

    fn time_range_changes(engine: &mut SeekerEngine) -> Vec<TimeRange> {
        engine
            .take_notifications()
            .into_iter()
            .filter_map(|n| match n {
                SeekerNotification::TimeRangeChanged { range } => Some(range),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_default_window_centered_and_clamped_to_now() {
        let engine = engine_with(host_range());
        assert_eq!(engine.visible().width(), DAY_MS);
        assert_eq!(engine.visible().to, NOW);
        assert!(engine.visible().contains(&engine.timeline()));
        assert_eq!(engine.relative_context_duration(), Some("24h"));

        let old = TimeRange {
            from: NOW - 10 * DAY_MS,
            to: NOW - 10 * DAY_MS + HOUR_MS,
        };
        let engine = engine_with(old);
        assert_eq!(engine.visible().center(), old.center());
    }

    #[test]
    fn test_pan_left_shifts_by_quarter_width() {
        let mut engine = engine_with(TimeRange { from: 4_000, to: 6_000 });
        engine.set_visible_range(TimeRange { from: 0, to: 10_000 }, true);
        engine.take_notifications();

        engine.pan_context_window(PanDirection::Left);
        assert_eq!(engine.visible(), TimeRange { from: -2_500, to: 7_500 });
        engine.pan_context_window(PanDirection::Right);
        assert_eq!(engine.visible(), TimeRange { from: 0, to: 10_000 });
        assert!(time_range_changes(&mut engine).is_empty());
        assert_eq!(engine.mode(), InteractionMode::Idle);
        assert_eq!(engine.relative_context_duration(), None);
    }

    #[test]
    fn test_zoom_then_inverse_zoom_restores_window() {
        let mut engine = engine_with(TimeRange { from: 4_000, to: 6_000 });
        engine.set_visible_range(TimeRange { from: 0, to: 10_000 }, true);
        engine.zoom_context_window(0.5);
        assert_eq!(engine.visible(), TimeRange { from: 2_500, to: 7_500 });
        engine.zoom_context_window(2.0);
        assert_eq!(engine.visible(), TimeRange { from: 0, to: 10_000 });
    }

    #[test]
    fn test_zoom_in_clamps_selection_and_reports_it() {
        let mut engine = engine_with(TimeRange { from: 500, to: 1_500 });
        engine.set_visible_range(TimeRange { from: 0, to: 10_000 }, true);
        engine.take_notifications();

        engine.zoom_context_window(0.5);
        let changes = time_range_changes(&mut engine);
        assert_eq!(changes, vec![TimeRange { from: 2_500, to: 3_500 }]);
        assert!(engine.visible().contains(&engine.timeline()));
    }

    #[test]
    fn test_invalid_zoom_factor_ignored() {
        let mut engine = engine_with(host_range());
        let before = engine.visible();
        engine.zoom_context_window(0.0);
        engine.zoom_context_window(f64::NAN);
        assert_eq!(engine.visible(), before);
    }

    #[test]
    fn test_dashboard_change_does_not_bounce() {
        let mut engine = engine_with(host_range());
        engine.take_notifications();

        let moved = TimeRange {
            from: NOW - 5 * DAY_MS,
            to: NOW - 5 * DAY_MS + HOUR_MS,
        };
        engine.handle_dashboard_range_change(moved);
        assert_eq!(engine.timeline(), moved);
        assert!(engine.visible().contains(&moved));
        assert_eq!(engine.visible().width(), DAY_MS);

        let notifications = engine.take_notifications();
        assert!(notifications
            .iter()
            .all(|n| matches!(n, SeekerNotification::VisibleRangeChanged { .. })));

        // The host echoing our own state is a no-op.
        engine.handle_dashboard_range_change(moved);
        assert!(engine.take_notifications().is_empty());

        // And the suppression does not leak into the next user change.
        let user = TimeRange {
            from: moved.from + 1,
            to: moved.to,
        };
        assert!(engine.on_chart_select(user));
        assert_eq!(time_range_changes(&mut engine), vec![user]);
    }

    #[test]
    fn test_dashboard_change_with_match_host_preset() {
        let mut engine = engine_with(host_range());
        assert!(engine.apply_context_input("0h"));
        assert_eq!(engine.visible(), engine.timeline());

        let next = TimeRange {
            from: NOW - 2 * DAY_MS,
            to: NOW - DAY_MS,
        };
        engine.handle_dashboard_range_change(next);
        assert_eq!(engine.visible(), next);
        assert_eq!(engine.timeline(), next);
    }

    #[test]
    fn test_dashboard_change_after_manual_zoom_keeps_window_when_inside() {
        let mut engine = engine_with(host_range());
        engine.zoom_context_window(2.0);
        let visible = engine.visible();
        let inside = TimeRange {
            from: visible.from + HOUR_MS,
            to: visible.from + 2 * HOUR_MS,
        };
        engine.handle_dashboard_range_change(inside);
        assert_eq!(engine.visible(), visible);
        assert_eq!(engine.timeline(), inside);
    }

    #[test]
    fn test_reset_restores_default_window() {
        let mut engine = engine_with(host_range());
        let initial = engine.visible();
        engine.zoom_context_window(0.5);
        engine.pan_context_window(PanDirection::Left);
        engine.reset_context_window();
        assert_eq!(engine.visible(), initial);
        assert_eq!(engine.relative_context_duration(), Some("24h"));
    }

    #[test]
    fn test_presets() {
        let mut engine = engine_with(host_range());
        assert!(engine.apply_context_input("7d"));
        assert_eq!(engine.visible().width(), 7 * DAY_MS);
        assert_eq!(engine.visible().to, NOW);
        assert_eq!(engine.relative_context_duration(), Some("7d"));

        let before = engine.visible();
        assert!(!engine.apply_context_input("seven days"));
        assert_eq!(engine.visible(), before);
    }

    #[test]
    fn test_absolute_context_validation_and_remap() {
        let mut engine = engine_with(TimeRange { from: 2_000, to: 4_000 });
        engine.set_visible_range(TimeRange { from: 0, to: 10_000 }, true);
        engine.take_notifications();

        assert!(engine.apply_absolute_context(5_000, 5_000).is_err());
        assert!(engine.apply_absolute_context(6_000, 1_000).is_err());
        assert_eq!(engine.visible(), TimeRange { from: 0, to: 10_000 });

        engine.apply_absolute_context(20_000, 40_000).unwrap();
        assert_eq!(engine.visible(), TimeRange { from: 20_000, to: 40_000 });
        assert_eq!(engine.timeline(), TimeRange { from: 24_000, to: 28_000 });
        assert_eq!(
            time_range_changes(&mut engine),
            vec![TimeRange { from: 24_000, to: 28_000 }]
        );
        assert_eq!(engine.relative_context_duration(), None);
    }

    #[test]
    fn test_extreme_input_stays_bounded() {
        let mut engine = engine_with(host_range());

        engine.zoom_context_window(1e12);
        assert_eq!(engine.visible().width(), MAX_CONTEXT_WIDTH_MS);
        assert!(engine.visible().contains(&engine.timeline()));
        engine.wheel_zoom(i64::MAX, 1.0);
        engine.pan_context_window(PanDirection::Right);
        assert!(engine.visible().width() <= MAX_CONTEXT_WIDTH_MS);

        let before = engine.visible();
        let huge = 9_000_000_000_000_000_000_i64;
        assert!(matches!(
            engine.apply_absolute_context(-huge, huge),
            Err(SeekerError::OutOfBounds { .. })
        ));
        assert!(matches!(
            engine.apply_absolute_context(0, MAX_CONTEXT_WIDTH_MS + 1),
            Err(SeekerError::RangeTooWide { .. })
        ));
        assert!(!engine.apply_context_input("2000000w"));
        assert_eq!(engine.visible(), before);

        // One loading range per daily batch at most.
        let snapshot = engine.snapshot();
        assert!(snapshot.loading_ranges.len() <= (MAX_CONTEXT_WIDTH_MS / DAY_MS + 2) as usize);
    }

    #[test]
    fn test_host_range_wider_than_context_limit_is_clamped() {
        let mut engine = engine_with(host_range());
        let wide = TimeRange {
            from: NOW - 2 * MAX_CONTEXT_WIDTH_MS,
            to: NOW,
        };
        engine.handle_dashboard_range_change(wide);
        assert_eq!(engine.visible().width(), MAX_CONTEXT_WIDTH_MS);
        assert!(engine.visible().contains(&engine.timeline()));
        assert!(time_range_changes(&mut engine).is_empty());
    }

    #[test]
    fn test_drag_move_commits_once_on_release() {
        let mut engine = engine_with(TimeRange { from: 2_000, to: 4_000 });
        engine.set_visible_range(TimeRange { from: 0, to: 10_000 }, true);
        engine.take_notifications();

        engine.begin_drag(DragKind::Move, 3_000);
        assert_eq!(engine.mode(), InteractionMode::Dragging);
        engine.drag_to(4_000);
        engine.drag_to(5_000);
        assert_eq!(engine.timeline(), TimeRange { from: 4_000, to: 6_000 });
        assert!(!engine.on_chart_select(TimeRange { from: 0, to: 1 }));
        assert!(time_range_changes(&mut engine).is_empty());

        engine.end_drag();
        assert_eq!(engine.mode(), InteractionMode::Idle);
        assert_eq!(
            time_range_changes(&mut engine),
            vec![TimeRange { from: 4_000, to: 6_000 }]
        );
    }

    #[test]
    fn test_drag_handles_stay_ordered_and_inside() {
        let mut engine = engine_with(TimeRange { from: 2_000, to: 4_000 });
        engine.set_visible_range(TimeRange { from: 0, to: 10_000 }, true);

        engine.begin_drag(DragKind::Left, 2_000);
        engine.drag_to(9_000);
        assert_eq!(engine.timeline(), TimeRange { from: 3_999, to: 4_000 });
        engine.drag_to(-5_000);
        assert_eq!(engine.timeline(), TimeRange { from: 0, to: 4_000 });
        engine.end_drag();

        engine.begin_drag(DragKind::Right, 4_000);
        engine.drag_to(20_000);
        assert_eq!(engine.timeline(), TimeRange { from: 0, to: 10_000 });
        engine.end_drag();

        engine.begin_drag(DragKind::Move, 5_000);
        engine.drag_to(8_000);
        assert_eq!(engine.timeline(), TimeRange { from: 0, to: 10_000 });
        engine.end_drag();
    }

    #[test]
    fn test_echoed_selection_is_skipped_once() {
        let mut engine = engine_with(host_range());
        engine.take_notifications();
        engine.expect_selection_echo();
        let timeline = engine.timeline();
        let selected = TimeRange {
            from: timeline.from + 10,
            to: timeline.to,
        };
        assert!(!engine.on_chart_select(selected));
        assert_eq!(engine.timeline(), timeline);
        assert!(engine.on_chart_select(selected));
        assert_eq!(engine.timeline(), selected);
    }

    #[test]
    fn test_axis_pan() {
        let mut engine = engine_with(TimeRange { from: 4_000, to: 6_000 });
        engine.set_visible_range(TimeRange { from: 0, to: 10_000 }, true);
        engine.take_notifications();

        engine.begin_axis_pan();
        assert_eq!(engine.mode(), InteractionMode::Panning);
        engine.pan_axis_by(1_000);
        assert_eq!(engine.visible(), TimeRange { from: -1_000, to: 9_000 });
        engine.pan_axis_by(7_000);
        assert_eq!(engine.visible(), TimeRange { from: -7_000, to: 3_000 });
        assert_eq!(engine.timeline(), TimeRange { from: 1_000, to: 3_000 });
        assert!(time_range_changes(&mut engine).is_empty());

        engine.end_axis_pan();
        assert_eq!(engine.mode(), InteractionMode::Idle);
        assert_eq!(
            time_range_changes(&mut engine),
            vec![TimeRange { from: 1_000, to: 3_000 }]
        );
    }

    #[test]
    fn test_wheel_zoom_anchors_at_cursor() {
        let mut engine = engine_with(TimeRange { from: 4_000, to: 6_000 });
        engine.set_visible_range(TimeRange { from: 0, to: 10_000 }, true);

        engine.wheel_zoom(2_000, -120.0);
        assert_eq!(engine.visible(), TimeRange { from: 400, to: 8_400 });
        engine.wheel_zoom(2_000, 120.0);
        assert_eq!(engine.visible(), TimeRange { from: 0, to: 10_000 });
        engine.wheel_zoom(2_000, 0.0);
        assert_eq!(engine.visible(), TimeRange { from: 0, to: 10_000 });
    }

    #[test]
    fn test_loading_pipeline_most_recent_first() {
        let mut engine = engine_with(host_range());
        engine.apply_context_input("3d");
        let anchor = engine.cache().anchor();

        let first = engine.poll_load().unwrap();
        assert_eq!(first.batch_id, 0);
        assert_eq!(first.window, TimeRange { from: anchor, to: NOW });
        assert_eq!(engine.poll_load(), None);

        let frames = vec![Frame::new(vec![anchor, anchor + 1], vec![ValueField::new("v", vec![1.0, 2.0])])];
        assert!(engine.complete_fetch(FetchOutcome {
            request: first,
            result: Ok(frames),
        }));

        let mut ids = Vec::new();
        while let Some(request) = engine.poll_load() {
            ids.push(request.batch_id);
            engine.complete_fetch(FetchOutcome {
                request,
                result: Ok(Vec::new()),
            });
        }
        assert_eq!(ids, vec![-1, -2, -3]);
        let snapshot = engine.snapshot();
        assert!(snapshot.fully_loaded);
        assert!(snapshot.loading_ranges.is_empty());
        assert_eq!(snapshot.data_state, DataState::Ready);
    }

    #[test]
    fn test_failed_batch_is_not_retried_until_requested() {
        let mut engine = engine_with(host_range());
        engine.apply_context_input("0h");

        let request = engine.poll_load().unwrap();
        let batch_id = request.batch_id;
        assert!(!engine.complete_fetch(FetchOutcome {
            request,
            result: Err("upstream timeout".to_string()),
        }));
        assert_eq!(engine.poll_load(), None);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.errors, vec!["upstream timeout".to_string()]);
        assert!(snapshot.fully_loaded);
        assert_eq!(snapshot.data_state, DataState::NotEnoughData);

        engine.retry_errors();
        assert_eq!(engine.poll_load().unwrap().batch_id, batch_id);
    }

    #[test]
    fn test_query_change_resets_cache_and_drops_stale_results() {
        let mut engine = engine_with(host_range());
        let request = engine.poll_load().unwrap();

        engine.set_query(SeekerQuery::new(MetricKind::Duration, "svc"));
        assert!(engine.cache().is_empty());
        engine.complete_fetch(FetchOutcome {
            request,
            result: Ok(Vec::new()),
        });
        assert!(engine.cache().is_empty());

        let request = engine.poll_load().unwrap();
        assert_eq!(request.query.metric, MetricKind::Duration);
    }
}
