// Chart binding - Pixel-space hooks between a chart surface and the seeker engine
use crate::application::interaction::InteractionMode;
use crate::application::seeker_engine::{DragKind, SeekerEngine};
use crate::domain::chart::ChartConfig;
use crate::domain::time_range::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub left: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerTarget {
    Wheel,
    AxisPointerDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Non-passive listeners may cancel the browser default (page scroll).
    pub passive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// What the drawing library offers: one numeric x axis, a selection
/// rectangle, overlay painting and event listeners.
pub trait ChartSurface {
    fn plot_left(&self) -> f64;

    fn plot_width(&self) -> f64;

    fn pos_to_val(&self, px: f64) -> f64;

    fn val_to_pos(&self, value: f64) -> f64;

    fn set_selection(&mut self, rect: PixelRect);

    fn fill_overlays(&mut self, rects: &[PixelRect]);

    fn add_listener(&mut self, target: ListenerTarget, options: ListenerOptions) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChartEvent {
    /// The chart's own selection changed (pixels relative to the plot).
    Select { left: f64, width: f64 },
    BrushPointerDown { x: f64, handle: DragKind },
    AxisPointerDown { x: f64 },
    PointerMove { x: f64 },
    PointerUp { x: f64 },
    Wheel { x: f64, delta_y: f64 },
}

/// Listeners registered by [`ChartBinding::attach`]; hand back to detach.
#[derive(Debug)]
#[must_use = "listeners stay registered until detached"]
pub struct Attachment {
    listeners: Vec<ListenerId>,
}

impl Attachment {
    pub fn detach(self, surface: &mut dyn ChartSurface) {
        for id in self.listeners {
            surface.remove_listener(id);
        }
    }
}

#[derive(Debug, Default)]
pub struct ChartBinding {
    attached: bool,
    axis_pan: Option<AxisPan>,
}

#[derive(Debug, Clone, Copy)]
struct AxisPan {
    origin_px: f64,
    ms_per_px: f64,
}

impl ChartBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self, engine: &SeekerEngine) -> ChartConfig {
        ChartConfig::for_metric(engine.query().metric, engine.visible())
    }

    /// Ready hook: register the wheel and axis listeners.
    pub fn attach(&mut self, surface: &mut dyn ChartSurface) -> Attachment {
        let wheel = surface.add_listener(ListenerTarget::Wheel, ListenerOptions { passive: false });
        let axis = surface.add_listener(
            ListenerTarget::AxisPointerDown,
            ListenerOptions { passive: true },
        );
        self.attached = true;
        Attachment {
            listeners: vec![wheel, axis],
        }
    }

    /// Destroy hook.
    pub fn detach(&mut self, attachment: Attachment, surface: &mut dyn ChartSurface) {
        attachment.detach(surface);
        self.attached = false;
        self.axis_pan = None;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Route one chart event into the engine. Returns true when the event was
    /// consumed and its default action should be prevented.
    pub fn handle_event(
        &mut self,
        engine: &mut SeekerEngine,
        surface: &dyn ChartSurface,
        event: ChartEvent,
    ) -> bool {
        match event {
            ChartEvent::Select { left, width } => {
                let range = TimeRange {
                    from: to_ms(surface.pos_to_val(left)),
                    to: to_ms(surface.pos_to_val(left + width)),
                };
                engine.on_chart_select(range)
            }
            ChartEvent::BrushPointerDown { x, handle } => {
                engine.begin_drag(handle, to_ms(surface.pos_to_val(x)));
                engine.mode() == InteractionMode::Dragging
            }
            ChartEvent::AxisPointerDown { x } => {
                if !self.attached {
                    return false;
                }
                engine.begin_axis_pan();
                if engine.mode() != InteractionMode::Panning {
                    return false;
                }
                let width = surface.plot_width().max(1.0);
                self.axis_pan = Some(AxisPan {
                    origin_px: x,
                    ms_per_px: engine.visible().width() as f64 / width,
                });
                true
            }
            ChartEvent::PointerMove { x } => self.pointer_moved(engine, surface, x),
            ChartEvent::PointerUp { x } => {
                let moved = self.pointer_moved(engine, surface, x);
                match engine.mode() {
                    InteractionMode::Dragging => engine.end_drag(),
                    InteractionMode::Panning => {
                        engine.end_axis_pan();
                        self.axis_pan = None;
                    }
                    _ => {}
                }
                moved
            }
            ChartEvent::Wheel { x, delta_y } => {
                if !self.attached {
                    return false;
                }
                engine.wheel_zoom(to_ms(surface.pos_to_val(x)), delta_y);
                true
            }
        }
    }

    fn pointer_moved(&mut self, engine: &mut SeekerEngine, surface: &dyn ChartSurface, x: f64) -> bool {
        match engine.mode() {
            InteractionMode::Dragging => {
                engine.drag_to(to_ms(surface.pos_to_val(x)));
                true
            }
            InteractionMode::Panning => {
                let Some(pan) = self.axis_pan else {
                    return false;
                };
                engine.pan_axis_by(((x - pan.origin_px) * pan.ms_per_px).round() as i64);
                true
            }
            _ => false,
        }
    }

    /// Write the engine's selection onto the chart.
    pub fn sync_selection(&self, engine: &mut SeekerEngine, surface: &mut dyn ChartSurface) {
        let timeline = engine.timeline();
        let left = surface.val_to_pos(timeline.from as f64);
        let right = surface.val_to_pos(timeline.to as f64);
        if engine.mode().accepts_external_selection() {
            engine.expect_selection_echo();
        }
        surface.set_selection(PixelRect {
            left,
            width: (right - left).max(0.0),
        });
    }

    /// Paint the still-loading parts of the context window.
    pub fn draw_loading_overlays(&self, engine: &SeekerEngine, surface: &mut dyn ChartSurface) {
        let plot_left = surface.plot_left();
        let plot_right = plot_left + surface.plot_width();
        let rects: Vec<PixelRect> = engine
            .loading_ranges()
            .into_iter()
            .filter_map(|range| {
                let left = surface.val_to_pos(range.from as f64).max(plot_left);
                let right = surface.val_to_pos(range.to as f64).min(plot_right);
                (right > left).then_some(PixelRect {
                    left,
                    width: right - left,
                })
            })
            .collect();
        surface.fill_overlays(&rects);
    }
}

fn to_ms(value: f64) -> i64 {
    value.round() as i64
}
