// Interaction mode state machine and one-shot update guards
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    #[default]
    Idle,
    Dragging,
    Panning,
    Programmatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEvent {
    /// Pointer pressed on the selection brush or one of its handles.
    BrushPointerDown,
    /// Pointer pressed on the time axis.
    AxisPointerDown,
    PointerUp,
    ProgrammaticBegin,
    ProgrammaticEnd,
}

impl InteractionMode {
    /// The only place the mode changes. Events that make no sense in the
    /// current mode leave it untouched.
    pub fn next(self, event: InteractionEvent) -> InteractionMode {
        use InteractionEvent::*;
        use InteractionMode::*;

        match (self, event) {
            (Idle, BrushPointerDown) => Dragging,
            (Idle, AxisPointerDown) => Panning,
            (Idle, ProgrammaticBegin) => Programmatic,
            (Dragging, PointerUp) | (Panning, PointerUp) => Idle,
            (Programmatic, ProgrammaticEnd) => Idle,
            (mode, _) => mode,
        }
    }

    /// Selection updates reported by the chart are ignored while the user
    /// holds the pointer.
    pub fn accepts_external_selection(self) -> bool {
        !matches!(self, InteractionMode::Dragging | InteractionMode::Panning)
    }
}

/// A flag that is consumed by the first check after it was armed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneShot(bool);

impl OneShot {
    pub fn arm(&mut self) {
        self.0 = true;
    }

    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.0)
    }

    pub fn is_armed(&self) -> bool {
        self.0
    }
}

/// Guards breaking the host ⇄ seeker ⇄ chart update cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateGuards {
    /// The next timeline clamp caused by a visible range change stays local.
    pub suppress_next_dashboard_update: OneShot,
    /// The next user timeline change is not reported to the host.
    pub suppress_next_time_range_update: OneShot,
    /// The next selection event from the chart echoes our own write.
    pub skip_next_select_update: OneShot,
}
