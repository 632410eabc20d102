//! Interaction state machine for a modal retopology tool.
//!
//! Pure transition table: hosts feed input events and execute the
//! returned effect against the [`Session`](super::Session). The machine
//! itself never touches geometry.

/// Where the interaction currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalState {
    /// Idle, ready for any gesture.
    #[default]
    Waiting,
    /// A guide stroke is being drawn.
    Drawing,
    /// A two-point cut line is being dragged.
    Cutting,
    /// A keyboard-initiated transform (grab, rotate, shift scrub).
    HotkeyTransform,
    /// A transform driven by dragging an on-screen widget.
    WidgetTransform,
    /// Viewport navigation passes events through untouched.
    Navigating,
}

/// Host input, already classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalEvent {
    PressDraw,
    PressCut,
    BeginHotkey,
    BeginWidgetDrag,
    BeginNavigate,
    EndNavigate,
    Release,
    Confirm,
    Cancel,
}

/// What the host should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalEffect {
    None,
    /// Run the stroke pipeline on the captured points.
    CommitStroke,
    /// Build a cut from the dragged line.
    CommitCut,
    /// Keep the transform applied during the gesture.
    CommitTransform,
    /// Throw away the in-flight gesture and restore the pre-gesture view.
    DiscardGesture,
    /// Leave the tool, keeping the session for finalization.
    Finish,
    /// Leave the tool, dropping the session.
    Abort,
}

/// One step of the interaction machine.
#[must_use]
pub fn transition(state: ModalState, event: ModalEvent) -> (ModalState, ModalEffect) {
    use ModalEffect as Fx;
    use ModalEvent as Ev;
    use ModalState as St;

    match (state, event) {
        (St::Waiting, Ev::PressDraw) => (St::Drawing, Fx::None),
        (St::Waiting, Ev::PressCut) => (St::Cutting, Fx::None),
        (St::Waiting, Ev::BeginHotkey) => (St::HotkeyTransform, Fx::None),
        (St::Waiting, Ev::BeginWidgetDrag) => (St::WidgetTransform, Fx::None),
        (St::Waiting, Ev::BeginNavigate) => (St::Navigating, Fx::None),
        (St::Waiting, Ev::Confirm) => (St::Waiting, Fx::Finish),
        (St::Waiting, Ev::Cancel) => (St::Waiting, Fx::Abort),

        (St::Drawing, Ev::Release) => (St::Waiting, Fx::CommitStroke),
        (St::Drawing, Ev::Cancel) => (St::Waiting, Fx::DiscardGesture),

        (St::Cutting, Ev::Release) => (St::Waiting, Fx::CommitCut),
        (St::Cutting, Ev::Cancel) => (St::Waiting, Fx::DiscardGesture),

        (St::HotkeyTransform, Ev::Confirm | Ev::Release) => {
            (St::Waiting, Fx::CommitTransform)
        }
        (St::HotkeyTransform, Ev::Cancel) => (St::Waiting, Fx::DiscardGesture),

        (St::WidgetTransform, Ev::Release) => (St::Waiting, Fx::CommitTransform),
        (St::WidgetTransform, Ev::Cancel) => (St::Waiting, Fx::DiscardGesture),

        (St::Navigating, Ev::EndNavigate) => (St::Waiting, Fx::None),

        // Anything else is ignored in place
        (state, _) => (state, ModalEffect::None),
    }
}
