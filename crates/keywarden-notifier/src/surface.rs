//! Notification surface state
//!
//! A reducer over store snapshots and user actions. The panel opens on its
//! own when a snapshot holds an error the previous one did not; it only
//! closes on a user action.

use std::collections::HashSet;

use keywarden_core::ErrorEvent;

/// What a snapshot means relative to the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing unseen
    Idle,
    /// At least one error absent from the previous snapshot
    NewArrival,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    None,
    /// Force the panel open
    Reveal,
}

/// Inputs the surface reacts to
#[derive(Debug, Clone)]
pub enum Action {
    /// Fresh store read; replaces the list wholesale
    Snapshot(Vec<ErrorEvent>),
    OpenPanel,
    ClosePanel,
}

/// Published view of the surface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceView {
    pub errors: Vec<ErrorEvent>,
    pub panel_open: bool,
    /// Effect of the transition that produced this view
    pub effect: Effect,
    /// Incremented on every transition
    pub revision: u64,
}

impl SurfaceView {
    pub fn count(&self) -> usize {
        self.errors.len()
    }
}

/// Reducer state
#[derive(Debug, Default)]
pub struct Surface {
    view: SurfaceView,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn view(&self) -> &SurfaceView {
        &self.view
    }

    /// Apply one input and return the resulting effect
    pub fn apply(&mut self, action: Action) -> Effect {
        let effect = match action {
            Action::Snapshot(errors) => {
                let phase = phase_of(&self.view.errors, &errors);
                self.view.errors = errors;
                transition(phase)
            }
            Action::OpenPanel => {
                self.view.panel_open = true;
                Effect::None
            }
            Action::ClosePanel => {
                self.view.panel_open = false;
                Effect::None
            }
        };

        if effect == Effect::Reveal {
            self.view.panel_open = true;
        }

        self.view.effect = effect;
        self.view.revision += 1;
        effect
    }
}

/// Compare consecutive snapshots
///
/// The store evicts its oldest entry when full, so a count that holds steady
/// can still carry a new error.
fn phase_of(previous: &[ErrorEvent], next: &[ErrorEvent]) -> Phase {
    let seen: HashSet<&str> = previous.iter().map(|e| e.id.as_str()).collect();

    if next.len() > previous.len() || next.iter().any(|e| !seen.contains(e.id.as_str())) {
        Phase::NewArrival
    } else {
        Phase::Idle
    }
}

/// `{Idle, NewArrival} -> effect`
const fn transition(phase: Phase) -> Effect {
    match phase {
        Phase::Idle => Effect::None,
        Phase::NewArrival => Effect::Reveal,
    }
}
