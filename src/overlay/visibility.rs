use crate::bus::VisibilityFile;
use crate::model::VisibilityState;

use super::focus::{is_game_focused, FocusProbe};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    Hidden,
    Visible,
}

/// The overlay is shown only while the session is enabled, the last frame
/// had detections and the game has focus.
pub fn should_show(state: VisibilityState, focused: bool) -> bool {
    state.enabled && state.detected && focused
}

/// `HIDDEN <-> VISIBLE` state machine, re-evaluated on the visibility ticker.
#[derive(Debug)]
pub struct VisibilityGate {
    file: VisibilityFile,
    game_title: String,
    state: GateState,
}

impl VisibilityGate {
    pub fn new(file: VisibilityFile, game_title: impl Into<String>) -> Self {
        Self {
            file,
            game_title: game_title.into(),
            state: GateState::Hidden,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Re-read the state file and focus; returns the new state on a transition.
    ///
    /// Focus is only queried when the file already allows showing.
    pub fn evaluate(&mut self, probe: &mut dyn FocusProbe) -> Option<GateState> {
        let persisted = self.file.try_read_latest();
        let show = persisted.enabled
            && persisted.detected
            && should_show(persisted, is_game_focused(probe, &self.game_title));
        let next = if show {
            GateState::Visible
        } else {
            GateState::Hidden
        };
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_three_conditions_are_required() {
        for enabled in [false, true] {
            for detected in [false, true] {
                for focused in [false, true] {
                    let state = VisibilityState { enabled, detected };
                    assert_eq!(
                        should_show(state, focused),
                        enabled && detected && focused,
                        "enabled={enabled} detected={detected} focused={focused}"
                    );
                }
            }
        }
    }
}
