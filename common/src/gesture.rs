use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Hand orientation in degrees. Each axis is derived independently.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Hand position in screen space, both axes in -1..1 with `y` growing upward.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Translation {
    pub x: f64,
    pub y: f64,
}

/// The interaction a consumer should apply. Exactly one is active at a time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// No hand, nothing to apply.
    #[default]
    None,
    Rotate,
    /// Reserved on the wire; never produced by the current classification rules.
    Translate,
    Zoom,
    /// Closed fist: consumers return their model to its initial pose.
    Reset,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::None => "none",
            Action::Rotate => "rotate",
            Action::Translate => "translate",
            Action::Zoom => "zoom",
            Action::Reset => "reset",
        };
        write!(f, "{}", name)
    }
}

/// The record pushed to every consumer on every tick.
///
/// Serialized as a flat JSON object:
/// `{"detected":true,"rotation":{"x":..,"y":..,"z":..},"translation":{"x":..,"y":..},"zoom":1.0,"action":"rotate"}`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GestureState {
    /// Was a hand present in the most recent frame.
    pub detected: bool,
    pub rotation: Rotation,
    pub translation: Translation,
    /// Zoom factor, 0.5 while pinching and 1.0 otherwise.
    pub zoom: f64,
    pub action: Action,
}

impl Default for GestureState {
    fn default() -> Self {
        Self {
            detected: false,
            rotation: Rotation::default(),
            translation: Translation::default(),
            zoom: 1.0,
            action: Action::None,
        }
    }
}

impl Display for GestureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Gesture | detected:{}, action:{}, rotation:({:.1}, {:.1}, {:.1}), translation:({:.2}, {:.2}), zoom:{}>",
            self.detected,
            self.action,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
            self.translation.x,
            self.translation.y,
            self.zoom
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = GestureState::default();
        assert!(!state.detected);
        assert_eq!(state.rotation, Rotation::default());
        assert_eq!(state.translation, Translation::default());
        assert_eq!(state.zoom, 1.0);
        assert_eq!(state.action, Action::None);
    }

    #[test]
    fn test_wire_format() {
        let state = GestureState {
            detected: true,
            rotation: Rotation {
                x: 90.0,
                y: 7.5,
                z: -45.0,
            },
            translation: Translation { x: 0.5, y: -0.25 },
            zoom: 0.5,
            action: Action::Zoom,
        };

        let json = serde_json::to_value(state).expect("Failed to serialize state");
        assert_eq!(
            json,
            serde_json::json!({
                "detected": true,
                "rotation": {"x": 90.0, "y": 7.5, "z": -45.0},
                "translation": {"x": 0.5, "y": -0.25},
                "zoom": 0.5,
                "action": "zoom"
            })
        );
    }

    #[test]
    fn test_consumer_parses_what_the_server_sends() {
        let state = GestureState {
            detected: true,
            rotation: Rotation {
                x: 12.25,
                y: -3.5,
                z: 170.0,
            },
            translation: Translation { x: -1.0, y: 1.0 },
            zoom: 1.0,
            action: Action::Reset,
        };

        let text = serde_json::to_string(&state).expect("Failed to serialize state");
        let parsed: GestureState = serde_json::from_str(&text).expect("Failed to parse state");
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_action_names() {
        for (action, name) in [
            (Action::None, "none"),
            (Action::Rotate, "rotate"),
            (Action::Translate, "translate"),
            (Action::Zoom, "zoom"),
            (Action::Reset, "reset"),
        ] {
            assert_eq!(action.to_string(), name);
            assert_eq!(
                serde_json::to_string(&action).expect("Failed to serialize action"),
                format!("\"{}\"", name)
            );
        }
    }
}
