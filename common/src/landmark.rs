use std::{fmt::Display, ops::Index};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of points in the standard hand topology.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// One point of a tracked hand skeleton. `x` and `y` are normalized image
/// coordinates (0..1, `y` grows downward), `z` is relative depth.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Display for Landmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// A complete hand: exactly [`LANDMARK_COUNT`] points, indexed by the
/// constants in this module.
///
/// Can only be built through `TryFrom<Vec<Landmark>>`, so holding one means
/// every index constant is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    points: [Landmark; LANDMARK_COUNT],
}

/// Represents a landmark set that can't describe a hand.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LandmarkError {
    /// The detector handed over the wrong number of points.
    #[error("Expected {expected} landmarks per hand but got {found}.")]
    WrongCount { expected: usize, found: usize },

    /// A coordinate was NaN or infinite.
    #[error("Landmark {index} has a non-finite coordinate.")]
    NonFinite { index: usize },
}

impl HandLandmarks {
    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.points
    }
}

impl TryFrom<Vec<Landmark>> for HandLandmarks {
    type Error = LandmarkError;

    fn try_from(value: Vec<Landmark>) -> Result<Self, Self::Error> {
        let points: [Landmark; LANDMARK_COUNT] =
            value
                .try_into()
                .map_err(|rejected: Vec<Landmark>| LandmarkError::WrongCount {
                    expected: LANDMARK_COUNT,
                    found: rejected.len(),
                })?;

        if let Some(index) = points.iter().position(|point| !point.is_finite()) {
            return Err(LandmarkError::NonFinite { index });
        }

        Ok(Self { points })
    }
}

impl Index<usize> for HandLandmarks {
    type Output = Landmark;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

/// One line of detector output: every hand found in a single image frame.
/// An empty `hands` list means no hand was detected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub hands: Vec<DetectedHand>,
}

/// Raw detector output for one hand. The point count is not checked until
/// it is converted into [`HandLandmarks`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DetectedHand {
    pub landmarks: Vec<Landmark>,

    /// Detector confidence, when the detector reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(count: usize) -> Vec<Landmark> {
        (0..count)
            .map(|i| Landmark::new(i as f64 / 100f64, 0.5, 0.0))
            .collect()
    }

    #[test]
    fn test_hand_requires_exactly_21_points() {
        assert_eq!(
            HandLandmarks::try_from(points(20)),
            Err(LandmarkError::WrongCount {
                expected: 21,
                found: 20
            })
        );
        assert_eq!(
            HandLandmarks::try_from(points(22)),
            Err(LandmarkError::WrongCount {
                expected: 21,
                found: 22
            })
        );

        let hand = HandLandmarks::try_from(points(21)).expect("Failed to build hand");
        assert_eq!(hand[PINKY_TIP].x, 0.2);
        assert_eq!(hand.points().len(), LANDMARK_COUNT);
    }

    #[test]
    fn test_hand_rejects_non_finite_points() {
        let mut raw = points(21);
        raw[THUMB_TIP].y = f64::NAN;
        assert_eq!(
            HandLandmarks::try_from(raw),
            Err(LandmarkError::NonFinite { index: THUMB_TIP })
        );
    }

    #[test]
    fn test_frame_parses_with_missing_optional_fields() {
        let frame: LandmarkFrame = serde_json::from_str("{}").expect("Failed to parse frame");
        assert!(frame.hands.is_empty());

        let frame: LandmarkFrame =
            serde_json::from_str(r#"{"hands":[{"landmarks":[{"x":0.1,"y":0.2}]}]}"#)
                .expect("Failed to parse frame");
        assert_eq!(frame.hands[0].score, None);
        assert_eq!(frame.hands[0].landmarks[0], Landmark::new(0.1, 0.2, 0.0));
    }
}
