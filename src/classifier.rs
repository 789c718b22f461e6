use common::{
    gesture::{Action, GestureState, Rotation, Translation},
    landmark::{
        HandLandmarks, INDEX_MCP, INDEX_TIP, MIDDLE_MCP, MIDDLE_TIP, PINKY_MCP, PINKY_TIP,
        RING_MCP, RING_TIP, THUMB_IP, THUMB_TIP, WRIST,
    },
};

use crate::config::SensitivityConfig;

/// Thumb/pinky spread of a hand facing the camera flat on.
const DEPTH_BASELINE: f64 = 0.1;
const DEPTH_SCALE_DEGREES: f64 = 180.0;

const PINCH_ZOOM: f64 = 0.5;
const NEUTRAL_ZOOM: f64 = 1.0;

/// Folded fingers (out of five) needed for a fist.
const FIST_MIN_FOLDED: usize = 4;

/// (tip, base joint) of the four non-thumb fingers.
const FINGERS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_MCP),
    (MIDDLE_TIP, MIDDLE_MCP),
    (RING_TIP, RING_MCP),
    (PINKY_TIP, PINKY_MCP),
];

/// Turn one frame's hand into a gesture record.
///
/// With no hand the numeric fields of `previous` are kept, `detected` is
/// cleared and the action drops to `none`. With a hand every field is derived
/// from the landmarks alone; `previous` is not consulted. The result only
/// depends on the arguments.
pub fn classify(
    hand: Option<&HandLandmarks>,
    sensitivity: &SensitivityConfig,
    previous: &GestureState,
) -> GestureState {
    let Some(hand) = hand else {
        return GestureState {
            detected: false,
            action: Action::None,
            ..*previous
        };
    };

    let rotation = hand_rotation(hand, sensitivity.rotation_multiplier);
    let translation = hand_translation(hand);
    let pinching = is_pinching(hand, sensitivity.pinch_threshold);
    let fist = is_fist(hand);

    let action = if fist {
        Action::Reset
    } else if pinching {
        Action::Zoom
    } else {
        Action::Rotate
    };

    GestureState {
        detected: true,
        rotation,
        translation,
        zoom: if pinching { PINCH_ZOOM } else { NEUTRAL_ZOOM },
        action,
    }
}

/// Orientation from the palm (wrist to middle base) and knuckle line
/// (pinky base to index base) angles, in degrees.
///
/// `y` is only a proxy for out-of-plane rotation: it grows with the
/// horizontal spread between the thumb and pinky tips. It is not a 3D pose.
pub fn hand_rotation(hand: &HandLandmarks, multiplier: f64) -> Rotation {
    let wrist = hand[WRIST];
    let middle_base = hand[MIDDLE_MCP];
    let index_base = hand[INDEX_MCP];
    let pinky_base = hand[PINKY_MCP];

    let palm_angle = (middle_base.y - wrist.y)
        .atan2(middle_base.x - wrist.x)
        .to_degrees();
    let width_angle = (index_base.y - pinky_base.y)
        .atan2(index_base.x - pinky_base.x)
        .to_degrees();

    let depth_indicator = (hand[THUMB_TIP].x - hand[PINKY_TIP].x).abs();
    let depth_angle = (depth_indicator - DEPTH_BASELINE) * DEPTH_SCALE_DEGREES;

    Rotation {
        x: width_angle * multiplier,
        y: depth_angle * multiplier,
        z: palm_angle * multiplier,
    }
}

/// Wrist position mapped to -1..1 with the vertical axis flipped.
pub fn hand_translation(hand: &HandLandmarks) -> Translation {
    let wrist = hand[WRIST];
    Translation {
        x: (wrist.x - 0.5) * 2f64,
        y: (0.5 - wrist.y) * 2f64,
    }
}

/// Strictly closer than `threshold` counts; exactly at it does not.
pub fn is_pinching(hand: &HandLandmarks, threshold: f64) -> bool {
    let thumb = hand[THUMB_TIP];
    let index = hand[INDEX_TIP];
    (thumb.x - index.x).hypot(thumb.y - index.y) < threshold
}

/// A finger is folded when its tip sits below its base joint in the image.
/// The thumb is folded when its tip is left of its IP joint, which only
/// holds for a right hand seen in a mirrored image; left hands are not
/// mirrored.
pub fn is_fist(hand: &HandLandmarks) -> bool {
    let folded_fingers = FINGERS
        .iter()
        .filter(|(tip, base)| hand[*tip].y > hand[*base].y)
        .count();
    let folded_thumb = hand[THUMB_TIP].x < hand[THUMB_IP].x;

    folded_fingers + usize::from(folded_thumb) >= FIST_MIN_FOLDED
}
