use serde::{Deserialize, Serialize};

use super::error::HandError;
use super::geometry::{hand_depth, normalize_coordinates};
use super::landmark::{DetectedHand, HandLandmarkIndex, Landmark, Side};
use crate::protocol::WireHand;

/// State of one side for one frame: a full set of landmarks, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireHand", try_from = "WireHand")]
pub enum HandReading {
    Tracked { landmarks: Vec<Landmark>, depth: f64 },
    AtRest,
}

impl HandReading {
    pub fn is_rest(&self) -> bool {
        matches!(self, Self::AtRest)
    }

    pub fn landmarks(&self) -> &[Landmark] {
        match self {
            Self::Tracked { landmarks, .. } => landmarks,
            Self::AtRest => &[],
        }
    }

    pub fn depth(&self) -> Option<f64> {
        match self {
            Self::Tracked { depth, .. } => Some(*depth),
            Self::AtRest => None,
        }
    }
}

/// Everything sent for one captured frame. Both sides are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameReading {
    #[serde(rename = "HandLeft")]
    pub hand_left: HandReading,
    #[serde(rename = "HandRight")]
    pub hand_right: HandReading,
}

impl FrameReading {
    /// Both hands at rest
    pub fn rest() -> Self {
        Self {
            hand_left: HandReading::AtRest,
            hand_right: HandReading::AtRest,
        }
    }

    fn slot(&mut self, side: Side) -> &mut HandReading {
        match side {
            Side::Left => &mut self.hand_left,
            Side::Right => &mut self.hand_right,
        }
    }
}

/// Convert one detected hand into wire landmarks and its depth.
pub fn track_hand(hand: &DetectedHand, width: u32, height: u32) -> Result<HandReading, HandError> {
    if let Some(index) = hand.landmarks.iter().position(|lm| !lm.is_finite()) {
        return Err(HandError::NonFiniteLandmark { index });
    }
    let depth = hand_depth(&hand.landmarks)?;
    let wrist_z = hand.landmarks[HandLandmarkIndex::Wrist as usize].z;

    let landmarks = hand
        .landmarks
        .iter()
        .enumerate()
        .map(|(id, lm)| {
            let (px, py) = lm.to_pixel(width, height);
            let (x, y) = normalize_coordinates(px, py, width, height);
            Landmark {
                id: id as u32,
                x,
                y,
                z: lm.z - wrist_z,
            }
        })
        .collect();

    Ok(HandReading::Tracked { landmarks, depth })
}

/// Build the reading for one frame from the detector's hands.
///
/// Sides with no detected hand stay at rest. If two hands report the same
/// side, the later one wins. Any contract violation fails the whole frame.
pub fn build_frame_reading(
    width: u32,
    height: u32,
    hands: &[DetectedHand],
) -> Result<FrameReading, HandError> {
    let mut reading = FrameReading::rest();
    for hand in hands {
        *reading.slot(hand.side) = track_hand(hand, width, height)?;
    }
    Ok(reading)
}
