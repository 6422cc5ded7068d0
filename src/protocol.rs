//! WebSocket wire format: one JSON text message per frame.
//!
//! ```text
//! {"HandLeft": {"rest": true},
//!  "HandRight": {"landmarks": [{"id": 0, "x": 0.0, "y": 0.0, "z": 0.0}, ...], "depth": 0.05, "rest": false}}
//! ```
//!
//! A resting hand carries only `rest`; a tracked hand carries exactly
//! `landmarks`, `depth` and `rest`. No envelope, sequence number or timestamp.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::hand::{FrameReading, HandReading, Landmark};

/// Flat JSON shape of a [`HandReading`]. Field order is the wire order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireHand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    landmarks: Option<Vec<Landmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    depth: Option<f64>,
    rest: bool,
}

impl From<HandReading> for WireHand {
    fn from(reading: HandReading) -> Self {
        match reading {
            HandReading::Tracked { landmarks, depth } => Self {
                landmarks: Some(landmarks),
                depth: Some(depth),
                rest: false,
            },
            HandReading::AtRest => Self {
                landmarks: None,
                depth: None,
                rest: true,
            },
        }
    }
}

impl TryFrom<WireHand> for HandReading {
    type Error = String;

    fn try_from(wire: WireHand) -> Result<Self, Self::Error> {
        match wire {
            WireHand { landmarks: None, depth: None, rest: true } => Ok(HandReading::AtRest),
            WireHand { landmarks: Some(landmarks), depth: Some(depth), rest: false } => {
                Ok(HandReading::Tracked { landmarks, depth })
            }
            WireHand { rest: true, .. } => Err("resting hand must carry only `rest`".to_string()),
            WireHand { rest: false, .. } => {
                Err("tracked hand needs both `landmarks` and `depth`".to_string())
            }
        }
    }
}

/// Serialize a reading into the text payload of one message.
pub fn encode_frame(reading: &FrameReading) -> Result<String> {
    serde_json::to_string(reading).context("failed to serialize frame reading")
}

/// Parse one message payload back into a reading.
pub fn decode_frame(text: &str) -> Result<FrameReading> {
    serde_json::from_str(text).context("malformed frame message")
}
