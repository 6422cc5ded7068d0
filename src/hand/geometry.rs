use super::error::HandError;
use super::landmark::{HandLandmarkIndex, RawLandmark};

const WRIST: usize = HandLandmarkIndex::Wrist as usize;
const MIDDLE_MCP: usize = HandLandmarkIndex::MiddleFingerMcp as usize;

/// Landmarks a hand needs before its depth can be estimated.
pub const MIN_LANDMARKS: usize = MIDDLE_MCP + 1;

/// Map a pixel position to image-centred coordinates.
///
/// Centre → (0, 0), left/top edge → -1, right/bottom edge → 1. Not clamped:
/// landmarks the detector places just outside the frame land outside [-1, 1].
pub fn normalize_coordinates(px: f64, py: f64, width: u32, height: u32) -> (f64, f64) {
    let half_w = width as f64 / 2.0;
    let half_h = height as f64 / 2.0;
    ((px - half_w) / half_w, (py - half_h) / half_h)
}

/// Hand tilt/foreshortening: |z(wrist) - z(middle finger MCP)|.
///
/// A hand flat to the camera gives ~0, a hand angled toward or away from it
/// gives larger values.
pub fn hand_depth(landmarks: &[RawLandmark]) -> Result<f64, HandError> {
    if landmarks.len() < MIN_LANDMARKS {
        return Err(HandError::TooFewLandmarks {
            required: MIN_LANDMARKS,
            found: landmarks.len(),
        });
    }
    Ok((landmarks[WRIST].z - landmarks[MIDDLE_MCP].z).abs())
}
