use serde::{Deserialize, Serialize};

use super::error::HandError;

/// MediaPipe hand model landmark indices (21 points)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum HandLandmarkIndex {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexFingerMcp = 5,
    IndexFingerPip = 6,
    IndexFingerDip = 7,
    IndexFingerTip = 8,
    MiddleFingerMcp = 9,
    MiddleFingerPip = 10,
    MiddleFingerDip = 11,
    MiddleFingerTip = 12,
    RingFingerMcp = 13,
    RingFingerPip = 14,
    RingFingerDip = 15,
    RingFingerTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmarkIndex {
    pub const COUNT: usize = 21;
}

/// Which hand the detector thinks it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Parse the detector's handedness label ("Left" / "Right").
    pub fn from_label(label: &str) -> Result<Self, HandError> {
        match label {
            "Left" => Ok(Self::Left),
            "Right" => Ok(Self::Right),
            other => Err(HandError::UnknownSide(other.to_string())),
        }
    }
}

/// Detector-native landmark: x/y are fractions of the image size, z is
/// unconstrained (more negative = closer to the camera).
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct RawLandmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RawLandmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Pixel position in a frame of the given size
    pub fn to_pixel(&self, width: u32, height: u32) -> (f64, f64) {
        (self.x * width as f64, self.y * height as f64)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One hand as reported by the detector for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedHand {
    pub side: Side,
    pub landmarks: Vec<RawLandmark>,
}

impl DetectedHand {
    pub fn new(side: Side, landmarks: Vec<RawLandmark>) -> Self {
        Self { side, landmarks }
    }
}

/// Landmark in wire coordinates: x/y centred on the image in [-1, 1],
/// z relative to the wrist of the same hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Landmark {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_index_count() {
        assert_eq!(HandLandmarkIndex::COUNT, 21);
        assert_eq!(HandLandmarkIndex::MiddleFingerMcp as usize, 9);
        assert_eq!(HandLandmarkIndex::PinkyTip as usize, HandLandmarkIndex::COUNT - 1);
    }

    #[test]
    fn test_side_from_label() {
        assert_eq!(Side::from_label("Left").unwrap(), Side::Left);
        assert_eq!(Side::from_label("Right").unwrap(), Side::Right);
        assert!(matches!(Side::from_label("left"), Err(HandError::UnknownSide(_))));
    }

    #[test]
    fn test_raw_landmark_to_pixel() {
        let lm = RawLandmark::new(0.5, 0.25, 0.0);
        let (px, py) = lm.to_pixel(640, 480);
        assert_eq!(px, 320.0);
        assert_eq!(py, 120.0);
    }

    #[test]
    fn test_raw_landmark_is_finite() {
        assert!(RawLandmark::new(0.1, 0.2, -0.3).is_finite());
        assert!(!RawLandmark::new(f64::NAN, 0.2, 0.0).is_finite());
        assert!(!RawLandmark::new(0.1, 0.2, f64::INFINITY).is_finite());
    }
}
