use thiserror::Error;

/// Detector output that breaks the landmark contract. The frame carrying it
/// is dropped; it never reaches the wire.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandError {
    #[error("hand has {found} landmarks, at least {required} required")]
    TooFewLandmarks { required: usize, found: usize },
    #[error("landmark {index} has a non-finite coordinate")]
    NonFiniteLandmark { index: usize },
    #[error("unknown handedness label {0:?}")]
    UnknownSide(String),
}
