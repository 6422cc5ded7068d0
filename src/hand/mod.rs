pub mod detector;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod landmark;

pub use detector::{HandDetector, SubprocessDetector};
pub use error::HandError;
pub use frame::{build_frame_reading, track_hand, FrameReading, HandReading};
pub use geometry::{hand_depth, normalize_coordinates, MIN_LANDMARKS};
pub use landmark::{DetectedHand, HandLandmarkIndex, Landmark, RawLandmark, Side};
