pub mod capture;
#[cfg(feature = "desktop")]
pub mod opencv;

pub use capture::{Capture, CapturedFrame, FrameSource};
#[cfg(feature = "desktop")]
pub use self::opencv::OpenCvCamera;
