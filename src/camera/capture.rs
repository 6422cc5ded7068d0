use anyhow::Result;

/// One captured image, tightly packed 8-bit pixels (BGR for OpenCV sources).
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Self {
        Self { width, height, channels, data }
    }
}

/// Result of one read from a capture device.
#[derive(Debug)]
pub enum Capture {
    Frame(CapturedFrame),
    /// No frame this time; try again.
    Missed,
    /// The device is gone or the stream ended.
    Closed,
}

/// A video source owned by the frame loop.
///
/// `read_frame` blocks until the device delivers (or fails to deliver) the
/// next frame. An `Err` is treated like a miss by the loop.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Capture>;
}
