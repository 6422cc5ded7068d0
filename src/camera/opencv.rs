use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};

use super::capture::{Capture, CapturedFrame, FrameSource};
use crate::config::CameraConfig;

/// Camera capture through OpenCV. Released when dropped.
pub struct OpenCvCamera {
    index: i32,
    capture: VideoCapture,
}

impl OpenCvCamera {
    /// Open the configured camera. Resolution and FPS are requests; the
    /// driver may pick something else.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let index = config.index;
        let mut capture = VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("failed to open camera {index}"))?;
        if !capture.is_opened()? {
            anyhow::bail!("camera {} is not available", index);
        }

        let requests = [
            (videoio::CAP_PROP_FRAME_WIDTH, config.width),
            (videoio::CAP_PROP_FRAME_HEIGHT, config.height),
            (videoio::CAP_PROP_FPS, config.fps),
        ];
        for (prop, value) in requests {
            if let Some(v) = value {
                capture.set(prop, v as f64)?;
            }
        }
        // Always hand out the newest frame
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        log::info!(
            "[camera] cam{} opened {}x{} @ {:.0}fps",
            index,
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
            capture.get(videoio::CAP_PROP_FPS)?,
        );

        Ok(Self { index, capture })
    }
}

impl FrameSource for OpenCvCamera {
    fn read_frame(&mut self) -> Result<Capture> {
        if !self.capture.is_opened()? {
            return Ok(Capture::Closed);
        }

        let mut frame = Mat::default();
        let ok = self.capture.read(&mut frame).context("failed to read frame")?;
        if !ok || frame.empty() {
            return Ok(Capture::Missed);
        }

        // Packed bytes are needed for data_bytes()
        let frame = if frame.is_continuous() { frame } else { frame.try_clone()? };
        let width = frame.cols() as u32;
        let height = frame.rows() as u32;
        let channels = frame.channels() as u32;
        let data = frame.data_bytes()?.to_vec();

        Ok(Capture::Frame(CapturedFrame::new(width, height, channels, data)))
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        let _ = self.capture.release();
        log::info!("[camera] cam{} released", self.index);
    }
}
