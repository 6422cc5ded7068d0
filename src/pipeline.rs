//! Frame source loop: capture → detect → build, at the capture device's pace.
//!
//! Runs on its own thread. The loop owns the capture device and the detector
//! and releases both when it returns.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::camera::{Capture, FrameSource};
use crate::hand::{build_frame_reading, FrameReading, HandDetector, HandError};

/// Outcome of a single capture cycle.
#[derive(Debug)]
pub enum Step {
    Reading(FrameReading),
    /// No frame from capture this cycle
    Missed,
    /// Detector failed or broke its contract; frame discarded
    Dropped,
    Closed,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    CaptureClosed,
    Stopped,
    /// Nobody is receiving readings any more
    OutletClosed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub built: u64,
    pub missed: u64,
    pub dropped: u64,
}

pub struct FrameSourceLoop<S, D> {
    source: S,
    detector: D,
    stop: Arc<AtomicBool>,
    max_detector_errors: u32,
    detector_errors: u32,
    stats: LoopStats,
}

impl<S: FrameSource, D: HandDetector> FrameSourceLoop<S, D> {
    /// `stop` is raised by the process (signal handler) to end the loop.
    pub fn new(source: S, detector: D, stop: Arc<AtomicBool>, max_detector_errors: u32) -> Self {
        Self {
            source,
            detector,
            stop,
            max_detector_errors,
            detector_errors: 0,
            stats: LoopStats::default(),
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Run one capture cycle.
    pub fn step(&mut self) -> Result<Step> {
        let frame = match self.source.read_frame() {
            Ok(Capture::Frame(frame)) => frame,
            Ok(Capture::Missed) => {
                self.stats.missed += 1;
                return Ok(Step::Missed);
            }
            Ok(Capture::Closed) => return Ok(Step::Closed),
            Err(e) => {
                log::debug!("[camera] read failed: {:#}", e);
                self.stats.missed += 1;
                return Ok(Step::Missed);
            }
        };

        let hands = match self.detector.detect(&frame) {
            Ok(hands) => {
                self.detector_errors = 0;
                hands
            }
            Err(e) if e.downcast_ref::<HandError>().is_some() => {
                // Bad output from a working detector; not an invocation failure
                self.stats.dropped += 1;
                log::warn!("[detector] contract violation, frame dropped: {:#}", e);
                return Ok(Step::Dropped);
            }
            Err(e) => {
                self.detector_errors += 1;
                self.stats.dropped += 1;
                log::warn!("[detector] frame dropped: {:#}", e);
                if self.detector_errors >= self.max_detector_errors {
                    bail!("detector failed {} times in a row", self.detector_errors);
                }
                return Ok(Step::Dropped);
            }
        };

        match build_frame_reading(frame.width, frame.height, &hands) {
            Ok(reading) => {
                self.stats.built += 1;
                Ok(Step::Reading(reading))
            }
            Err(e) => {
                self.stats.dropped += 1;
                log::warn!("[detector] contract violation, frame dropped: {}", e);
                Ok(Step::Dropped)
            }
        }
    }

    /// Loop until capture closes, the stop flag is raised or `outlet` closes.
    ///
    /// Readings are handed over with `blocking_send`, so this must not run
    /// inside the async runtime.
    pub fn run(mut self, outlet: mpsc::Sender<FrameReading>) -> Result<LoopExit> {
        let mut fps_timer = Instant::now();
        let mut window = LoopStats::default();

        let exit = loop {
            if self.stop.load(Ordering::Relaxed) {
                break LoopExit::Stopped;
            }

            match self.step()? {
                Step::Reading(reading) => {
                    if outlet.blocking_send(reading).is_err() {
                        break LoopExit::OutletClosed;
                    }
                }
                Step::Missed | Step::Dropped => {}
                Step::Closed => break LoopExit::CaptureClosed,
            }

            if fps_timer.elapsed() >= Duration::from_secs(1) {
                let s = self.stats;
                log::debug!(
                    "[fps] {} (missed={} dropped={})",
                    s.built - window.built,
                    s.missed - window.missed,
                    s.dropped - window.dropped,
                );
                window = s;
                fps_timer = Instant::now();
            }
        };

        let s = self.stats;
        log::info!(
            "[loop] exit {:?}: built={} missed={} dropped={}",
            exit, s.built, s.missed, s.dropped
        );
        Ok(exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CapturedFrame;
    use crate::hand::{DetectedHand, HandLandmarkIndex, RawLandmark, Side};
    use std::collections::VecDeque;

    #[derive(Clone)]
    enum Scripted {
        Frame,
        Miss,
        Fail,
    }

    /// Plays back a fixed script, then reports closed.
    struct ScriptedSource {
        script: VecDeque<Scripted>,
        released: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Scripted>) -> Self {
            Self { script: script.into(), released: Arc::new(AtomicBool::new(false)) }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Capture> {
            match self.script.pop_front() {
                Some(Scripted::Frame) => Ok(Capture::Frame(CapturedFrame::new(640, 480, 3, Vec::new()))),
                Some(Scripted::Miss) => Ok(Capture::Missed),
                Some(Scripted::Fail) => bail!("device busy"),
                None => Ok(Capture::Closed),
            }
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    /// Detector that always reports a label it does not know.
    struct MislabelingDetector;

    impl HandDetector for MislabelingDetector {
        fn detect(&mut self, _frame: &CapturedFrame) -> Result<Vec<DetectedHand>> {
            Err(HandError::UnknownSide("Both".to_string()).into())
        }
    }

    /// Returns canned detector results in order; `None` means an error.
    struct ScriptedDetector {
        replies: VecDeque<Option<Vec<DetectedHand>>>,
    }

    impl ScriptedDetector {
        fn new(replies: Vec<Option<Vec<DetectedHand>>>) -> Self {
            Self { replies: replies.into() }
        }
    }

    impl HandDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &CapturedFrame) -> Result<Vec<DetectedHand>> {
            match self.replies.pop_front() {
                Some(Some(hands)) => Ok(hands),
                Some(None) => bail!("detector crashed"),
                None => Ok(Vec::new()),
            }
        }
    }

    fn hand(side: Side, x: f64) -> DetectedHand {
        DetectedHand::new(side, vec![RawLandmark::new(x, 0.5, 0.0); HandLandmarkIndex::COUNT])
    }

    fn no_stop() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn test_step_builds_reading() {
        let source = ScriptedSource::new(vec![Scripted::Frame]);
        let detector = ScriptedDetector::new(vec![Some(vec![hand(Side::Left, 0.5)])]);
        let mut fsl = FrameSourceLoop::new(source, detector, no_stop(), 3);

        match fsl.step().unwrap() {
            Step::Reading(reading) => {
                assert_eq!(reading.hand_left.landmarks().len(), 21);
                assert!(reading.hand_right.is_rest());
            }
            other => panic!("expected reading, got {:?}", other),
        }
        assert!(matches!(fsl.step().unwrap(), Step::Closed));
        assert_eq!(fsl.stats(), LoopStats { built: 1, missed: 0, dropped: 0 });
    }

    #[test]
    fn test_capture_miss_and_error_are_retried() {
        let source = ScriptedSource::new(vec![Scripted::Miss, Scripted::Fail, Scripted::Frame]);
        let detector = ScriptedDetector::new(vec![Some(Vec::new())]);
        let mut fsl = FrameSourceLoop::new(source, detector, no_stop(), 3);

        assert!(matches!(fsl.step().unwrap(), Step::Missed));
        assert!(matches!(fsl.step().unwrap(), Step::Missed));
        assert!(matches!(fsl.step().unwrap(), Step::Reading(_)));
        assert_eq!(fsl.stats().missed, 2);
    }

    #[test]
    fn test_contract_violation_drops_frame() {
        let short = DetectedHand::new(Side::Right, vec![RawLandmark::default(); 4]);
        let source = ScriptedSource::new(vec![Scripted::Frame, Scripted::Frame]);
        let detector = ScriptedDetector::new(vec![Some(vec![short]), Some(vec![hand(Side::Right, 0.5)])]);
        let mut fsl = FrameSourceLoop::new(source, detector, no_stop(), 3);

        assert!(matches!(fsl.step().unwrap(), Step::Dropped));
        assert!(matches!(fsl.step().unwrap(), Step::Reading(_)));
        assert_eq!(fsl.stats().dropped, 1);
    }

    #[test]
    fn test_detector_error_limit() {
        let source = ScriptedSource::new(vec![Scripted::Frame, Scripted::Frame, Scripted::Frame, Scripted::Frame]);
        let detector = ScriptedDetector::new(vec![None, Some(Vec::new()), None, None]);
        let mut fsl = FrameSourceLoop::new(source, detector, no_stop(), 2);

        assert!(matches!(fsl.step().unwrap(), Step::Dropped));
        // A success resets the streak
        assert!(matches!(fsl.step().unwrap(), Step::Reading(_)));
        assert!(matches!(fsl.step().unwrap(), Step::Dropped));
        assert!(fsl.step().is_err());
    }

    #[test]
    fn test_detector_contract_violation_not_counted() {
        let source = ScriptedSource::new(vec![Scripted::Frame; 5]);
        let mut fsl = FrameSourceLoop::new(source, MislabelingDetector, no_stop(), 3);

        for i in 0..5 {
            assert!(matches!(fsl.step().unwrap(), Step::Dropped), "step {}", i);
        }
        assert_eq!(fsl.stats().dropped, 5);
        assert!(matches!(fsl.step().unwrap(), Step::Closed));
    }

    #[test]
    fn test_run_forwards_in_order_until_closed() {
        let source = ScriptedSource::new(vec![Scripted::Frame, Scripted::Miss, Scripted::Frame, Scripted::Frame]);
        let released = Arc::clone(&source.released);
        let detector = ScriptedDetector::new(vec![
            Some(vec![hand(Side::Left, 0.25)]),
            Some(Vec::new()),
            Some(vec![hand(Side::Right, 0.75)]),
        ]);
        let (tx, mut rx) = mpsc::channel(8);

        let exit = FrameSourceLoop::new(source, detector, no_stop(), 3).run(tx).unwrap();
        assert_eq!(exit, LoopExit::CaptureClosed);
        assert!(released.load(Ordering::SeqCst), "capture must be released on exit");

        let first = rx.blocking_recv().unwrap();
        assert!((first.hand_left.landmarks()[0].x - -0.5).abs() < 1e-9);
        assert_eq!(rx.blocking_recv().unwrap(), FrameReading::rest());
        let third = rx.blocking_recv().unwrap();
        assert!((third.hand_right.landmarks()[0].x - 0.5).abs() < 1e-9);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_run_stops_on_flag() {
        let source = ScriptedSource::new(Vec::new());
        let stop = Arc::new(AtomicBool::new(true));
        let (tx, _rx) = mpsc::channel(1);
        let exit = FrameSourceLoop::new(source, ScriptedDetector::new(Vec::new()), stop, 3)
            .run(tx)
            .unwrap();
        assert_eq!(exit, LoopExit::Stopped);
    }

    #[test]
    fn test_run_ends_when_outlet_closed() {
        let source = ScriptedSource::new(vec![Scripted::Frame, Scripted::Frame]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let exit = FrameSourceLoop::new(source, ScriptedDetector::new(Vec::new()), no_stop(), 3)
            .run(tx)
            .unwrap();
        assert_eq!(exit, LoopExit::OutletClosed);
    }
}
