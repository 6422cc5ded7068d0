//! Hand landmark detection is an external capability. The pipeline only sees
//! the [`HandDetector`] trait; [`SubprocessDetector`] drives a MediaPipe-style
//! helper process over stdin/stdout.
//!
//! Helper protocol: the child prints `READY` once its model is loaded. For each
//! frame the parent writes `width`, `height`, `channels` (u32 little-endian)
//! followed by the raw pixel bytes, and the child answers with one JSON line:
//!
//! ```text
//! {"hands": [{"handedness": "Left", "score": 0.93, "landmarks": [{"x": .., "y": .., "z": ..}, ...]}], "error": null}
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use super::landmark::{DetectedHand, RawLandmark, Side};
use crate::camera::CapturedFrame;
use crate::config::DetectorConfig;

/// Produces the hands visible in one frame.
pub trait HandDetector {
    fn detect(&mut self, frame: &CapturedFrame) -> Result<Vec<DetectedHand>>;
}

#[derive(Deserialize, Debug)]
struct HandJson {
    handedness: String,
    #[serde(default = "default_score")]
    score: f32,
    landmarks: Vec<RawLandmark>,
}

fn default_score() -> f32 { 1.0 }

#[derive(Deserialize, Debug)]
struct DetectionReply {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Turn one reply line into detected hands, keeping at most `max_hands`
/// hands scoring at least `min_score`, in reported order.
fn parse_reply(line: &str, max_hands: usize, min_score: f32) -> Result<Vec<DetectedHand>> {
    let reply: DetectionReply = serde_json::from_str(line.trim())
        .with_context(|| format!("failed to parse detector reply: {}", line.trim()))?;

    if let Some(error) = reply.error {
        bail!("detector helper reported: {}", error);
    }

    let mut hands = Vec::new();
    for hand in reply.hands {
        if hand.score < min_score {
            log::debug!("[detector] skipping {} hand (score {:.2})", hand.handedness, hand.score);
            continue;
        }
        if hands.len() == max_hands {
            break;
        }
        let side = Side::from_label(&hand.handedness)?;
        hands.push(DetectedHand::new(side, hand.landmarks));
    }
    Ok(hands)
}

/// Detector running in a child process. The child is killed on drop.
pub struct SubprocessDetector {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    max_hands: usize,
    min_score: f32,
}

impl SubprocessDetector {
    /// Start the helper and wait for its `READY` line.
    pub fn spawn(config: &DetectorConfig) -> Result<Self> {
        log::info!("[detector] starting {} {}", config.command, config.args.join(" "));

        let mut process = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start detector `{}`", config.command))?;

        let stdin = process.stdin.take().context("detector stdin unavailable")?;
        let stdout = process.stdout.take().context("detector stdout unavailable")?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        stdout.read_line(&mut ready).context("detector exited before READY")?;
        if ready.trim() != "READY" {
            let _ = process.kill();
            bail!("detector did not signal ready, got: {:?}", ready.trim());
        }
        log::info!("[detector] ready");

        Ok(Self {
            process,
            stdin,
            stdout,
            max_hands: config.max_hands,
            min_score: config.min_score,
        })
    }
}

impl HandDetector for SubprocessDetector {
    fn detect(&mut self, frame: &CapturedFrame) -> Result<Vec<DetectedHand>> {
        self.stdin.write_all(&frame.width.to_le_bytes())?;
        self.stdin.write_all(&frame.height.to_le_bytes())?;
        self.stdin.write_all(&frame.channels.to_le_bytes())?;
        self.stdin.write_all(&frame.data)?;
        self.stdin.flush().context("failed to send frame to detector")?;

        let mut line = String::new();
        let n = self.stdout.read_line(&mut line)?;
        if n == 0 {
            bail!("detector process closed its output");
        }
        parse_reply(&line, self.max_hands, self.min_score)
    }
}

impl Drop for SubprocessDetector {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}
