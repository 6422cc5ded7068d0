use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// WebSocket listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Debug-level logging
    #[serde(default)]
    pub verbose: bool,
    /// Stop the frame loop after this many detector failures in a row
    #[serde(default = "default_max_detector_errors")]
    pub max_consecutive_detector_errors: u32,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_listen_addr() -> String { "127.0.0.1:8765".to_string() }
fn default_max_detector_errors() -> u32 { 30 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// Helper executable
    #[serde(default = "default_detector_command")]
    pub command: String,
    #[serde(default = "default_detector_args")]
    pub args: Vec<String>,
    #[serde(default = "default_max_hands")]
    pub max_hands: usize,
    /// Hands scored below this are ignored
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

fn default_detector_command() -> String { "python3".to_string() }
fn default_detector_args() -> Vec<String> { vec!["hand_detect.py".to_string()] }
fn default_max_hands() -> usize { 2 }
fn default_min_score() -> f32 { 0.5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: default_detector_command(),
            args: default_detector_args(),
            max_hands: default_max_hands(),
            min_score: default_min_score(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Also write logs/hand_stream_<timestamp>.log
    #[serde(default = "default_log_file")]
    pub file: bool,
}

fn default_log_dir() -> String { "logs".to_string() }
fn default_log_file() -> bool { true }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file: default_log_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            verbose: false,
            max_consecutive_detector_errors: default_max_detector_errors(),
            camera: CameraConfig::default(),
            detector: DetectorConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Defaults when the file is missing. Parse errors are reported and
    /// also fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8765");
        assert!(!config.verbose);
        assert_eq!(config.max_consecutive_detector_errors, 30);
        assert_eq!(config.camera.index, 0);
        assert_eq!(config.camera.width, None);
        assert_eq!(config.detector.command, "python3");
        assert_eq!(config.detector.max_hands, 2);
        assert_eq!(config.log.dir, "logs");
        assert!(config.log.file);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            listen_addr = "0.0.0.0:9000"
            verbose = true

            [camera]
            index = 1
            width = 1280
            height = 720

            [detector]
            command = "/opt/venv/bin/python"
            args = ["detect.py", "--model", "hand_landmarker.task"]
            min_score = 0.7
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert!(config.verbose);
        assert_eq!(config.camera.index, 1);
        assert_eq!(config.camera.width, Some(1280));
        assert_eq!(config.camera.fps, None);
        assert_eq!(config.detector.args.len(), 3);
        assert!((config.detector.min_score - 0.7).abs() < 1e-6);
        assert_eq!(config.detector.max_hands, 2);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::parse("listen_addr = 8765").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("does/not/exist/hand_stream.toml");
        assert_eq!(config.listen_addr, default_listen_addr());
        assert!(Config::load("does/not/exist/hand_stream.toml").is_err());
    }
}
