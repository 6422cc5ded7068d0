//! `log` backend: every record goes to stderr and, when enabled, to a
//! timestamped file under the log directory.

use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::LogConfig;

type LogFile = Mutex<BufWriter<File>>;

struct TeeLogger {
    level: LevelFilter,
    file: Option<LogFile>,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = format_record(record);
        eprintln!("{}", msg);
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let ts = chrono::Local::now().format("%H:%M:%S%.3f");
                let _ = writeln!(f, "{} {}", ts, msg);
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

fn format_record(record: &Record) -> String {
    match record.level() {
        log::Level::Info => format!("{}", record.args()),
        level => format!("{} {}", level, record.args()),
    }
}

/// `<dir>/hand_stream_<YYYYmmdd_HHMMSS>.log`
pub fn log_file_path(dir: &Path) -> PathBuf {
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("hand_stream_{}.log", ts))
}

fn open_log_file(dir: &Path) -> Result<(LogFile, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = log_file_path(dir);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok((Mutex::new(BufWriter::new(file)), path))
}

/// Install the global logger. Returns the log file path when one was opened.
pub fn init(config: &LogConfig, verbose: bool) -> Result<Option<PathBuf>> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let (file, path) = if config.file {
        let (file, path) = open_log_file(Path::new(&config.dir))?;
        eprintln!("Log: {}", path.display());
        (Some(file), Some(path))
    } else {
        (None, None)
    };

    log::set_boxed_logger(Box::new(TeeLogger { level, file }))
        .context("logger already installed")?;
    log::set_max_level(level);
    Ok(path)
}
