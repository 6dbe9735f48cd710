//! Monitoring log file handling.
//!
//! The log file lives for the monitoring lifetime: opened when verification
//! starts, flushed after every line so a crash still leaves a usable log,
//! closed when monitoring stops.

use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

const LOG_DIR: &str = "vigil_monitoring_logs";

#[derive(Debug)]
pub struct MonitoringLog {
    verbose: bool,
    logs_to_stdout: bool,
    path: PathBuf,
    handle: Mutex<Option<File>>,
}

impl MonitoringLog {
    pub fn new(verbose: bool, logs_to_stdout: bool) -> Self {
        let stamp = Utc::now()
            .format("%Y_%m_%d_%H_%M_%S_%f")
            .to_string();
        MonitoringLog {
            verbose,
            logs_to_stdout,
            path: PathBuf::from(LOG_DIR).join(stamp),
            handle: Mutex::new(None),
        }
    }

    /// Open the log file, creating the log directory if needed.
    pub fn start_logging(&self) -> std::io::Result<()> {
        fs::create_dir_all(LOG_DIR)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        *self.handle.lock().unwrap() = Some(file);
        Ok(())
    }

    pub fn end_logging(&self) {
        *self.handle.lock().unwrap() = None;
    }

    /// Write one line, if verbose output is on and logging has started.
    pub fn log(&self, message: &str) {
        if !self.verbose {
            return;
        }
        let mut guard = self.handle.lock().unwrap();
        if let Some(file) = guard.as_mut() {
            let line = format!("[monitoring - {}] {}", Utc::now(), message);
            let _ = writeln!(file, "{}", line);
            let _ = file.flush();
            if self.logs_to_stdout {
                println!("{}", line);
            }
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
