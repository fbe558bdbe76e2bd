//! JSON configuration boundary.
//!
//! The engine consumes the configuration as already-parsed key/value input;
//! it never writes it. The file shape follows the board's `led.conf`:
//! GPIO/bus pins, pixel geometry, button and logging setup, and either a
//! single script file or a calendar of date ranges mapped to script files.

use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::button::{DEFAULT_HOLD_CLICK_MS, DEFAULT_SHORT_CLICK_MS};
use crate::logger::{LogSink, Logger, Severity};
use crate::schedule::DEFAULT_TIME_SLICE_MS;

/// One calendar row: an inclusive date range and the script it selects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub script_file: String,
}

impl CalendarEntry {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    // Non-addressable string (PWM)
    pub red_pin: u8,
    pub green_pin: u8,
    pub blue_pin: u8,
    pub pwm_freq: u32,
    // APA102/DotStar (SPI)
    pub spi_clk: u8,
    pub spi_tx: u8,
    pub spi_rx: u8,
    // String geometry
    pub pixels: usize,
    pub order: String,
    pub brightness: u8,
    // Push button
    pub terminate_button_pin: u8,
    pub short_click: i32,
    pub hold_click: i32,
    // Scheduler
    pub time_slice: u64,
    // Driver test runs
    pub hold_time: u64,
    pub test_time: u64,
    // Logging
    pub log_level: String,
    pub log_devices: Vec<String>,
    pub log_file: String,
    // Script selection
    pub script_file: Option<String>,
    pub calendar: Vec<CalendarEntry>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            red_pin: 15,
            green_pin: 14,
            blue_pin: 13,
            pwm_freq: 1000,
            spi_clk: 2,
            spi_tx: 3,
            spi_rx: 4,
            pixels: 30,
            order: "bgr".to_string(),
            brightness: 128,
            terminate_button_pin: 16,
            short_click: DEFAULT_SHORT_CLICK_MS,
            hold_click: DEFAULT_HOLD_CLICK_MS,
            time_slice: DEFAULT_TIME_SLICE_MS,
            hold_time: 5,
            test_time: 30,
            log_level: "info".to_string(),
            log_devices: vec!["console".to_string()],
            log_file: "ledscript.log".to_string(),
            script_file: None,
            calendar: Vec::new(),
        }
    }
}

impl Configuration {
    /// Load and parse the configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Configuration> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Unable to open configuration file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Unable to parse {} as JSON", path.display()))?;
        Ok(config)
    }

    /// Script selected for a given date: the first matching calendar entry,
    /// falling back to the fixed `script_file`.
    pub fn script_for_date(&self, date: NaiveDate) -> Option<&str> {
        self.calendar
            .iter()
            .find(|entry| entry.contains(date))
            .map(|entry| entry.script_file.as_str())
            .or(self.script_file.as_deref())
    }

    /// Build the logger described by `log_level` / `log_devices`.
    /// Unknown sink names are skipped with a console note; a file sink that
    /// cannot be opened degrades the same way.
    pub fn build_logger(&self) -> Logger {
        let level = Severity::parse(&self.log_level);
        let mut sinks = Vec::new();
        for device in &self.log_devices {
            match device.to_ascii_lowercase().as_str() {
                "console" => sinks.push(LogSink::Console),
                "file" => match LogSink::file(&self.log_file) {
                    Ok(sink) => sinks.push(sink),
                    Err(e) => eprintln!("Unable to open log file {}: {}", self.log_file, e),
                },
                other => eprintln!("{} is not a recognized log device", other),
            }
        }
        Logger::new(level, sinks)
    }
}
