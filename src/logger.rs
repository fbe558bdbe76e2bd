//! Logging capability shared by the compiler, the CPU and the scheduler.
//!
//! There is deliberately no process-wide logger: a [`Logger`] is constructed
//! from the configuration and handed to each component at construction time.
//! Cloning is cheap (the sink list is behind an `Arc`), so every component
//! holds its own handle.

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};

/// Severity level of a log message, used for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// Numeric priority: higher is more severe.
    fn rank(&self) -> u8 {
        match self {
            Severity::Debug => 10,
            Severity::Info => 20,
            Severity::Warn => 30,
            Severity::Error => 40,
            Severity::Fatal => 50,
        }
    }

    /// Parse a configuration string. Unrecognized values fall back to `Info`.
    pub fn parse(name: &str) -> Severity {
        match name.to_ascii_lowercase().as_str() {
            "debug" => Severity::Debug,
            "info" => Severity::Info,
            "warn" | "warning" => Severity::Warn,
            "error" => Severity::Error,
            "fatal" | "critical" => Severity::Fatal,
            _ => Severity::Info,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Debug => write!(f, "[DEBUG]"),
            Severity::Info => write!(f, "[INFO]"),
            Severity::Warn => write!(f, "[WARN]"),
            Severity::Error => write!(f, "[ERROR]"),
            Severity::Fatal => write!(f, "[FATAL]"),
        }
    }
}

/// A structured log message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: Severity,
    pub msg: String,
}

impl LogMessage {
    pub fn new(level: Severity, msg: String) -> Self {
        LogMessage { level, msg }
    }
}

impl Display for LogMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.level, self.msg)
    }
}

/// A destination for log messages.
pub enum LogSink {
    /// Terminal output: `Error` and `Fatal` go to stderr, the rest to stdout.
    Console,
    /// Line-buffered file output.
    File(Mutex<LineWriter<File>>),
    /// Channel to a line-oriented display adapter (LCD panel, remote shell).
    Channel(Sender<LogMessage>),
}

impl LogSink {
    /// Open (append) a log file sink.
    pub fn file<P: AsRef<Path>>(path: P) -> std::io::Result<LogSink> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(LogSink::File(Mutex::new(LineWriter::new(file))))
    }

    /// Create a channel sink and the receiving end for the display adapter.
    pub fn channel() -> (LogSink, Receiver<LogMessage>) {
        let (tx, rx) = unbounded();
        (LogSink::Channel(tx), rx)
    }

    fn write(&self, message: &LogMessage) {
        match self {
            LogSink::Console => match message.level {
                Severity::Error | Severity::Fatal => eprintln!("{}", message),
                _ => println!("{}", message),
            },
            LogSink::File(writer) => {
                if let Ok(mut writer) = writer.lock() {
                    if let Err(e) = writeln!(writer, "{}", message) {
                        eprintln!("log file write failed: {}", e);
                    }
                }
            }
            LogSink::Channel(sender) => {
                // Terminal fallback when the display side has gone away
                if sender.send(message.clone()).is_err() {
                    eprintln!("log channel closed: {}", message);
                }
            }
        }
    }
}

struct LoggerInner {
    min_level: Severity,
    sinks: Vec<LogSink>,
}

/// Cheaply cloneable logging handle.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    pub fn new(min_level: Severity, sinks: Vec<LogSink>) -> Self {
        Logger {
            inner: Arc::new(LoggerInner { min_level, sinks }),
        }
    }

    /// Console-only logger.
    pub fn console(min_level: Severity) -> Self {
        Logger::new(min_level, vec![LogSink::Console])
    }

    /// A logger that discards everything. Used by tests that do not inspect
    /// log output.
    pub fn sink_less() -> Self {
        Logger::new(Severity::Fatal, Vec::new())
    }

    pub fn log(&self, level: Severity, msg: impl Into<String>) {
        if level.rank() < self.inner.min_level.rank() {
            return;
        }
        let message = LogMessage::new(level, msg.into());
        for sink in &self.inner.sinks {
            sink.write(&message);
        }
    }

    pub fn debug(&self, msg: impl Into<String>) {
        self.log(Severity::Debug, msg);
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.log(Severity::Info, msg);
    }

    pub fn warn(&self, msg: impl Into<String>) {
        self.log(Severity::Warn, msg);
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.log(Severity::Error, msg);
    }

    pub fn fatal(&self, msg: impl Into<String>) {
        self.log(Severity::Fatal, msg);
    }
}
