//! LED show-control script engine.
//!
//! Compiles a small time-aware scripting language into a flat statement
//! sequence and interprets it against an LED string driver, while a single
//! background scheduler thread debounces the push button that provides
//! cooperative cancellation.

pub mod button;
pub mod clock;
pub mod compiler;
pub mod config;
pub mod cpu;
pub mod driver;
pub mod engine;
pub mod lang;
pub mod logger;
pub mod schedule;
pub mod signal;

pub use compiler::{CompileError, ScriptCompiler};
pub use engine::LedEngine;
pub use lang::{CompiledScript, Program, Statement};
pub use logger::{LogMessage, Logger, Severity};
pub use signal::TerminationSignal;
