//! Compile-then-execute orchestration.
//!
//! [`LedEngine`] owns the termination signal and ties the compiler to the
//! CPU: compile once on the foreground thread, then run the compiled script
//! against a driver. The signal handle is shared with the button watch so a
//! hold click can stop a running script.

use std::sync::Arc;

use crate::clock::Clock;
use crate::compiler::{CompileError, ScriptCompiler};
use crate::cpu::ScriptCpu;
use crate::driver::LedDriver;
use crate::lang::CompiledScript;
use crate::logger::Logger;
use crate::signal::TerminationSignal;

pub struct LedEngine {
    logger: Logger,
    clock: Arc<dyn Clock>,
    signal: Arc<TerminationSignal>,
    compiled: Option<CompiledScript>,
}

impl LedEngine {
    pub fn new(logger: Logger, clock: Arc<dyn Clock>) -> Self {
        LedEngine {
            logger,
            clock,
            signal: Arc::new(TerminationSignal::new()),
            compiled: None,
        }
    }

    /// Handle for wiring cancellation sources (the hold-click watch).
    pub fn termination_signal(&self) -> Arc<TerminationSignal> {
        Arc::clone(&self.signal)
    }

    pub fn compiled_script(&self) -> Option<&CompiledScript> {
        self.compiled.as_ref()
    }

    /// Compile script source. On failure nothing is stored and execution
    /// cannot start.
    pub fn compile(&mut self, source: &str) -> Result<(), CompileError> {
        match ScriptCompiler::new().compile(source) {
            Ok(script) => {
                self.logger.info(format!(
                    "Successfully compiled script ({} statements)",
                    script.statements.len()
                ));
                self.compiled = Some(script);
                Ok(())
            }
            Err(e) => {
                self.logger.error(format!("Script compile failed: {}", e));
                Err(e)
            }
        }
    }

    /// Run the compiled script to completion on the calling thread.
    /// Returns false if no script is compiled or the CPU stopped on a
    /// fatal error; the hardware is left dark either way.
    pub fn execute(&self, driver: &mut dyn LedDriver) -> bool {
        let Some(script) = &self.compiled else {
            self.logger.error("No compiled script to execute");
            return false;
        };
        let mut cpu = ScriptCpu::new(
            driver,
            script,
            Arc::clone(&self.signal),
            Arc::clone(&self.clock),
            self.logger.clone(),
        );
        cpu.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mock::MockClock;
    use crate::config::Configuration;
    use crate::driver::MemoryStrip;

    fn engine() -> LedEngine {
        LedEngine::new(Logger::sink_less(), Arc::new(MockClock::new()))
    }

    #[test]
    fn compile_and_execute_leaves_the_strip_dark() {
        let mut engine = engine();
        engine
            .compile("color red 255 0 0\ndo-for-n 2\nfill red\nshow\ndo-for-n-end\n")
            .unwrap();

        let mut strip = MemoryStrip::new();
        assert!(strip.open(&Configuration::default()));
        assert!(engine.execute(&mut strip));

        // Epilogue invariant: every pixel off after any run
        assert!(strip.shown().iter().all(|&p| p == 0));
        assert!(engine.termination_signal().is_terminated());
    }

    #[test]
    fn compile_error_keeps_no_program() {
        let mut engine = engine();
        assert!(engine.compile("do-for-n 2\nshow\n").is_err());
        assert!(engine.compiled_script().is_none());

        let mut strip = MemoryStrip::new();
        assert!(strip.open(&Configuration::default()));
        assert!(!engine.execute(&mut strip));
    }

    #[test]
    fn execute_without_compile_fails_cleanly() {
        let engine = engine();
        let mut strip = MemoryStrip::new();
        assert!(strip.open(&Configuration::default()));
        assert!(!engine.execute(&mut strip));
    }
}
