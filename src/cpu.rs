//! Script CPU: the fetch-decode-execute loop over a compiled program.
//!
//! The statement index is the program counter. Each handler returns where
//! execution continues, or a fatal marker that stops the script. Whatever
//! ends the run (natural end, termination request, fatal error), the
//! epilogue turns every channel off and marks the termination signal, so the
//! hardware is never left lit.
//!
//! `do-for-n` and `do-for` nest and therefore keep stacks; `do-at`,
//! `do-until` and `do-forever` are single-instance, matching the script
//! language.

use std::sync::Arc;

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::{Clock, next_occurrence};
use crate::driver::LedDriver;
use crate::lang::{CompiledScript, Statement, TimeOfDay};
use crate::logger::Logger;
use crate::signal::TerminationSignal;

/// Poll interval for blocking waits (`pause`, `do-at`).
const WAIT_POLL_MS: u64 = 1000;

/// Where execution continues after a statement.
enum NextStep {
    Goto(usize),
    Fatal,
}

pub struct ScriptCpu<'a> {
    driver: &'a mut dyn LedDriver,
    script: &'a CompiledScript,
    signal: Arc<TerminationSignal>,
    clock: Arc<dyn Clock>,
    logger: Logger,
    rng: StdRng,

    stmt_index: usize,
    // (opener index, remaining iterations)
    do_for_n: Vec<(usize, u32)>,
    // (opener index, start, duration)
    do_for: Vec<(usize, NaiveDateTime, chrono::Duration)>,
    do_at: Option<usize>,
    do_until: Option<(usize, NaiveDateTime)>,
    do_forever: Option<usize>,
}

impl<'a> ScriptCpu<'a> {
    pub fn new(
        driver: &'a mut dyn LedDriver,
        script: &'a CompiledScript,
        signal: Arc<TerminationSignal>,
        clock: Arc<dyn Clock>,
        logger: Logger,
    ) -> Self {
        ScriptCpu {
            driver,
            script,
            signal,
            clock,
            logger,
            rng: StdRng::from_os_rng(),
            stmt_index: 0,
            do_for_n: Vec::new(),
            do_for: Vec::new(),
            do_at: None,
            do_until: None,
            do_forever: None,
        }
    }

    /// Fix the `select-one` random source, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Run the program to its end. Returns false when a fatal error stopped
    /// the script early; termination by signal still counts as a clean run.
    pub fn run(&mut self) -> bool {
        self.logger.info("Virtual CPU running...");
        let mut fatal = false;

        while !self.signal.is_requested() && self.stmt_index < self.script.statements.len() {
            let statement = self.script.statements[self.stmt_index].clone();
            match self.execute(&statement) {
                NextStep::Fatal => {
                    self.logger.error("Virtual CPU stopped due to error");
                    fatal = true;
                    break;
                }
                NextStep::Goto(next) => {
                    if next >= self.script.statements.len() {
                        self.logger.info("End of script");
                        break;
                    }
                    self.stmt_index = next;
                }
            }
        }

        // End-of-script checks only apply when the script ran off its end
        if !self.signal.is_requested() {
            if !self.do_for.is_empty() {
                self.logger
                    .error(format!("{} unterminated do-for statements", self.do_for.len()));
            }
            if !self.do_for_n.is_empty() {
                self.logger.error(format!(
                    "{} unterminated do-for-n statements",
                    self.do_for_n.len()
                ));
            }
        }

        self.logger.info("Virtual CPU stopped");
        self.reset_channels();
        self.signal.mark_terminated();
        !fatal
    }

    fn execute(&mut self, statement: &Statement) -> NextStep {
        match statement {
            // Definitions were consumed by the compiler
            Statement::Color { .. } | Statement::Value { .. } => self.advance(),
            Statement::LogMessage(text) => self.log_message(text),
            Statement::DoForN(count) => self.do_for_n_open(*count),
            Statement::DoForNEnd => self.do_for_n_end(),
            Statement::DoFor(duration) => self.do_for_open(duration.as_seconds()),
            Statement::DoForEnd => self.do_for_end(),
            Statement::DoAt(time) => self.do_at_open(*time),
            Statement::DoAtEnd => self.do_at_end(),
            Statement::DoUntil(time) => self.do_until_open(*time),
            Statement::DoUntilEnd => self.do_until_end(),
            Statement::DoForever => self.do_forever_open(),
            Statement::DoForeverEnd => self.do_forever_end(),
            Statement::SelectOne(end_index) => self.select_one(*end_index),
            Statement::SelectOneEnd => self.advance(),
            Statement::Pause(duration) => self.pause(duration.as_seconds()),
            Statement::Reset => {
                self.reset_channels();
                self.advance()
            }
            Statement::SetPixel { index, color } => {
                let ok = self.driver.set_pixel_color(*index, *color);
                self.driver_call(ok, "set");
                self.advance()
            }
            Statement::Fill(color) => {
                let mut ok = true;
                for index in 0..self.driver.num_pixels() {
                    ok &= self.driver.set_pixel_color(index, *color);
                }
                self.driver_call(ok, "fill");
                self.advance()
            }
            Statement::Brightness(value) => {
                let ok = self.driver.set_brightness(*value);
                self.driver_call(ok, "brightness");
                self.advance()
            }
            Statement::Show => {
                let ok = self.driver.show();
                self.driver_call(ok, "show");
                self.advance()
            }
        }
    }

    #[inline]
    fn advance(&self) -> NextStep {
        NextStep::Goto(self.stmt_index + 1)
    }

    /// Substitute `$name` references from the symbol tables and log the text.
    fn log_message(&mut self, text: &str) -> NextStep {
        let mut message = text.to_string();
        for token in text.split_whitespace() {
            if let Some(symbol) = token.strip_prefix('$') {
                if let Some(substitution) = self.script.symbols.substitution(symbol) {
                    message = message.replace(token, &substitution);
                }
            }
        }
        self.logger.info(message);
        self.advance()
    }

    fn do_for_n_open(&mut self, count: u32) -> NextStep {
        self.do_for_n.push((self.stmt_index, count));
        self.advance()
    }

    fn do_for_n_end(&mut self) -> NextStep {
        let Some(top) = self.do_for_n.last_mut() else {
            return self.advance();
        };
        top.1 -= 1;
        if top.1 == 0 {
            self.logger.debug("Do-For-N loop ended");
            self.do_for_n.pop();
            self.advance()
        } else {
            self.logger.debug(format!("Do-For-N {}", top.1));
            let open_index = top.0;
            NextStep::Goto(open_index + 1)
        }
    }

    fn do_for_open(&mut self, seconds: u64) -> NextStep {
        let duration = chrono::Duration::seconds(seconds as i64);
        self.do_for.push((self.stmt_index, self.clock.now(), duration));
        self.logger.debug(format!("Do-For {}s", seconds));
        self.advance()
    }

    fn do_for_end(&mut self) -> NextStep {
        let Some(&(open_index, start, duration)) = self.do_for.last() else {
            return self.advance();
        };
        let now = self.clock.now();
        if now - start >= duration {
            self.logger.debug(format!("Do-For loop ended at {}", now));
            self.do_for.pop();
            self.advance()
        } else {
            NextStep::Goto(open_index + 1)
        }
    }

    fn do_at_open(&mut self, time: TimeOfDay) -> NextStep {
        // Re-entry while under do-at control is a no-op
        if self.do_at.is_some() {
            return self.advance();
        }

        let target = next_occurrence(self.clock.now(), time);
        self.do_at = Some(self.stmt_index);
        self.logger.info(format!("Waiting until {}...", target));

        // Blocking wait, re-checking the termination signal every second
        while !self.signal.is_requested() {
            self.clock.sleep_ms(WAIT_POLL_MS);
            let now = self.clock.now();
            if now >= target {
                self.logger.debug(format!("Do-At begins at {}", now));
                break;
            }
        }
        self.advance()
    }

    fn do_at_end(&mut self) -> NextStep {
        let Some(open_index) = self.do_at.take() else {
            self.logger.error("No matching do-at statement");
            return NextStep::Fatal;
        };
        // Back to the opener, which computes the next day's occurrence
        self.reset_channels();
        NextStep::Goto(open_index)
    }

    fn do_until_open(&mut self, time: TimeOfDay) -> NextStep {
        if self.do_until.is_some() {
            return self.advance();
        }
        let until = next_occurrence(self.clock.now(), time);
        self.do_until = Some((self.stmt_index, until));
        self.logger.debug(format!("Running until {}...", until));
        self.advance()
    }

    fn do_until_end(&mut self) -> NextStep {
        let Some((open_index, until)) = self.do_until else {
            self.logger.error("No matching do-until statement");
            return NextStep::Fatal;
        };
        // Let the main loop handle a pending termination
        if self.signal.is_requested() {
            return self.advance();
        }
        let now = self.clock.now();
        if now >= until {
            self.logger.debug(format!("Do-Until occurs at {}", now));
            self.advance()
        } else {
            NextStep::Goto(open_index + 1)
        }
    }

    fn do_forever_open(&mut self) -> NextStep {
        self.do_forever = Some(self.stmt_index);
        self.advance()
    }

    fn do_forever_end(&mut self) -> NextStep {
        // Unreachable without an opener in a validated program
        let Some(open_index) = self.do_forever else {
            self.logger.error("No matching do-forever statement");
            return NextStep::Fatal;
        };
        NextStep::Goto(open_index + 1)
    }

    /// Execute one randomly chosen member, then continue past the block.
    fn select_one(&mut self, end_index: usize) -> NextStep {
        let members = end_index - self.stmt_index - 1;
        let pick = self.rng.random_range(0..members);
        self.logger.debug(format!("select-one: {}", pick));

        let selected = self.script.statements[self.stmt_index + 1 + pick].clone();
        // Members are plain one-shot statements; their cursor value is
        // irrelevant and discarded
        let _ = self.execute(&selected);

        NextStep::Goto(end_index)
    }

    fn pause(&mut self, seconds: u64) -> NextStep {
        let end = self.clock.now() + chrono::Duration::seconds(seconds as i64);
        self.logger.debug(format!("Pausing for {}s", seconds));
        while !self.signal.is_requested() && self.clock.now() <= end {
            self.clock.sleep_ms(WAIT_POLL_MS);
        }
        self.advance()
    }

    fn reset_channels(&mut self) {
        let ok = self.driver.clear();
        self.driver_call(ok, "clear");
        self.logger.info("All LEDs reset");
    }

    fn driver_call(&self, ok: bool, what: &str) {
        if !ok {
            self.logger
                .warn(format!("{} failed on driver {}", what, self.driver.name()));
        }
    }
}

#[cfg(test)]
mod tests;
