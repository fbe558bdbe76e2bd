use std::sync::Arc;

use crate::clock::mock::MockClock;
use crate::compiler::ScriptCompiler;
use crate::config::Configuration;
use crate::cpu::ScriptCpu;
use crate::driver::LedDriver;
use crate::lang::CompiledScript;
use crate::logger::Logger;
use crate::signal::TerminationSignal;

mod selection;

/// Recording driver. Can request termination after a fixed number of `show`
/// calls, standing in for the hold-click watch in tests of unbounded loops.
pub(crate) struct TestStrip {
    pub pixels: Vec<u32>,
    pub show_count: usize,
    pub clear_count: usize,
    pub set_calls: Vec<(usize, u32)>,
    pub brightness: u8,
    show_budget: Option<(usize, Arc<TerminationSignal>)>,
}

impl TestStrip {
    pub fn new(pixels: usize) -> Self {
        TestStrip {
            pixels: vec![0; pixels],
            show_count: 0,
            clear_count: 0,
            set_calls: Vec::new(),
            brightness: 255,
            show_budget: None,
        }
    }

    pub fn terminate_after_shows(mut self, shows: usize, signal: Arc<TerminationSignal>) -> Self {
        self.show_budget = Some((shows, signal));
        self
    }

    pub fn is_dark(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }
}

impl LedDriver for TestStrip {
    fn name(&self) -> &str {
        "TestStrip"
    }

    fn open(&mut self, _config: &Configuration) -> bool {
        true
    }

    fn num_pixels(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel_color(&mut self, index: usize, color: u32) -> bool {
        match self.pixels.get_mut(index) {
            Some(pixel) => {
                *pixel = color;
                self.set_calls.push((index, color));
                true
            }
            None => false,
        }
    }

    fn set_brightness(&mut self, brightness: u8) -> bool {
        self.brightness = brightness;
        true
    }

    fn show(&mut self) -> bool {
        self.show_count += 1;
        if let Some((budget, signal)) = &self.show_budget {
            if self.show_count >= *budget {
                signal.request_terminate();
            }
        }
        true
    }

    fn clear(&mut self) -> bool {
        self.clear_count += 1;
        self.pixels.fill(0);
        true
    }

    fn close(&mut self) -> bool {
        true
    }
}

pub(crate) fn compile(source: &str) -> CompiledScript {
    ScriptCompiler::new()
        .compile(source)
        .expect("test script should compile")
}

pub(crate) fn run(
    script: &CompiledScript,
    strip: &mut TestStrip,
    clock: &MockClock,
    signal: &Arc<TerminationSignal>,
) -> bool {
    run_with_logger(script, strip, clock, signal, Logger::sink_less())
}

pub(crate) fn run_with_logger(
    script: &CompiledScript,
    strip: &mut TestStrip,
    clock: &MockClock,
    signal: &Arc<TerminationSignal>,
    logger: Logger,
) -> bool {
    let mut cpu = ScriptCpu::new(
        strip,
        script,
        signal.clone(),
        Arc::new(clock.clone()),
        logger,
    )
    .with_seed(7);
    cpu.run()
}
