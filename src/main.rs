use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;

use ledscript::clock::{Clock, SystemClock};
use ledscript::config::Configuration;
use ledscript::driver::{LedDriver, MemoryStrip};
use ledscript::engine::LedEngine;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LED show-control script engine",
    long_about = "Compiles a show-control script and runs it against an LED string.\n\
    The script is selected from the configuration calendar for today's date\n\
    unless one is given explicitly."
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "FILE", default_value = "led.conf")]
    config: PathBuf,

    /// Script file to run, overriding the configured selection
    #[arg(short, long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Compile the script and exit without executing
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Configuration::load(&cli.config)?;
    let logger = config.build_logger();
    let clock = Arc::new(SystemClock::new());

    let script_path = match &cli.script {
        Some(path) => path.clone(),
        None => {
            let today = clock.now().date();
            match config.script_for_date(today) {
                Some(path) => PathBuf::from(path),
                None => bail!("no script configured for {}", today),
            }
        }
    };
    let source = fs::read_to_string(&script_path)
        .with_context(|| format!("Unable to read script {}", script_path.display()))?;

    let mut engine = LedEngine::new(logger.clone(), clock);
    if let Err(e) = engine.compile(&source) {
        bail!("{}: {}", script_path.display(), e);
    }
    if cli.check {
        return Ok(());
    }

    // The hardware drivers and the GPIO-backed button live with the platform
    // layer; a host run drives the in-memory strip and terminates with the
    // script.
    let mut strip = MemoryStrip::new();
    if !strip.open(&config) {
        bail!("unable to open LED driver {}", strip.name());
    }
    strip.set_brightness(config.brightness);

    let ok = engine.execute(&mut strip);
    strip.close();
    if !ok {
        bail!("script stopped on an error");
    }
    Ok(())
}
