//! Colored, paced operator output behind the `log` facade.
//!
//! Every line is followed by a short pause so an operator watching a fresh
//! VM can follow along.

use anyhow::{anyhow, Result};
use console::style;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::time::Duration;

pub struct ConsoleLogger {
    pace: Duration,
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(pace: Duration, level: LevelFilter) -> Self {
        Self { pace, level }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), &record.args().to_string());
        match record.level() {
            Level::Error | Level::Warn => eprintln!("{}", line),
            _ => println!("{}", line),
        }
        if !self.pace.is_zero() {
            std::thread::sleep(self.pace);
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Install the console logger. Fails if a logger is already set.
pub fn init(pace: Duration, verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    log::set_boxed_logger(Box::new(ConsoleLogger::new(pace, level)))
        .map_err(|e| anyhow!("install logger: {}", e))?;
    log::set_max_level(level);
    Ok(())
}

pub fn format_line(level: Level, message: &str) -> String {
    let tag = match level {
        Level::Error => style("[ERROR]").red().bold(),
        Level::Warn => style("[WARN]").yellow().bold(),
        Level::Info => style("[INFO]").green().bold(),
        Level::Debug | Level::Trace => style("[DEBUG]").dim(),
    };
    format!("{} {}", tag, message)
}

/// Print a fatal error chain; usable before the logger is installed.
pub fn fatal(err: &anyhow::Error) {
    eprintln!("{}", format_line(Level::Error, &format!("{:#}", err)));
}
