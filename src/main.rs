#[macro_use]
extern crate log;

use std::env::consts::{ARCH, FAMILY, OS};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Error;
use clap::Parser;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger,
};

use wallrotate::config::app::APP_CONFIG_NAME;
use wallrotate::config::{AppConfig, LoggingSettings};

use crate::program::{Cli, Program};

mod program;

/// A buffered file writer that flushes every few lines and on drop.
struct BufferedFileWriter {
    inner: Arc<Mutex<BufWriter<std::fs::File>>>,
    line_count: Arc<Mutex<usize>>,
}

impl BufferedFileWriter {
    fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let buffered_writer = BufWriter::with_capacity(64 * 1024, file); // 64KB buffer

        Ok(Self {
            inner: Arc::new(Mutex::new(buffered_writer)),
            line_count: Arc::new(Mutex::new(0)),
        })
    }
}

impl Write for BufferedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire lock"))?;

        let size = writer.write(buf)?;

        if let Ok(mut count) = self.line_count.lock() {
            if buf.contains(&b'\n') {
                *count += buf.iter().filter(|&&b| b == b'\n').count();

                // Flush every 50 lines
                if *count % 50 == 0 {
                    writer.flush()?;
                }
            }
        }

        Ok(size)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire lock"))?;
        writer.flush()
    }
}

impl Drop for BufferedFileWriter {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.inner.lock() {
            let _ = writer.flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_create(Path::new(APP_CONFIG_NAME))?;
    initialize_logger(&config.logging, config.log_level());
    log_system_information();

    let program = Program::new(config);
    program.run(cli).await
}

/// Initializes the terminal logger and, when enabled, the file logger.
fn initialize_logger(settings: &LoggingSettings, level: LevelFilter) {
    let term_only = || {
        let _ = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);
    };

    if !settings.log_to_file {
        term_only();
        return;
    }

    let mut config = ConfigBuilder::new();
    config.add_filter_allow_str("wallrotate");

    let buffered_file_writer = match BufferedFileWriter::new(Path::new(&settings.log_file)) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!(
                "Failed to open log file {}: {}. Logging will only output to terminal.",
                settings.log_file, e
            );
            term_only();
            return;
        }
    };

    if let Err(e) = CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::max(), config.build(), buffered_file_writer),
    ]) {
        eprintln!("Failed to initialize combined logger: {}. Falling back to terminal-only logging.", e);
        term_only();
    }
}

/// Logs information about the system being used.
fn log_system_information() {
    trace!("ARCH:   \"{}\"", ARCH);
    trace!("FAMILY: \"{}\"", FAMILY);
    trace!("OS:     \"{}\"", OS);
}
