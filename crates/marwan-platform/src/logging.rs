use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Where log records are mirrored besides the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutput {
    Off,
    /// Everything on stderr, leaving stdout to command output.
    Stderr,
    /// Errors and warnings on stderr, the rest on stdout.
    Mixed,
}

/// How a process wants its log output routed.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub log_path: PathBuf,
    pub max_log_size: u64,
    pub verbose: bool,
    pub terminal: TerminalOutput,
}

struct ResilientFileWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ResilientFileWriter {
    fn new(path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn ensure_file(&self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            *guard = Some(file);
        }

        Ok(())
    }
}

impl Write for ResilientFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_file()?;
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(ref mut file) = *guard {
            file.write(buf)
        } else {
            Err(io::Error::other("File not available"))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(ref mut file) = *guard {
            file.flush()
        } else {
            Ok(())
        }
    }
}

fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) {
    if let Ok(metadata) = std::fs::metadata(log_path)
        && metadata.len() > max_log_size
        && let Ok(contents) = std::fs::read(log_path)
    {
        let half = contents.len() / 2;
        let keep_from = contents[half..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(half, |pos| half + pos + 1);
        let _ = std::fs::write(log_path, &contents[keep_from..]);
    }
}

/// Install the global logger. Calling it twice is harmless; the second
/// install is ignored by `log`.
pub fn init_logging(options: &LogOptions) {
    trim_log_file_if_oversized(&options.log_path, options.max_log_size);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("marwan")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    let terminal_mode = match options.terminal {
        TerminalOutput::Off => None,
        TerminalOutput::Stderr => Some(TerminalMode::Stderr),
        TerminalOutput::Mixed => Some(TerminalMode::Mixed),
    };
    if let Some(mode) = terminal_mode {
        loggers.push(TermLogger::new(
            LevelFilter::Debug,
            config.clone(),
            mode,
            ColorChoice::Auto,
        ));
    }

    match ResilientFileWriter::new(options.log_path.clone()) {
        Ok(writer) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, writer)),
        Err(error) => eprintln!(
            "Could not open log file {}: {error}",
            options.log_path.display()
        ),
    }

    if !loggers.is_empty() {
        let _ = CombinedLogger::init(loggers);
    }

    set_verbose(options.verbose);
    log::debug!("Logging initialized, log file: {}", options.log_path.display());
}

pub fn set_verbose(verbose: bool) {
    if verbose {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }
}
