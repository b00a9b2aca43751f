//! Rolling Logger
//!
//! Installs a `tracing` subscriber that writes to stderr and to a dated log
//! file (`<app>.<YYYY-MM-DD>.log`), keeps the most recent lines in memory and
//! forwards `log` records from library crates.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{Local, NaiveDate};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Number of lines kept in the in-memory ring buffer
pub const RECENT_CAPACITY: usize = 500;

/// Number of dated log files kept on disk
pub const MAX_LOG_FILES: usize = 7;

static RECENT: OnceLock<Arc<Mutex<VecDeque<String>>>> = OnceLock::new();

#[derive(Debug)]
pub enum LoggerError {
    Io(io::Error),
    AlreadyInitialized,
    NotInitialized,
}

impl std::fmt::Display for LoggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggerError::Io(e) => write!(f, "Log file error: {}", e),
            LoggerError::AlreadyInitialized => write!(f, "Logger already initialized"),
            LoggerError::NotInitialized => write!(f, "Logger not initialized"),
        }
    }
}

impl std::error::Error for LoggerError {}

impl From<io::Error> for LoggerError {
    fn from(e: io::Error) -> Self {
        LoggerError::Io(e)
    }
}

/// Initialize the global logger.
///
/// Level selection follows `RUST_LOG`, defaulting to `info`.
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    let recent = Arc::new(Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)));
    let writer = RollingWriter::new(log_dir.as_ref(), app_name, recent.clone())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    RECENT
        .set(recent)
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    tracing::info!(app = app_name, "logger initialized");
    Ok(())
}

/// Most recent log lines, oldest first
pub fn recent_lines() -> Vec<String> {
    RECENT
        .get()
        .and_then(|buf| buf.lock().ok().map(|b| b.iter().cloned().collect()))
        .unwrap_or_default()
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::info!("{}", msg);
    Ok(())
}

pub fn warn(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::warn!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::error!("{}", msg);
    Ok(())
}

fn ensure_initialized() -> Result<(), LoggerError> {
    RECENT.get().map(|_| ()).ok_or(LoggerError::NotInitialized)
}

struct FileState {
    date: NaiveDate,
    file: File,
    /// Trailing text of a line not yet terminated by `\n`
    pending: String,
}

/// Dated file writer shared by every `fmt` event
#[derive(Clone)]
pub struct RollingWriter {
    dir: PathBuf,
    app_name: String,
    state: Arc<Mutex<FileState>>,
    recent: Arc<Mutex<VecDeque<String>>>,
}

impl RollingWriter {
    pub fn new(
        dir: &Path,
        app_name: &str,
        recent: Arc<Mutex<VecDeque<String>>>,
    ) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let date = Local::now().date_naive();
        let file = open_log_file(dir, app_name, date)?;
        prune_old_files(dir, app_name, MAX_LOG_FILES)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            app_name: app_name.to_string(),
            state: Arc::new(Mutex::new(FileState {
                date,
                file,
                pending: String::new(),
            })),
            recent,
        })
    }

    fn write_line(&self, buf: &[u8]) -> io::Result<()> {
        let today = Local::now().date_naive();
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;

        if state.date != today {
            state.file = open_log_file(&self.dir, &self.app_name, today)?;
            state.date = today;
            // Pruning failures must not drop the line being written
            let _ = prune_old_files(&self.dir, &self.app_name, MAX_LOG_FILES);
        }
        state.file.write_all(buf)?;

        state.pending.push_str(&String::from_utf8_lossy(buf));
        if let Some(end) = state.pending.rfind('\n') {
            let complete: String = state.pending.drain(..=end).collect();
            if let Ok(mut recent) = self.recent.lock() {
                for line in complete.lines() {
                    if recent.len() == RECENT_CAPACITY {
                        recent.pop_front();
                    }
                    recent.push_back(line.to_string());
                }
            }
        }
        Ok(())
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_line(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn log_file_name(app_name: &str, date: NaiveDate) -> String {
    format!("{}.{}.log", app_name, date.format("%Y-%m-%d"))
}

fn open_log_file(dir: &Path, app_name: &str, date: NaiveDate) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(log_file_name(app_name, date)))
}

/// Remove all but the `keep` newest log files for `app_name`
fn prune_old_files(dir: &Path, app_name: &str, keep: usize) -> io::Result<()> {
    let prefix = format!("{}.", app_name);
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix) && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect();

    // Dated names sort chronologically
    files.sort();
    if files.len() > keep {
        for old in &files[..files.len() - keep] {
            fs::remove_file(old)?;
        }
    }
    Ok(())
}
