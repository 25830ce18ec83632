//! Rotating file sink
//!
//! Writes one formatted line per record to a file and rotates it when a
//! size or age threshold is met. Rotated files are renamed to
//! `<file name>.<YYYYMMDD-HHMMSS.mmm>.<generation>` (plus `.gz` when
//! compressed); the generation counter keeps increasing across restarts
//! because it is seeded from the rotated files already on disk.

use crate::core::config::{DurationValue, SizeValue};
use crate::core::timestamp::rotation_stamp;
use crate::core::{
    Environment, ErrorReporter, LogRecord, LoggerError, RecordFormatter, Result, Sink,
    WriteOutcome,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const COMPRESSED_SUFFIX: &str = ".gz";
const TEMP_SUFFIX: &str = ".gz.tmp";

/// When the live file is rotated
///
/// # Examples
///
/// ```
/// use rust_log_dispatch::sinks::RotationStrategy;
/// use std::time::Duration;
///
/// // Rotate once the file reaches 10 MB
/// let by_size = RotationStrategy::size(10 * 1024 * 1024);
///
/// // Rotate on size OR age, whichever comes first
/// let hybrid = RotationStrategy::hybrid(50 * 1024 * 1024, Duration::from_secs(24 * 3600));
/// assert_eq!(hybrid.max_bytes(), Some(50 * 1024 * 1024));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationStrategy {
    /// Rotate when the tracked size reaches `max_bytes`
    Size { max_bytes: u64 },

    /// Rotate when `interval` has elapsed since the last rotation
    Time { interval: Duration },

    /// Rotate on size OR time, whichever comes first
    Hybrid { max_bytes: u64, interval: Duration },

    /// Never rotate (external rotation, tests)
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Size {
            max_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl RotationStrategy {
    #[must_use]
    pub fn size(max_bytes: u64) -> Self {
        RotationStrategy::Size { max_bytes }
    }

    #[must_use]
    pub fn time(interval: Duration) -> Self {
        RotationStrategy::Time { interval }
    }

    #[must_use]
    pub fn hybrid(max_bytes: u64, interval: Duration) -> Self {
        RotationStrategy::Hybrid { max_bytes, interval }
    }

    #[must_use]
    pub fn never() -> Self {
        RotationStrategy::Never
    }

    /// Size threshold, if the strategy has one
    #[must_use]
    pub fn max_bytes(&self) -> Option<u64> {
        match self {
            RotationStrategy::Size { max_bytes } | RotationStrategy::Hybrid { max_bytes, .. } => {
                Some(*max_bytes)
            }
            _ => None,
        }
    }

    /// Age threshold, if the strategy has one
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        match self {
            RotationStrategy::Time { interval } | RotationStrategy::Hybrid { interval, .. } => {
                Some(*interval)
            }
            _ => None,
        }
    }

    fn is_due(&self, current_size: u64, since_rotation: Duration) -> bool {
        let size_due = self.max_bytes().is_some_and(|max| current_size >= max);
        let time_due = self.interval().is_some_and(|every| since_rotation >= every);
        size_due || time_due
    }
}

/// Rotation strategy plus retention and compression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    pub strategy: RotationStrategy,
    /// Number of rotated files kept; older generations are deleted
    pub max_files: usize,
    /// Gzip rotated files
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_files: 5,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `with_strategy(RotationStrategy::Size { max_bytes })`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, max_bytes: u64) -> Self {
        self.strategy = RotationStrategy::Size { max_bytes };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

fn default_max_files() -> usize {
    5
}

/// File sink configuration as read from a config document
///
/// ```
/// use rust_log_dispatch::sinks::{FileSinkConfig, RotationStrategy};
/// use std::time::Duration;
///
/// let config: FileSinkConfig = serde_json::from_str(r#"{
///     "path": "logs/app.log",
///     "max_size": "10MB",
///     "rotation_interval": "1d",
///     "compress": true
/// }"#).unwrap();
///
/// let policy = config.rotation_policy().unwrap();
/// assert_eq!(
///     policy.strategy,
///     RotationStrategy::hybrid(10 * 1024 * 1024, Duration::from_secs(86_400))
/// );
/// assert_eq!(policy.max_files, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSinkConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub max_size: Option<SizeValue>,
    #[serde(default)]
    pub rotation_interval: Option<DurationValue>,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub format: RecordFormatter,
}

impl FileSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size: None,
            rotation_interval: None,
            max_files: default_max_files(),
            compress: false,
            format: RecordFormatter::default(),
        }
    }

    /// Resolve the size and interval strings into a policy
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unparseable or zero thresholds and
    /// for `max_files == 0`.
    pub fn rotation_policy(&self) -> Result<RotationPolicy> {
        let max_bytes = self.max_size.as_ref().map(SizeValue::to_bytes).transpose()?;
        let interval = self
            .rotation_interval
            .as_ref()
            .map(DurationValue::to_duration)
            .transpose()?;

        if max_bytes == Some(0) {
            return Err(LoggerError::config("RotatingFileSink", "max_size must be > 0"));
        }
        if interval == Some(Duration::ZERO) {
            return Err(LoggerError::config(
                "RotatingFileSink",
                "rotation_interval must be > 0",
            ));
        }
        if self.max_files == 0 {
            return Err(LoggerError::config("RotatingFileSink", "max_files must be > 0"));
        }

        let strategy = match (max_bytes, interval) {
            (Some(max_bytes), Some(interval)) => RotationStrategy::Hybrid { max_bytes, interval },
            (Some(max_bytes), None) => RotationStrategy::Size { max_bytes },
            (None, Some(interval)) => RotationStrategy::Time { interval },
            (None, None) => RotationStrategy::Never,
        };

        Ok(RotationPolicy {
            strategy,
            max_files: self.max_files,
            compress: self.compress,
        })
    }
}

/// Lifecycle of a [`RotatingFileSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSinkState {
    Open,
    Rotating,
    /// Terminal; writes fail with [`LoggerError::SinkClosed`]
    Closed,
}

/// A rotated file found next to the live file
#[derive(Debug, Clone, PartialEq, Eq)]
struct RotatedFile {
    path: PathBuf,
    generation: u64,
}

/// File sink with size and/or time based rotation
///
/// # Examples
///
/// ```no_run
/// use rust_log_dispatch::sinks::{RotatingFileSink, RotationPolicy};
///
/// let policy = RotationPolicy::new()
///     .with_max_size(50 * 1024 * 1024)
///     .with_max_files(7)
///     .with_compression(true);
/// let sink = RotatingFileSink::with_policy("/var/log/app.log", policy).unwrap();
/// ```
pub struct RotatingFileSink {
    base_path: PathBuf,
    policy: RotationPolicy,
    formatter: RecordFormatter,
    writer: Option<BufWriter<File>>,
    state: FileSinkState,
    current_size: u64,
    last_rotation: Instant,
    next_generation: u64,
    reporter: Option<ErrorReporter>,
}

impl RotatingFileSink {
    /// Open `path` with the default policy (10 MB, 5 files)
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size) = open_append(&base_path)?;
        let next_generation = scan_rotated(&base_path)?
            .last()
            .map_or(1, |newest| newest.generation + 1);

        Ok(Self {
            base_path,
            policy,
            formatter: RecordFormatter::default(),
            writer: Some(BufWriter::new(file)),
            state: FileSinkState::Open,
            current_size,
            last_rotation: Instant::now(),
            next_generation,
            reporter: None,
        })
    }

    /// Build from a config document entry
    ///
    /// # Errors
    ///
    /// Configuration errors abort construction; see
    /// [`FileSinkConfig::rotation_policy`].
    pub fn from_config(config: &FileSinkConfig) -> Result<Self> {
        let policy = config.rotation_policy()?;
        Ok(Self::with_policy(&config.path, policy)?.with_formatter(config.format.clone()))
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: RecordFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Bytes counted toward the size threshold: what the live file held at
    /// open plus writes since, restarting at zero after each rotation attempt
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    #[must_use]
    pub fn state(&self) -> FileSinkState {
        self.state
    }

    /// Rotated files currently on disk, oldest generation first
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read
    pub fn rotated_files(&self) -> Result<Vec<PathBuf>> {
        Ok(scan_rotated(&self.base_path)?
            .into_iter()
            .map(|rotated| rotated.path)
            .collect())
    }

    fn should_rotate(&self) -> bool {
        self.policy
            .strategy
            .is_due(self.current_size, self.last_rotation.elapsed())
    }

    fn rotate(&mut self) -> Result<()> {
        self.state = FileSinkState::Rotating;
        let result = self.rotate_files();
        self.state = FileSinkState::Open;
        result
    }

    fn rotate_files(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let rotated = self.rotated_path(self.next_generation);
        fs::rename(&self.base_path, &rotated).map_err(|e| {
            LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!("Failed to rename to '{}': {}", rotated.display(), e),
            )
        })?;
        self.next_generation += 1;

        if self.policy.compress {
            compress_file(&rotated)?;
        }
        self.enforce_retention();

        let (file, _) = open_append(&self.base_path)?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;
        self.last_rotation = Instant::now();
        Ok(())
    }

    fn rotated_path(&self, generation: u64) -> PathBuf {
        let mut path = self.base_path.clone();
        path.set_file_name(format!(
            "{}.{}.{}",
            file_name(&self.base_path),
            rotation_stamp(&Utc::now()),
            generation
        ));
        path
    }

    /// Delete the oldest generations beyond `max_files`
    fn enforce_retention(&self) {
        let rotated = match scan_rotated(&self.base_path) {
            Ok(rotated) => rotated,
            Err(e) => {
                eprintln!("[LOGGER WARNING] Skipping log retention: {}", e);
                return;
            }
        };
        let excess = rotated.len().saturating_sub(self.policy.max_files);
        for old in rotated.iter().take(excess) {
            if let Err(e) = fs::remove_file(&old.path) {
                eprintln!(
                    "[LOGGER WARNING] Failed to remove rotated log {}: {}",
                    old.path.display(),
                    e
                );
            }
        }
    }

    /// Keep writing to the live file after a failed rotation
    fn recover_from_rotation_failure(&mut self, error: LoggerError, record: &LogRecord) {
        eprintln!(
            "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
            error
        );

        if self.writer.is_none() {
            match open_append(&self.base_path) {
                Ok((file, _)) => {
                    self.writer = Some(BufWriter::new(file));
                }
                Err(reopen_err) => {
                    eprintln!(
                        "[LOGGER ERROR] Failed to reopen log file after rotation failure: {}",
                        reopen_err
                    );
                }
            }
        }

        // Both thresholds restart, so the next attempt comes one full
        // size or age threshold later.
        self.current_size = 0;
        self.last_rotation = Instant::now();

        if let Some(ref reporter) = self.reporter {
            reporter.defer(error, Some(Arc::new(record.clone())));
        }
    }

    fn write_line(&mut self, record: &LogRecord) -> Result<()> {
        if self.state == FileSinkState::Closed {
            return Err(LoggerError::sink_closed(self.name()));
        }

        if self.should_rotate() {
            if let Err(e) = self.rotate() {
                self.recover_from_rotation_failure(e, record);
            }
        }

        let mut line = self.formatter.format(record);
        line.push('\n');

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer.write_all(line.as_bytes()).map_err(|e| {
            LoggerError::file_sink(
                self.base_path.display().to_string(),
                format!("Failed to write log record: {}", e),
            )
        })?;
        self.current_size += line.len() as u64;
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn write(&mut self, record: &LogRecord) -> Result<WriteOutcome> {
        self.write_line(record)?;
        Ok(WriteOutcome::Immediate)
    }

    fn write_sync(&mut self, record: &LogRecord) -> Option<Result<()>> {
        Some(self.write_line(record).and_then(|_| self.flush()))
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.state == FileSinkState::Closed {
            return Ok(());
        }
        let result = self.flush();
        self.writer = None;
        self.state = FileSinkState::Closed;
        result
    }

    fn supports(&self, environment: Environment) -> bool {
        environment == Environment::Native
    }

    fn attach(&mut self, reporter: ErrorReporter) {
        self.reporter = Some(reporter);
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("app.log")
}

/// Open for append; returns the file and its current length
fn open_append(path: &Path) -> Result<(File, u64)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::file_sink(path.display().to_string(), format!("Failed to open: {}", e))
        })?;
    let size = file
        .metadata()
        .map_err(|e| {
            LoggerError::file_sink(
                path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?
        .len();
    Ok((file, size))
}

/// Parse `<stamp>.<generation>[.gz]` following `<file name>.`
fn parse_generation(rotated_name: &str, base_name: &str) -> Option<u64> {
    let rest = rotated_name.strip_prefix(base_name)?.strip_prefix('.')?;
    let rest = rest.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(rest);
    let (stamp, generation) = rest.rsplit_once('.')?;
    if stamp.is_empty() || !generation.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    generation.parse().ok()
}

/// Rotated siblings of `base_path`, sorted by generation
fn scan_rotated(base_path: &Path) -> Result<Vec<RotatedFile>> {
    let dir = match base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };
    let base_name = file_name(base_path);

    let entries = fs::read_dir(&dir).map_err(|e| {
        LoggerError::io_operation(
            "scan rotated logs",
            format!("Failed to read directory '{}'", dir.display()),
            e,
        )
    })?;

    let mut rotated: Vec<RotatedFile> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let generation = parse_generation(name.to_str()?, base_name)?;
            Some(RotatedFile {
                path: entry.path(),
                generation,
            })
        })
        .collect();
    rotated.sort_by_key(|r| r.generation);
    Ok(rotated)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Gzip `path` through a temp file; the original is removed only after the
/// compressed file is in place
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, Read};

    let gz_path = with_suffix(path, COMPRESSED_SUFFIX);
    let temp_gz_path = with_suffix(path, TEMP_SUFFIX);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp_gz_path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!(
                "Failed to create temporary compressed file: {}",
                temp_gz_path.display()
            ),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let cleanup = |e: std::io::Error, message: &str| {
        let _ = fs::remove_file(&temp_gz_path);
        LoggerError::io_operation("compress log file", message.to_string(), e)
    };

    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| cleanup(e, "Failed to read rotated file"))?;
        if bytes_read == 0 {
            break;
        }
        encoder
            .write_all(&buffer[..bytes_read])
            .map_err(|e| cleanup(e, "Failed to compress data chunk"))?;
    }

    encoder
        .finish()
        .and_then(|mut inner| inner.flush())
        .map_err(|e| cleanup(e, "Failed to finish compression"))?;

    fs::rename(&temp_gz_path, &gz_path)
        .map_err(|e| cleanup(e, "Failed to move compressed file into place"))?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove {}: {}. \
             Both compressed and uncompressed versions exist.",
            path.display(),
            e
        );
    }
    Ok(())
}
