//! Rotating file sink
//!
//! Appends formatted lines to a file and rolls it by size or by age. A
//! rolled file is renamed to `<file>.<YYYYMMDD-HHMMSS.nnnnnnnnn>` (optionally
//! gzip-compressed) and the oldest backups beyond the retention limit are
//! deleted.

use crate::core::{FormatterChain, LogEntry, LoggerError, Result, Sink};
use chrono::Local;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Layout of the timestamp suffix appended to rolled files
const BACKUP_SUFFIX_LAYOUT: &str = "%Y%m%d-%H%M%S%.9f";

/// When to roll the current file
///
/// # Examples
///
/// ```
/// use fanout_logger::RotationStrategy;
/// use std::time::Duration;
///
/// // Roll when the file would exceed 100 MB
/// let size_strategy = RotationStrategy::size(100 * 1024 * 1024);
///
/// // Roll every hour
/// let time_strategy = RotationStrategy::time(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationStrategy {
    /// Roll before a write that would take the file past `max_bytes`
    Size { max_bytes: u64 },

    /// Roll on the first write after the file has been open for `interval`
    Time { interval: Duration },

    /// No rotation
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
}

/// Rotation strategy plus backup retention
///
/// # Examples
///
/// ```
/// use fanout_logger::{RotationPolicy, RotationStrategy};
///
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::size(50 * 1024 * 1024))
///     .with_max_backups(7)
///     .with_compression(true);
/// assert_eq!(policy.max_backups, 7);
/// ```
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    pub strategy: RotationStrategy,
    /// Rolled files kept; the open file is not counted
    pub max_backups: usize,
    /// Gzip rolled files
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backups: 5,
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

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(self, max_bytes: u64) -> Self {
        self.with_strategy(RotationStrategy::Size { max_bytes })
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

/// Mutable state, owned by whichever thread holds the lock
struct FileState {
    file: File,
    /// Bytes written since the file was (re)opened
    written: u64,
    opened_at: Instant,
    /// Rolled files, oldest first
    backups: VecDeque<PathBuf>,
}

/// File sink with size or time based rotation
///
/// # Examples
///
/// ```no_run
/// use fanout_logger::{RotatingFileSink, RotationPolicy, RotationStrategy};
/// use std::time::Duration;
///
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::time(Duration::from_secs(3600)))
///     .with_max_backups(24);
/// let sink = RotatingFileSink::new("/var/log/app.log", policy).unwrap();
/// ```
pub struct RotatingFileSink {
    path: PathBuf,
    policy: RotationPolicy,
    chain: FormatterChain,
    state: Mutex<FileState>,
}

impl RotatingFileSink {
    /// Open (or create) `path` for appending
    ///
    /// Backups of `path` already on disk are adopted into the retention
    /// window, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a `FileSinkError` if the directory or file cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::file_sink(
                    path.display().to_string(),
                    format!("Failed to create directory '{}': {}", parent.display(), e),
                )
            })?;
        }

        let file = open_append(&path)
            .map_err(|e| LoggerError::file_sink(path.display().to_string(), format!("Failed to open: {}", e)))?;
        let written = file
            .metadata()
            .map_err(|e| {
                LoggerError::file_sink(
                    path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();

        let backups = existing_backups(&path);

        Ok(Self {
            path,
            policy,
            chain: FormatterChain::default(),
            state: Mutex::new(FileState {
                file,
                written,
                opened_at: Instant::now(),
                backups,
            }),
        })
    }

    #[must_use]
    pub fn with_chain(mut self, chain: FormatterChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Bytes written to the open file since it was opened
    pub fn current_size(&self) -> u64 {
        self.state.lock().written
    }

    /// Retained backups, oldest first
    pub fn backups(&self) -> Vec<PathBuf> {
        self.state.lock().backups.iter().cloned().collect()
    }

    fn should_roll(&self, state: &FileState, incoming: u64) -> bool {
        match &self.policy.strategy {
            RotationStrategy::Never => false,
            RotationStrategy::Size { max_bytes } => {
                state.written > 0 && state.written + incoming > *max_bytes
            }
            RotationStrategy::Time { interval } => state.opened_at.elapsed() > *interval,
        }
    }

    /// Close the open file, archive it as a backup, open a fresh one and
    /// prune old backups
    fn roll(&self, state: &mut FileState) -> Result<()> {
        state.file.flush().map_err(|e| {
            LoggerError::file_rotation(
                self.path.display().to_string(),
                format!("Failed to flush before rotation: {}", e),
            )
        })?;

        let backup = self.next_backup_path();
        fs::rename(&self.path, &backup).map_err(|e| {
            LoggerError::file_rotation(
                self.path.display().to_string(),
                format!("Failed to rename to '{}': {}", backup.display(), e),
            )
        })?;

        let file = match open_append(&self.path) {
            Ok(file) => file,
            Err(e) => {
                // put the old file back so the open handle and the path agree again
                let _ = fs::rename(&backup, &self.path);
                return Err(LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to create new log file: {}", e),
                ));
            }
        };

        state.file = file;
        state.written = 0;
        state.opened_at = Instant::now();

        let mut outcome = Ok(());
        let archived = if self.policy.compress {
            match compress_file(&backup) {
                Ok(gz) => gz,
                Err(e) => {
                    outcome = Err(e);
                    backup
                }
            }
        } else {
            backup
        };
        state.backups.push_back(archived);

        self.prune(state).and(outcome)
    }

    /// Delete the oldest backups until at most `max_backups` remain
    fn prune(&self, state: &mut FileState) -> Result<()> {
        while state.backups.len() > self.policy.max_backups {
            let Some(oldest) = state.backups.pop_front() else {
                break;
            };
            match fs::remove_file(&oldest) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    // keep it tracked so the next roll retries
                    state.backups.push_front(oldest.clone());
                    return Err(LoggerError::file_rotation(
                        oldest.display().to_string(),
                        format!("Failed to remove old backup: {}", e),
                    ));
                }
            }
        }
        Ok(())
    }

    /// `<file>.<timestamp>`, suffixed `-N` if that name is taken
    fn next_backup_path(&self) -> PathBuf {
        let stamp = Local::now().format(BACKUP_SUFFIX_LAYOUT).to_string();
        let base = format!("{}.{}", file_name_of(&self.path), stamp);

        let mut candidate = self.path.with_file_name(&base);
        let mut n = 1;
        while candidate.exists() || gz_path(&candidate).exists() {
            candidate = self.path.with_file_name(format!("{}-{}", base, n));
            n += 1;
        }
        candidate
    }
}

impl Sink for RotatingFileSink {
    /// Write one line, rolling first when the policy says so
    ///
    /// A failed roll or prune is returned as an error after the line has
    /// been written to the file that is still open, so the record is kept.
    fn write(&self, entry: &Arc<LogEntry>) -> Result<()> {
        let mut line = self.chain.render_line(entry);
        line.push('\n');
        let bytes = line.as_bytes();

        let mut state = self.state.lock();

        let mut roll_result = Ok(());
        if self.should_roll(&state, bytes.len() as u64) {
            roll_result = self.roll(&mut state);
            if roll_result.is_err() {
                // stop retrying on every write; the file may grow past the limit
                state.written = 0;
                state.opened_at = Instant::now();
            }
        }

        state.file.write_all(bytes).map_err(|e| {
            LoggerError::file_sink(
                self.path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        state.written += bytes.len() as u64;

        roll_result
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.file.flush()?;
        state.file.sync_data().or_else(|e| {
            // not every target supports fsync (pipes, some special files)
            if e.kind() == io::ErrorKind::InvalidInput {
                Ok(())
            } else {
                Err(e)
            }
        })?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app.log".to_string())
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Backups of `path` already on disk, oldest first
///
/// Suffixes are fixed-width timestamps, so name order is creation order.
fn existing_backups(path: &Path) -> VecDeque<PathBuf> {
    let prefix = format!("{}.", file_name_of(path));
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };

    let Ok(entries) = fs::read_dir(&dir) else {
        return VecDeque::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| {
            name.strip_prefix(&prefix)
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
                && !name.ends_with(".tmp")
        })
        .collect();
    names.sort();

    names.into_iter().map(|name| dir.join(name)).collect()
}

/// Gzip `path` into `<path>.gz` with streaming I/O, removing the original
/// only once the compressed file is complete
fn compress_file(path: &Path) -> Result<PathBuf> {
    use std::io::{BufReader, BufWriter, Read};

    let gz = gz_path(path);
    let mut temp = gz.clone().into_os_string();
    temp.push(".tmp");
    let temp_gz_path = PathBuf::from(temp);

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
            format!("Failed to create temporary compressed file: {}", temp_gz_path.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; 64 * 1024];
    let streamed: io::Result<()> = (|| {
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            encoder.write_all(&buffer[..bytes_read])?;
        }
        encoder.finish()?.flush()
    })();

    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp_gz_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress '{}'", path.display()),
            e,
        ));
    }

    fs::rename(&temp_gz_path, &gz).map_err(|e| {
        let _ = fs::remove_file(&temp_gz_path);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove original file {}: {}. \
             Both compressed and uncompressed versions exist.",
            path.display(),
            e
        );
    }

    Ok(gz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use std::thread;
    use tempfile::tempdir;

    /// Sink whose lines are exactly `INFO <24 chars>\n`, 30 bytes each
    fn fixed_width_sink(path: &Path, policy: RotationPolicy) -> RotatingFileSink {
        RotatingFileSink::new(path, policy)
            .expect("open sink")
            .with_chain(FormatterChain::empty())
    }

    fn record(i: usize) -> Arc<LogEntry> {
        Arc::new(LogEntry::new(LogLevel::Info, format!("{:0>24}", i)))
    }

    #[test]
    fn test_creation_reports_size_of_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("existing.log");
        fs::write(&path, "0123456789").unwrap();

        let sink = RotatingFileSink::new(&path, RotationPolicy::new()).unwrap();
        assert_eq!(sink.current_size(), 10);
        assert_eq!(sink.path(), path);
    }

    #[test]
    fn test_creation_fails_for_unusable_path() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let err = RotatingFileSink::new(blocker.join("app.log"), RotationPolicy::new())
            .expect_err("parent is a file");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_size_rotation_rolls_once_past_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("size.log");
        let sink = fixed_width_sink(&path, RotationPolicy::new().with_max_size(100).with_max_backups(2));

        for i in 0..3 {
            sink.write(&record(i)).unwrap();
        }
        assert!(sink.backups().is_empty());
        assert_eq!(sink.current_size(), 90);

        // 90 + 30 > 100
        sink.write(&record(3)).unwrap();
        assert_eq!(sink.backups().len(), 1);
        assert_eq!(sink.current_size(), 30);
    }

    #[test]
    fn test_retention_keeps_most_recent_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retain.log");
        let sink = fixed_width_sink(&path, RotationPolicy::new().with_max_size(100).with_max_backups(2));

        // rolls before records 3, 6, 9 and 12
        for i in 0..13 {
            sink.write(&record(i)).unwrap();
        }
        sink.close().unwrap();

        let backups = sink.backups();
        assert_eq!(backups.len(), 2);

        let on_disk: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "retain.log")
            .collect();
        assert_eq!(on_disk.len(), 2);

        let older = fs::read_to_string(&backups[0]).unwrap();
        let newer = fs::read_to_string(&backups[1]).unwrap();
        assert!(older.starts_with(&format!("INFO {:0>24}", 6)));
        assert!(newer.starts_with(&format!("INFO {:0>24}", 9)));
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("INFO {:0>24}\n", 12));
    }

    #[test]
    fn test_zero_backups_keeps_only_open_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("none.log");
        let sink = fixed_width_sink(&path, RotationPolicy::new().with_max_size(40).with_max_backups(0));

        for i in 0..4 {
            sink.write(&record(i)).unwrap();
        }

        assert!(sink.backups().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_oversized_record_goes_to_fresh_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.log");
        let sink = fixed_width_sink(&path, RotationPolicy::new().with_max_size(10).with_max_backups(3));

        // an empty file never rolls, even for a record above the limit
        sink.write(&record(0)).unwrap();
        assert!(sink.backups().is_empty());

        sink.write(&record(1)).unwrap();
        assert_eq!(sink.backups().len(), 1);
    }

    #[test]
    fn test_time_rotation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("time.log");
        let policy = RotationPolicy::new()
            .with_strategy(RotationStrategy::time(Duration::from_millis(50)))
            .with_max_backups(3);
        let sink = fixed_width_sink(&path, policy);

        sink.write(&record(0)).unwrap();
        sink.write(&record(1)).unwrap();
        assert!(sink.backups().is_empty());

        thread::sleep(Duration::from_millis(80));
        sink.write(&record(2)).unwrap();

        assert_eq!(sink.backups().len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("INFO {:0>24}\n", 2));
    }

    #[test]
    fn test_never_strategy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never.log");
        let policy = RotationPolicy::new().with_strategy(RotationStrategy::Never);
        let sink = fixed_width_sink(&path, policy);

        for i in 0..100 {
            sink.write(&record(i)).unwrap();
        }
        assert!(sink.backups().is_empty());
        assert_eq!(sink.current_size(), 3000);
    }

    #[test]
    fn test_compressed_backups() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let dir = tempdir().unwrap();
        let path = dir.path().join("gz.log");
        let policy = RotationPolicy::new()
            .with_max_size(50)
            .with_max_backups(2)
            .with_compression(true);
        let sink = fixed_width_sink(&path, policy);

        sink.write(&record(0)).unwrap();
        sink.write(&record(1)).unwrap();

        let backups = sink.backups();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].extension().and_then(|e| e.to_str()), Some("gz"));

        let mut decoded = String::new();
        GzDecoder::new(File::open(&backups[0]).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, format!("INFO {:0>24}\n", 0));
    }

    #[test]
    fn test_existing_backups_are_adopted_oldest_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("adopt.log");
        let old = dir.path().join("adopt.log.20200101-000000.000000001");
        let newer = dir.path().join("adopt.log.20200101-000000.000000002.gz");
        fs::write(&newer, "b").unwrap();
        fs::write(&old, "a").unwrap();
        fs::write(dir.path().join("adopt.log.notes"), "ignored").unwrap();

        let sink = fixed_width_sink(&path, RotationPolicy::new().with_max_size(40).with_max_backups(2));
        assert_eq!(sink.backups(), vec![old.clone(), newer.clone()]);

        sink.write(&record(0)).unwrap();
        sink.write(&record(1)).unwrap();

        assert!(!old.exists());
        assert!(newer.exists());
        assert_eq!(sink.backups().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_roll_keeps_writing() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("vanishing");
        let path = sub.join("app.log");
        let sink = fixed_width_sink(&path, RotationPolicy::new().with_max_size(80).with_max_backups(2));

        sink.write(&record(0)).unwrap();
        sink.write(&record(1)).unwrap();
        fs::remove_dir_all(&sub).unwrap();

        let err = sink.write(&record(2)).expect_err("rename must fail");
        assert!(matches!(err, LoggerError::FileRotationError { .. }));
        assert_eq!(sink.current_size(), 30);

        // the count was reset, so the next record is written without a roll
        sink.write(&record(3)).unwrap();
        assert_eq!(sink.current_size(), 60);
    }
}
