// log.rs - Append-only JSONL audit log.
//
// One JSON object per line. Each entry is linked to the previous one via
// `previous_hash` (SHA-256 of the previous raw line), forming a hash chain:
// inserting, deleting or modifying a past entry is detected by
// `verify_chain`.
//
// The log is the only shared mutable state in the request pipeline. All
// appends go through one mutex, and each entry is written with a single
// `write_all` of the complete line on a file opened in append mode, so two
// concurrent requests can never produce an interleaved or merged line.
//
// A write that fails part way is truncated back to the previous end of file.
// If that also fails the log is marked torn and refuses every later append.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use crate::entry::AuditEntry;
use crate::error::AuditError;
use crate::hasher;

/// An append-only audit log backed by a JSONL file.
///
/// `AuditLog` is `Send + Sync`; share it behind an `Arc` and call
/// [`append`](Self::append) from any thread.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    state: Mutex<ChainState>,
}

#[derive(Debug, Default)]
struct ChainState {
    /// Opened on first append.
    file: Option<File>,
    /// Hash of the last line written, used as the next entry's `previous_hash`.
    last_hash: Option<String>,
    /// A partial line could not be rolled back.
    torn: bool,
}

impl AuditLog {
    /// Create a log handle without touching the filesystem.
    ///
    /// The parent directory and the file are created on the first append.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Open (or create) an audit log at the given path right away.
    ///
    /// If the file already exists, the hash of its last line is recovered so
    /// new entries link correctly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let log = Self::new(path);
        let (file, last_hash) = open_for_append(&log.path)?;
        {
            let mut state = log.state.lock().map_err(|_| AuditError::LockPoisoned)?;
            state.file = Some(file);
            state.last_hash = last_hash;
        }
        Ok(log)
    }

    /// Append an entry to the log.
    ///
    /// Fills in `timestamp` if the caller left it empty, sets
    /// `previous_hash`, and syncs the line to disk before returning.
    pub fn append(&self, entry: &mut AuditEntry) -> Result<(), AuditError> {
        let mut guard = self.state.lock().map_err(|_| AuditError::LockPoisoned)?;
        let state = &mut *guard;
        if state.torn {
            return Err(AuditError::Torn {
                path: self.path.clone(),
            });
        }

        let file = match state.file.take() {
            Some(file) => file,
            None => {
                let (file, last_hash) = open_for_append(&self.path)?;
                state.last_hash = last_hash;
                file
            }
        };
        let file = state.file.insert(file);

        if entry.timestamp.is_none() {
            entry.timestamp = Some(Utc::now());
        }
        entry.previous_hash = state.last_hash.clone();

        let json = serde_json::to_string(entry)?;
        let mut line = String::with_capacity(json.len() + 1);
        line.push_str(&json);
        line.push('\n');

        match write_line(file, line.as_bytes()) {
            Ok(()) => {}
            Err(WriteFailure::RolledBack(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "audit append failed");
                return Err(AuditError::WriteFailed(e));
            }
            Err(WriteFailure::Torn(e)) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "audit append failed and the partial line could not be removed"
                );
                state.torn = true;
                state.file = None;
                return Err(AuditError::WriteFailed(e));
            }
        }
        state.last_hash = Some(hasher::hash_str(&json));

        tracing::info!(
            user_email = %entry.user_email,
            resource = %entry.resource,
            decision = %entry.decision,
            rows_returned = entry.rows_returned,
            "audit entry appended"
        );
        Ok(())
    }

    /// Append a caller-supplied mapping (e.g. from an orchestrator tool call).
    ///
    /// The mapping must carry the audit entry fields; `timestamp` is optional.
    /// Returns the success token `"ok"`.
    pub fn record(&self, entry: serde_json::Value) -> Result<&'static str, AuditError> {
        let mut entry: AuditEntry = serde_json::from_value(entry)?;
        self.append(&mut entry)?;
        Ok("ok")
    }

    /// Read all entries from a log file, oldest first. Skips blank lines.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }

        Ok(entries)
    }

    /// Verify the integrity of a log file's hash chain.
    ///
    /// Returns `Ok(n)` with the number of entries checked, or an
    /// `IntegrityViolation` naming the first line whose `previous_hash` does
    /// not match the hash of the line before it.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut previous_hash: Option<String> = None;
        let mut checked = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line)?;
            if entry.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: entry.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }

            // Hash the raw line, not a re-serialization: field order matters.
            previous_hash = Some(hasher::hash_str(&line));
            checked += 1;
        }

        Ok(checked)
    }

    /// Return the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The file operations an append needs to undo a partial write.
trait LogFile: Write {
    fn end(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn end(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

#[derive(Debug)]
enum WriteFailure {
    /// Nothing of the line remains in the file.
    RolledBack(io::Error),
    /// Some of the line may remain in the file.
    Torn(io::Error),
}

/// Write and sync one whole line, or leave the file as it was.
fn write_line<F: LogFile>(file: &mut F, line: &[u8]) -> Result<(), WriteFailure> {
    let end = file.end().map_err(WriteFailure::RolledBack)?;
    let Err(e) = file.write_all(line).and_then(|()| file.sync()) else {
        return Ok(());
    };
    match file.truncate(end).and_then(|()| file.sync()) {
        Ok(()) => Err(WriteFailure::RolledBack(e)),
        Err(_) => Err(WriteFailure::Torn(e)),
    }
}

/// Create the parent directory if needed, recover the chain head from any
/// existing content, and open the file for appending.
fn open_for_append(path: &Path) -> Result<(File, Option<String>), AuditError> {
    let open_failed = |source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(open_failed)?;
    }

    let last_hash = if path.exists() {
        read_last_hash(path)?
    } else {
        None
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_failed)?;

    Ok((file, last_hash))
}

fn read_last_hash(path: &Path) -> Result<Option<String>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let mut last_line: Option<String> = None;

    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            last_line = Some(line);
        }
    }

    Ok(last_line.map(|line| hasher::hash_str(&line)))
}
