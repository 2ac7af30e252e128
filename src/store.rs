//! Persistent reference tables linking aircraft identity data.
//!
//! Two independent key-value tables accumulate over the process lifetime:
//!
//! - ICAO hex address → registration, persisted to `icao24.txt`,
//!   one `key<TAB>value` line per entry
//! - registration → airframe type, persisted to `aircrafts.txt`,
//!   one `key<TAB><TAB>value` line per entry
//!
//! Both files are sorted ascending by key and fully rewritten on every
//! flush; entries are never deleted. The rewrite goes through a temporary
//! file in the same directory followed by a rename, so an interrupted flush
//! leaves the previous file intact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed entry in {} line {}: missing delimiter", .path.display(), .line)]
    MalformedEntry { path: PathBuf, line: usize },
}

/// File holding the hex address → registration table.
pub const REGISTRATION_FILE: &str = "icao24.txt";
/// File holding the registration → airframe type table.
pub const AIRFRAME_FILE: &str = "aircrafts.txt";

const REGISTRATION_DELIMITER: &str = "\t";
const AIRFRAME_DELIMITER: &str = "\t\t";

/// In-memory reference tables with load/observe/flush lifecycle.
///
/// Loaded once at startup, mutated throughout, flushed at the end of every
/// session and again at shutdown.
#[derive(Debug)]
pub struct ReferenceStore {
    dir: PathBuf,
    /// hex address → registration
    registrations: BTreeMap<String, String>,
    /// registration → airframe type
    airframes: BTreeMap<String, String>,
}

impl ReferenceStore {
    /// Load both tables from `dir`.
    ///
    /// A missing file yields an empty table. A present but malformed file is
    /// an error: silently dropping entries at startup would lose data on the
    /// next flush.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        let registrations = read_table(&dir.join(REGISTRATION_FILE), REGISTRATION_DELIMITER)?;
        let airframes = read_table(&dir.join(AIRFRAME_FILE), AIRFRAME_DELIMITER)?;

        tracing::info!(
            "Loaded {} registrations, {} airframe types from {}",
            registrations.len(),
            airframes.len(),
            dir.display()
        );

        Ok(Self {
            dir,
            registrations,
            airframes,
        })
    }

    /// Record identity data from one observed aircraft.
    ///
    /// Each table is updated independently, and only when both sides of its
    /// pairing are non-empty. A new value for a known key replaces the old
    /// value; keys stay unique.
    pub fn observe(&mut self, hex: &str, registration: &str, airframe_type: &str) {
        if !hex.is_empty() && !registration.is_empty() {
            update(&mut self.registrations, hex, registration);
        }
        if !registration.is_empty() && !airframe_type.is_empty() {
            update(&mut self.airframes, registration, airframe_type);
        }
    }

    /// Rewrite both files completely, sorted ascending by key.
    ///
    /// Idempotent: flushing twice without intervening observes produces
    /// byte-identical files.
    pub fn flush(&self) -> Result<(), StoreError> {
        write_table(
            &self.dir.join(REGISTRATION_FILE),
            REGISTRATION_DELIMITER,
            &self.registrations,
        )?;
        write_table(
            &self.dir.join(AIRFRAME_FILE),
            AIRFRAME_DELIMITER,
            &self.airframes,
        )?;

        tracing::debug!(
            "Flushed {} registrations, {} airframe types",
            self.registrations.len(),
            self.airframes.len()
        );

        Ok(())
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn airframe_count(&self) -> usize {
        self.airframes.len()
    }

    pub fn registration(&self, hex: &str) -> Option<&str> {
        self.registrations.get(hex).map(String::as_str)
    }

    pub fn airframe(&self, registration: &str) -> Option<&str> {
        self.airframes.get(registration).map(String::as_str)
    }
}

fn update(table: &mut BTreeMap<String, String>, key: &str, value: &str) {
    match table.get(key) {
        Some(existing) if existing == value => {}
        _ => {
            table.insert(key.to_string(), value.to_string());
        }
    }
}

fn read_table(path: &Path, delimiter: &str) -> Result<BTreeMap<String, String>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };

    let mut table = BTreeMap::new();
    for (index, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(delimiter)
            .ok_or_else(|| StoreError::MalformedEntry {
                path: path.to_path_buf(),
                line: index + 1,
            })?;
        // Duplicate keys on disk collapse; last occurrence wins.
        table.insert(key.to_string(), value.to_string());
    }

    Ok(table)
}

fn write_table(
    path: &Path,
    delimiter: &str,
    table: &BTreeMap<String, String>,
) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("tmp");

    let mut file = File::create(&tmp_path)?;
    for (key, value) in table {
        writeln!(file, "{}{}{}", key, delimiter, value)?;
    }
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}
