//! Sample store trait and implementations.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, warn};

use speck_types::{DataSample, DataSampleSet, SaveResult, UploadStatus};

use crate::error::{Error, Result};
use crate::models::{ImportOutcome, StoredSample};
use crate::record;
use crate::schema;

/// Persistence and upload-state tracking for data samples.
///
/// Implementations own their backing medium exclusively and serialize all
/// operations through one internal mutual-exclusion domain, so concurrent
/// callers never claim the same sample twice and never lose a save mid-claim.
///
/// Per sample the upload lifecycle is
/// `NotAttempted -> (claim) -> InProgress -> Success`, with `InProgress ->
/// NotAttempted` on upload failure, explicit reset, or process restart.
/// `Success` is the only terminal state; a sample may cycle between
/// `NotAttempted` and `InProgress` arbitrarily many times.
pub trait DataSampleStore: Send + Sync {
    /// Persist a sample with status `NotAttempted`.
    ///
    /// The write is flushed before this returns. Failures are reported in
    /// the returned [`SaveResult`], never as an `Err`; the store stays
    /// usable after a failed save.
    fn save(&self, sample: &DataSample) -> SaveResult;

    /// Move every `InProgress` sample back to `NotAttempted`.
    ///
    /// Idempotent, and safe to call at any time. Called on every startup,
    /// this is the sole recovery path for uploads interrupted by a crash;
    /// there is no timeout-based reclaim.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium fails or the store is shut
    /// down.
    fn reset_uploading_samples(&self) -> Result<usize>;

    /// Claim up to `max_requested` pending samples for upload.
    ///
    /// Selects samples with status `NotAttempted` in increasing timestamp
    /// order, atomically marks each one `InProgress`, and returns them. A
    /// non-positive `max_requested` applies [`DataSampleSet::DEFAULT_SIZE`]
    /// instead, never a zero bound. An empty set means nothing is pending;
    /// it is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium fails or the store is shut
    /// down.
    fn samples_to_upload(&self, max_requested: i32) -> Result<DataSampleSet>;

    /// Mark every sample in the set as uploaded at the given time.
    ///
    /// Only samples currently `InProgress` transition to `Success`; a stale
    /// set member is skipped without error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium fails or the store is shut
    /// down.
    fn mark_uploaded(&self, samples: &DataSampleSet, upload_time_utc_millis: i64) -> Result<()>;

    /// Return every sample in the set to `NotAttempted` for retry.
    ///
    /// Upload failures are mostly transient network failures, so failure is
    /// not terminal. Only samples currently `InProgress` transition; a stale
    /// set member is skipped without error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium fails or the store is shut
    /// down.
    fn mark_failed(&self, samples: &DataSampleSet) -> Result<()>;

    /// Flush and release the backing medium.
    ///
    /// Afterwards every operation fails with [`Error::StoreClosed`], and
    /// `save` reports [`SaveResult::FailureError`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreClosed`] if the store was already shut down.
    fn shutdown(&self) -> Result<()>;
}

/// SQLite-backed store implementing the full upload state machine.
///
/// Saves are durable before `save` returns (`synchronous = FULL`), a second
/// save of the same timestamp reports [`SaveResult::FailureDuplicate`], and
/// upload state survives process restarts.
pub struct SqliteSampleStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteSampleStore {
    /// Open or create a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreateDirectory`] if the parent directory cannot be
    /// created, or [`Error::Database`] if the database cannot be opened or
    /// initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening sample database at {}", path.display());
        Self::initialize(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] if initialization fails.
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        // WAL keeps readers cheap; FULL makes every save durable before the
        // call returns
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count all stored samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the store is shut down.
    pub fn count_samples(&self) -> Result<u64> {
        let guard = self.lock_conn();
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Count stored samples with the given upload status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the store is shut down.
    pub fn count_with_status(&self, status: UploadStatus) -> Result<u64> {
        let guard = self.lock_conn();
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM samples WHERE upload_status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Fetch one sample with its upload state.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the store is shut down.
    pub fn get_sample(&self, sample_time_utc_secs: i64) -> Result<Option<StoredSample>> {
        let guard = self.lock_conn();
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;

        let mut stmt = conn.prepare(
            "SELECT sample_time_utc_secs, raw_particle_count, particle_count, temperature,
                    humidity, download_time_utc_millis, upload_status, upload_time_utc_millis,
                    failure_count
             FROM samples WHERE sample_time_utc_secs = ?",
        )?;

        let stored = stmt
            .query_row([sample_time_utc_secs], |row| {
                Ok(StoredSample {
                    sample: row_to_sample(row)?,
                    upload_status: parse_status(&row.get::<_, String>(6)?),
                    upload_time_utc_millis: row.get(7)?,
                    failure_count: row.get::<_, i64>(8)? as u32,
                })
            })
            .optional()?;

        Ok(stored)
    }

    /// Import an archival CSV file into the store.
    ///
    /// Streams the file through the record decode path and saves each row.
    /// Rows that fail to decode or persist are counted and skipped, so one
    /// bad line never aborts the rest of the file. Accepts files with or
    /// without the header line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened, or
    /// [`Error::StoreClosed`] if the store is shut down.
    pub fn import_csv<P: AsRef<Path>>(&self, path: P) -> Result<ImportOutcome> {
        let path = path.as_ref();
        if self.lock_conn().is_none() {
            return Err(Error::StoreClosed);
        }

        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut outcome = ImportOutcome::default();
        for (index, record) in reader.records().enumerate() {
            let line = index as u64 + 1;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable record at line {}: {}", line, e);
                    outcome.failed += 1;
                    continue;
                }
            };
            if index == 0 && record::is_header(&record) {
                continue;
            }
            let sample = match record::decode_record(&record, line) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("Skipping record: {}", e);
                    outcome.failed += 1;
                    continue;
                }
            };
            match self.save(&sample) {
                SaveResult::Success => outcome.imported += 1,
                SaveResult::FailureDuplicate => outcome.duplicates += 1,
                SaveResult::FailureError => outcome.failed += 1,
            }
        }

        info!(
            "Imported {}: {} new, {} duplicate, {} failed",
            path.display(),
            outcome.imported,
            outcome.duplicates,
            outcome.failed
        );
        Ok(outcome)
    }
}

impl DataSampleStore for SqliteSampleStore {
    fn save(&self, sample: &DataSample) -> SaveResult {
        let guard = self.lock_conn();
        let Some(conn) = guard.as_ref() else {
            warn!(
                "Dropping sample {}: store is shut down",
                sample.sample_time_utc_secs
            );
            return SaveResult::FailureError;
        };

        let result = conn.execute(
            "INSERT INTO samples (sample_time_utc_secs, raw_particle_count, particle_count,
             temperature, humidity, download_time_utc_millis, upload_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sample.sample_time_utc_secs,
                sample.raw_particle_count,
                sample.particle_count,
                sample.temperature,
                sample.humidity,
                sample.download_time_utc_millis,
                UploadStatus::NotAttempted.as_str(),
            ],
        );

        match result {
            Ok(_) => SaveResult::Success,
            Err(e) if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) => {
                debug!("Duplicate sample {}", sample.sample_time_utc_secs);
                SaveResult::FailureDuplicate
            }
            Err(e) => {
                warn!(
                    "Failed to save sample {}: {}",
                    sample.sample_time_utc_secs, e
                );
                SaveResult::FailureError
            }
        }
    }

    fn reset_uploading_samples(&self) -> Result<usize> {
        let guard = self.lock_conn();
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;

        let reset = conn.execute(
            "UPDATE samples SET upload_status = ?1 WHERE upload_status = ?2",
            params![
                UploadStatus::NotAttempted.as_str(),
                UploadStatus::InProgress.as_str(),
            ],
        )?;

        if reset > 0 {
            info!("Reset {} samples left in progress", reset);
        }
        Ok(reset)
    }

    fn samples_to_upload(&self, max_requested: i32) -> Result<DataSampleSet> {
        let limit = if max_requested <= 0 {
            DataSampleSet::DEFAULT_SIZE
        } else {
            max_requested as usize
        };

        let mut guard = self.lock_conn();
        let conn = guard.as_mut().ok_or(Error::StoreClosed)?;

        // Select and claim in one transaction so two callers can never walk
        // away with the same sample
        let tx = conn.transaction()?;
        let mut set = DataSampleSet::new();
        {
            let mut select = tx.prepare(
                "SELECT sample_time_utc_secs, raw_particle_count, particle_count, temperature,
                        humidity, download_time_utc_millis
                 FROM samples WHERE upload_status = ?1
                 ORDER BY sample_time_utc_secs ASC LIMIT ?2",
            )?;
            let rows = select.query_map(
                params![UploadStatus::NotAttempted.as_str(), limit as i64],
                row_to_sample,
            )?;
            for sample in rows {
                set.insert(sample?);
            }

            let mut claim = tx.prepare(
                "UPDATE samples SET upload_status = ?1 WHERE sample_time_utc_secs = ?2",
            )?;
            for timestamp in set.timestamps() {
                claim.execute(params![UploadStatus::InProgress.as_str(), timestamp])?;
            }
        }
        tx.commit()?;

        if !set.is_empty() {
            debug!("Claimed {} samples for upload", set.len());
        }
        Ok(set)
    }

    fn mark_uploaded(&self, samples: &DataSampleSet, upload_time_utc_millis: i64) -> Result<()> {
        let mut guard = self.lock_conn();
        let conn = guard.as_mut().ok_or(Error::StoreClosed)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE samples SET upload_status = ?1, upload_time_utc_millis = ?2
                 WHERE sample_time_utc_secs = ?3 AND upload_status = ?4",
            )?;
            for timestamp in samples.timestamps() {
                let updated = stmt.execute(params![
                    UploadStatus::Success.as_str(),
                    upload_time_utc_millis,
                    timestamp,
                    UploadStatus::InProgress.as_str(),
                ])?;
                if updated == 0 {
                    debug!("Ignoring mark_uploaded for stale sample {}", timestamp);
                }
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn mark_failed(&self, samples: &DataSampleSet) -> Result<()> {
        let mut guard = self.lock_conn();
        let conn = guard.as_mut().ok_or(Error::StoreClosed)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE samples SET upload_status = ?1, failure_count = failure_count + 1
                 WHERE sample_time_utc_secs = ?2 AND upload_status = ?3",
            )?;
            for timestamp in samples.timestamps() {
                let updated = stmt.execute(params![
                    UploadStatus::NotAttempted.as_str(),
                    timestamp,
                    UploadStatus::InProgress.as_str(),
                ])?;
                if updated == 0 {
                    debug!("Ignoring mark_failed for stale sample {}", timestamp);
                }
            }
        }
        tx.commit()?;

        if !samples.is_empty() {
            debug!("Returned {} samples for retry", samples.len());
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        let conn = self.lock_conn().take().ok_or(Error::StoreClosed)?;
        conn.close().map_err(|(_, e)| Error::Database(e))?;
        info!("Sample store shut down");
        Ok(())
    }
}

/// CSV-backed archival store. Write-only.
///
/// Appends samples to `data_samples.csv` inside the store directory and
/// never tracks upload state: [`reset_uploading_samples`] reports zero,
/// [`samples_to_upload`] returns the empty set, and the mark operations are
/// no-ops. A degraded mode for when raw durability is all that is needed.
///
/// The header line is written only when the file is newly created; existing
/// files, with or without a header, are appended to without rewriting
/// history.
///
/// [`reset_uploading_samples`]: DataSampleStore::reset_uploading_samples
/// [`samples_to_upload`]: DataSampleStore::samples_to_upload
pub struct CsvSampleStore {
    path: PathBuf,
    writer: Mutex<Option<csv::Writer<File>>>,
}

impl CsvSampleStore {
    /// Open or create the sample archive inside the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreateDirectory`] if the directory cannot be
    /// created, or [`Error::Io`] if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| Error::CreateDirectory {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let path = dir.join(record::SAMPLES_FILE);
        let is_new = !path.exists();

        info!("Opening sample archive at {}", path.display());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(record::HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            path,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_writer(&self) -> MutexGuard<'_, Option<csv::Writer<File>>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> Result<()> {
        if self.lock_writer().is_none() {
            return Err(Error::StoreClosed);
        }
        Ok(())
    }
}

impl DataSampleStore for CsvSampleStore {
    fn save(&self, sample: &DataSample) -> SaveResult {
        let mut guard = self.lock_writer();
        let Some(writer) = guard.as_mut() else {
            warn!(
                "Dropping sample {}: store is shut down",
                sample.sample_time_utc_secs
            );
            return SaveResult::FailureError;
        };

        let written = match writer.write_record(record::encode_record(sample)) {
            Ok(()) => writer.flush().map_err(Error::from),
            Err(e) => Err(Error::from(e)),
        };

        match written {
            Ok(()) => SaveResult::Success,
            Err(e) => {
                warn!(
                    "Failed to save sample {}: {}",
                    sample.sample_time_utc_secs, e
                );
                SaveResult::FailureError
            }
        }
    }

    fn reset_uploading_samples(&self) -> Result<usize> {
        self.check_open()?;
        Ok(0)
    }

    fn samples_to_upload(&self, _max_requested: i32) -> Result<DataSampleSet> {
        self.check_open()?;
        Ok(DataSampleSet::new())
    }

    fn mark_uploaded(&self, _samples: &DataSampleSet, _upload_time_utc_millis: i64) -> Result<()> {
        self.check_open()
    }

    fn mark_failed(&self, _samples: &DataSampleSet) -> Result<()> {
        self.check_open()
    }

    fn shutdown(&self) -> Result<()> {
        let mut writer = self.lock_writer().take().ok_or(Error::StoreClosed)?;
        writer.flush()?;
        info!("Sample archive at {} shut down", self.path.display());
        Ok(())
    }
}

fn row_to_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<DataSample> {
    Ok(DataSample {
        sample_time_utc_secs: row.get(0)?,
        raw_particle_count: row.get::<_, i64>(1)? as u32,
        particle_count: row.get(2)?,
        temperature: row.get(3)?,
        humidity: row.get(4)?,
        download_time_utc_millis: row.get(5)?,
    })
}

fn parse_status(s: &str) -> UploadStatus {
    s.parse().unwrap_or(UploadStatus::NotAttempted)
}
