//! CSV-backed outreach ledger.
//!
//! The ledger is a flat table with one row per company website
//! (`Company,Website,Title,Emails,status`). New rows are appended as the
//! prepare stage produces them; the send stage mutates statuses in memory
//! and rewrites the file once the batch completes.

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use outreach_shared::{CompanyRecord, LEDGER_HEADERS, OutreachError, RecordStatus, Result};

// ---------------------------------------------------------------------------
// On-disk row
// ---------------------------------------------------------------------------

/// A ledger row exactly as it appears in the CSV file.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    #[serde(rename = "Company")]
    company: String,
    #[serde(rename = "Website")]
    website: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Emails")]
    emails: String,
    #[serde(rename = "status")]
    status: String,
}

impl From<&CompanyRecord> for LedgerRow {
    fn from(record: &CompanyRecord) -> Self {
        Self {
            company: record.company.clone(),
            website: record.website.clone(),
            title: record.title.clone(),
            emails: record.emails_field(),
            status: record.status.as_str().to_string(),
        }
    }
}

impl TryFrom<LedgerRow> for CompanyRecord {
    type Error = OutreachError;

    fn try_from(row: LedgerRow) -> Result<Self> {
        Ok(Self {
            status: row.status.parse()?,
            emails: CompanyRecord::parse_emails(&row.emails),
            company: row.company,
            website: row.website,
            title: row.title,
        })
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// In-memory view of the ledger file, keyed by website.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    records: Vec<CompanyRecord>,
    /// website -> index into `records`
    index: HashMap<String, usize>,
}

impl Ledger {
    /// Open the ledger at `path`, creating it with a header row if missing.
    pub fn open_or_create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| OutreachError::io(parent, e))?;
            }
            let mut writer = csv::Writer::from_path(&path).map_err(|e| csv_error(&path, e))?;
            writer
                .write_record(LEDGER_HEADERS)
                .map_err(|e| csv_error(&path, e))?;
            writer.flush().map_err(|e| OutreachError::io(&path, e))?;
            info!(path = %path.display(), "ledger not found, created a new one");
        }
        Self::open(path)
    }

    /// Open an existing ledger. A missing file is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(OutreachError::Ledger(format!(
                "ledger '{}' was not found; run `outreach prepare` first",
                path.display()
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| csv_error(&path, e))?;

        let headers = reader.headers().map_err(|e| csv_error(&path, e))?;
        if headers.iter().ne(LEDGER_HEADERS) {
            return Err(OutreachError::Ledger(format!(
                "{}: expected header '{}', found '{}'",
                path.display(),
                LEDGER_HEADERS.join(","),
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }

        let mut ledger = Self {
            path,
            records: Vec::new(),
            index: HashMap::new(),
        };

        for (line, row) in reader.deserialize::<LedgerRow>().enumerate() {
            // +2: one for the header, one for 1-based line numbers
            let row_no = line + 2;
            let row = row.map_err(|e| csv_error(&ledger.path, e))?;
            let record = CompanyRecord::try_from(row).map_err(|e| {
                OutreachError::Ledger(format!("{} row {row_no}: {e}", ledger.path.display()))
            })?;

            if ledger.index.contains_key(&record.website) {
                warn!(website = %record.website, row = row_no, "duplicate website in ledger, keeping first row");
                continue;
            }
            ledger.insert(record);
        }

        debug!(path = %ledger.path.display(), rows = ledger.records.len(), "ledger loaded");
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[CompanyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a row for `website` already exists.
    pub fn contains(&self, website: &str) -> bool {
        self.index.contains_key(website)
    }

    pub fn get(&self, website: &str) -> Option<&CompanyRecord> {
        self.index.get(website).map(|&i| &self.records[i])
    }

    /// Append a new row and write it to disk immediately.
    ///
    /// Returns `Ok(false)` without touching the file when the website is
    /// already in the ledger.
    pub fn append(&mut self, record: CompanyRecord) -> Result<bool> {
        if self.contains(&record.website) {
            debug!(website = %record.website, "already in ledger, not appending");
            return Ok(false);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| OutreachError::io(&self.path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .serialize(LedgerRow::from(&record))
            .map_err(|e| csv_error(&self.path, e))?;
        writer.flush().map_err(|e| OutreachError::io(&self.path, e))?;

        self.insert(record);
        Ok(true)
    }

    /// The first `limit` rows still waiting to be sent, in file order.
    pub fn unsent_batch(&self, limit: usize) -> Vec<CompanyRecord> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Unsent)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Move the row for `website` into `status`.
    ///
    /// Only `unsent` rows may change, and only into a terminal status.
    /// The change is in memory until [`Ledger::save`] is called.
    pub fn set_status(&mut self, website: &str, status: RecordStatus) -> Result<()> {
        let idx = *self
            .index
            .get(website)
            .ok_or_else(|| OutreachError::Ledger(format!("no ledger row for '{website}'")))?;

        let record = &mut self.records[idx];
        if !record.status.can_transition_to(status) {
            return Err(OutreachError::Ledger(format!(
                "illegal status change for '{website}': {} -> {status}",
                record.status
            )));
        }
        record.status = status;
        Ok(())
    }

    /// Number of rows per status (statuses with no rows are omitted).
    pub fn status_counts(&self) -> BTreeMap<RecordStatus, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    /// Rewrite the whole ledger file from memory.
    ///
    /// Writes to a sibling temp file first and renames it over the ledger so
    /// a crash mid-write leaves the previous version intact.
    pub fn save(&self) -> Result<()> {
        let tmp_path = self.path.with_extension("csv.tmp");

        {
            let mut writer =
                csv::Writer::from_path(&tmp_path).map_err(|e| csv_error(&tmp_path, e))?;
            // serialize() emits the header from the first row; write it
            // explicitly so an empty ledger keeps its header too.
            writer
                .write_record(LEDGER_HEADERS)
                .map_err(|e| csv_error(&tmp_path, e))?;
            for record in &self.records {
                let row = LedgerRow::from(record);
                writer
                    .write_record([
                        row.company,
                        row.website,
                        row.title,
                        row.emails,
                        row.status,
                    ])
                    .map_err(|e| csv_error(&tmp_path, e))?;
            }
            writer.flush().map_err(|e| OutreachError::io(&tmp_path, e))?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| OutreachError::io(&self.path, e))?;
        debug!(path = %self.path.display(), rows = self.records.len(), "ledger saved");
        Ok(())
    }

    fn insert(&mut self, record: CompanyRecord) {
        self.index.insert(record.website.clone(), self.records.len());
        self.records.push(record);
    }
}

fn csv_error(path: &Path, err: csv::Error) -> OutreachError {
    OutreachError::Ledger(format!("{}: {err}", path.display()))
}
