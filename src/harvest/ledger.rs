use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix given to a ledger file once it has been replayed
pub const CONSUMED_SUFFIX: &str = ".done";

/// On-disk layout of the dated ledger files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerLayout {
    /// `<dir>/<subdir>/YYYYMMDD.log`
    #[default]
    Nested,
    /// `<dir>/YYYYMMDD_failed.log`
    Flat,
}

/// URLs that could not be scraped, kept per session in memory and per day
/// on disk
#[derive(Debug)]
pub struct FailureLedger {
    dir: PathBuf,
    layout: LedgerLayout,
    failed_subdir: String,
    failed: HashSet<String>,
}

impl FailureLedger {
    pub fn new(dir: impl Into<PathBuf>, layout: LedgerLayout) -> Self {
        Self {
            dir: dir.into(),
            layout,
            failed_subdir: "failed".to_string(),
            failed: HashSet::new(),
        }
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.failed_subdir = subdir.into();
        self
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        let stamp = date.format("%Y%m%d");
        match self.layout {
            LedgerLayout::Nested => self.dir.join(&self.failed_subdir).join(format!("{stamp}.log")),
            LedgerLayout::Flat => self.dir.join(format!("{stamp}_failed.log")),
        }
    }

    /// Remember `url` as failed for this session and append it to today's
    /// ledger file. Persistence problems are logged, never returned.
    pub fn record_failure(&mut self, url: &str) {
        self.record_failure_on(url, Local::now().date_naive());
    }

    pub fn record_failure_on(&mut self, url: &str, date: NaiveDate) {
        let url = url.trim();
        if !self.failed.insert(url.to_string()) {
            debug!(url, "Failure already recorded this session");
            return;
        }

        let path = self.path_for(date);
        match append_line(&path, url) {
            Ok(()) => warn!(url, ledger = %path.display(), "Recorded failed listing"),
            Err(e) => warn!(
                url,
                ledger = %path.display(),
                error = %e,
                "Failed to persist listing failure"
            ),
        }
    }

    pub fn has_failed(&self, url: &str) -> bool {
        self.failed.contains(url.trim())
    }

    /// URLs recorded on `date`, de-duplicated in file order. A missing file
    /// means there is nothing to retry.
    pub fn load_pending(&self, date: NaiveDate) -> io::Result<Vec<String>> {
        let path = self.path_for(date);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(ledger = %path.display(), "No failures found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut seen = HashSet::new();
        let urls: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| seen.insert(line.to_string()))
            .map(str::to_string)
            .collect();

        info!(ledger = %path.display(), count = urls.len(), "Loaded pending failures");
        Ok(urls)
    }

    /// Rename the ledger for `date` with the consumed suffix. Returns whether
    /// a rename happened; calling it again is a no-op. An existing consumed
    /// file is appended to, never replaced.
    pub fn mark_consumed(&self, date: NaiveDate) -> io::Result<bool> {
        let path = self.path_for(date);
        let done = consumed_path(&path);

        if !path.exists() {
            if done.exists() {
                debug!(ledger = %done.display(), "Ledger already consumed");
            } else {
                debug!(ledger = %path.display(), "No ledger to consume");
            }
            return Ok(false);
        }

        if done.exists() {
            let contents = fs::read_to_string(&path)?;
            OpenOptions::new().append(true).open(&done)?.write_all(contents.as_bytes())?;
            fs::remove_file(&path)?;
            info!("Appending: {} >> {}", path.display(), done.display());
        } else {
            fs::rename(&path, &done)?;
            info!("Renaming: {} >> {}", path.display(), done.display());
        }
        Ok(true)
    }
}

pub fn consumed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(CONSUMED_SUFFIX);
    PathBuf::from(name)
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
