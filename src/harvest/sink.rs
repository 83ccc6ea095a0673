use crate::models::ListingRecord;
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Append-only delimited output file
#[derive(Debug, Clone)]
pub struct OutputSink {
    path: PathBuf,
}

impl OutputSink {
    /// Claim `<base><YYYYMMDD>_<n>.csv` for the smallest `n` whose file does
    /// not exist yet. The file is created empty so later allocations skip it.
    pub fn allocate(base: &str, date: NaiveDate) -> io::Result<Self> {
        if let Some(parent) = Path::new(base).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let stamp = date.format("%Y%m%d");
        for sequence in 0u32.. {
            let path = PathBuf::from(format!("{base}{stamp}_{sequence}.csv"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    info!(output = %path.display(), "Writing listings");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free output file name for {base}{stamp}"),
        ))
    }

    /// Write to an existing path without allocating a new name
    #[cfg(test)]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line. The file is opened and released
    /// on every call.
    pub fn append(&self, record: &ListingRecord) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", record.to_line())
    }
}
