//! Append-only result log (one JSON record per line).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bo_core::{EvaluationResult, Result, select_best};

/// Evaluation history of one category.
///
/// Records are only ever appended; every append is flushed and synced so an
/// interrupted search loses at most the evaluation in flight.
#[derive(Debug)]
pub struct ResultLog {
    path: PathBuf,
    file: File,
}

impl ResultLog {
    /// Open (creating if needed) the log at `path` for appending.
    ///
    /// A final line without its newline is the remainder of a write cut short
    /// by a crash; it is cut off so new records start on a line of their own.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
        drop_torn_tail(&mut file, &path)?;
        Ok(Self { path, file })
    }

    /// Log location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and make it durable.
    pub fn append(&mut self, result: &EvaluationResult) -> Result<()> {
        let mut line = serde_json::to_string(result)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// All records in append order.
    pub fn load(&self) -> Result<Vec<EvaluationResult>> {
        read_records(&self.path)
    }

    /// Best record in the log, if any.
    pub fn best(&self) -> Result<Option<EvaluationResult>> {
        Ok(select_best(&self.load()?).cloned())
    }
}

fn drop_torn_tail(file: &mut File, path: &Path) -> Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }
    let mut bytes = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;
    let keep = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
    log::warn!(
        "{}: dropping {} bytes of an incomplete last record",
        path.display(),
        bytes.len() - keep
    );
    file.set_len(keep as u64)?;
    file.sync_data()?;
    Ok(())
}

/// Read every record of a result log. A missing file is an empty log.
///
/// A malformed final line (a write cut short by a crash) is skipped with a
/// warning; malformed lines elsewhere are errors.
pub fn read_records(path: &Path) -> Result<Vec<EvaluationResult>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let lines: Vec<String> =
        BufReader::new(File::open(path)?).lines().collect::<std::io::Result<_>>()?;
    let last_non_blank = lines.iter().rposition(|l| !l.trim().is_empty());

    let mut records = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EvaluationResult>(line) {
            Ok(r) => records.push(r),
            Err(e) if Some(i) == last_non_blank => {
                log::warn!("{}: skipping truncated last record ({e})", path.display());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(records)
}
