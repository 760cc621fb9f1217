/// Bad sector log - append sectors finalized bad to a text file
///
/// Written once at the end of a scan or recovery run so an operator can
/// correlate repeated runs against the same medium.
use crate::scan::{SectorMap, SectorStatus};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct BadSectorLog {
    /// Device label written on every line
    device: String,

    log_file: PathBuf,
}

impl BadSectorLog {
    pub fn new(device: impl Into<String>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            log_file: log_file.into(),
        }
    }

    /// Default log file path for a drive unit
    pub fn default_log_file(unit: u8) -> PathBuf {
        PathBuf::from(format!("fluxrescue_bad_sectors_drive{}.log", unit))
    }

    pub fn path(&self) -> &Path {
        &self.log_file
    }

    /// Append every bad sector of `map`, returning how many lines were written
    pub fn append_map(&self, map: &SectorMap) -> Result<usize> {
        if let Some(parent) = self.log_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open bad sector log {}", self.log_file.display()))?;

        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut written = 0;

        for record in map.iter().filter(|r| r.status == SectorStatus::Bad) {
            let kind = record
                .error_kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "Unknown".to_string());

            writeln!(
                file,
                "{} | Device: {} | LBA: {} | CHS: {} | Kind: {} | Attempts: {}",
                timestamp, self.device, record.lba, record.address, kind, record.read_attempts
            )
            .context("Failed to write to bad sector log")?;
            written += 1;
        }

        tracing::info!(
            device = %self.device,
            path = %self.log_file.display(),
            bad_sectors = written,
            "Bad sector log updated"
        );

        Ok(written)
    }
}
