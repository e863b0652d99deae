//! JSON report persistence

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::suite::RunReport;

/// Report output errors
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RunReport {
    /// File name derived from the run's start time
    pub fn file_name(&self) -> String {
        format!(
            "cluster_report_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Write the report as pretty JSON into `dir`, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ReportError> {
        let dir = dir.as_ref();
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ReportError::Io { path, source }
        };

        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let path = dir.join(self.file_name());
        let file = File::create(&path).map_err(io_error(&path))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(io_error(&path))?;

        info!("Report saved to {}", path.display());
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}
