//! Private temporary files that the coordinator later renames into place.

use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use common::naming;

/// A uniquely named, hidden file in the work directory that will become
/// `final_name` once published. Dropped before [`StagedFile::finish`], it is
/// removed.
pub struct StagedFile {
    writer: BufWriter<NamedTempFile>,
}

impl StagedFile {
    pub fn create(work_dir: &Path, final_name: &str) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(&naming::staging_prefix(final_name))
            .tempfile_in(work_dir)
            .with_context(|| format!("cannot stage {final_name} in {}", work_dir.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn writer(&mut self) -> &mut impl Write {
        &mut self.writer
    }

    /// Flush and keep the file on disk, returning its path.
    pub fn finish(self) -> Result<String> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context("failed to flush staged file")?;
        file.as_file().sync_all()?;
        let (_, path) = file.keep()?;
        Ok(path.display().to_string())
    }
}
