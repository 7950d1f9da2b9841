use std::fs;
use std::path::Path;
use std::time::SystemTime;

use color_eyre::eyre::{bail, Context};
use color_eyre::Result;
use tracing::debug;

use super::jobs::SQUEUE_FIELDS;
use super::misc::header_string;

/// Queue state written periodically by `squeue`, e.g. from a cron job
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Time at which the snapshot was last written
    pub modified: SystemTime,
    /// Job lines following the header
    pub lines: Vec<String>,
}

impl Snapshot {
    pub fn read(path: &Path) -> Result<Snapshot> {
        let metadata = fs::metadata(path)
            .wrap_err_with(|| format!("cannot stat queue state file {:?}", path))?;

        if !metadata.is_file() {
            bail!("queue state file {:?} is not a regular file", path);
        }

        let modified = metadata
            .modified()
            .wrap_err_with(|| format!("reading modification time of {:?}", path))?;
        debug!(?path, ?modified, len = metadata.len(), "found queue state file");

        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("error reading queue state file {:?}", path))?;

        Self::parse(&content, modified)
            .wrap_err_with(|| format!("invalid queue state file {:?}", path))
    }

    fn parse(content: &str, modified: SystemTime) -> Result<Snapshot> {
        let content = content.strip_suffix('\n').unwrap_or(content);
        let mut lines = content.split('\n');

        let expected = header_string(&SQUEUE_FIELDS);
        let header = lines.next().unwrap_or_default();
        if header != expected {
            bail!("expected header {:?} but found {:?}", expected, header);
        }

        let lines = lines.map(str::to_string).collect::<Vec<_>>();
        debug!("read {} job line(s)", lines.len());

        Ok(Snapshot { modified, lines })
    }
}
