use std::fmt;
use std::str::FromStr;

use color_eyre::eyre::{bail, Context};
use color_eyre::Result;
use tracing::debug;

use super::misc::Field;
use super::PartitionMap;

/// Columns expected in the queue snapshot, as produced by `squeue --format`
pub const SQUEUE_FIELDS: [Field; 3] = [("%P", "PARTITION"), ("%T", "STATE"), ("%r", "REASON")];

/// Pending reason reported for jobs waiting on busy nodes
const REASON_RESOURCES: &str = "Resources";

/// Job states with a dedicated counter; every other state is only counted
/// towards the total number of jobs
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Pending,
    Other(String),
}

impl From<&str> for JobState {
    fn from(value: &str) -> Self {
        match value {
            "RUNNING" => JobState::Running,
            "PENDING" => JobState::Pending,
            other => JobState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobState::Running => f.write_str("RUNNING"),
            JobState::Pending => f.write_str("PENDING"),
            JobState::Other(state) => f.write_str(state),
        }
    }
}

/// A single `partition|state|reason` line of the queue snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub partition: String,
    pub state: JobState,
    /// Why a job is pending; `None` for most other states
    pub reason: String,
}

impl FromStr for Job {
    type Err = color_eyre::Report;

    fn from_str(line: &str) -> Result<Self> {
        let fields = line.split('|').collect::<Vec<_>>();

        match fields.as_slice() {
            &[partition, state, reason] => Ok(Job {
                partition: partition.to_string(),
                state: JobState::from(state),
                reason: reason.to_string(),
            }),
            _ => bail!(
                "expected {} fields but found {}",
                SQUEUE_FIELDS.len(),
                fields.len()
            ),
        }
    }
}

/// Number of jobs per partition, by state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobCounts {
    /// All jobs, regardless of state
    pub total: u64,
    pub running: u64,
    /// Pending jobs, including those waiting for resources
    pub waiting: u64,
    /// Pending jobs waiting for resources
    pub waiting_resources: u64,
}

impl JobCounts {
    pub fn add(&mut self, job: &Job) {
        self.total += 1;

        match job.state {
            JobState::Running => self.running += 1,
            JobState::Pending => {
                self.waiting += 1;
                if job.reason == REASON_RESOURCES {
                    self.waiting_resources += 1;
                }
            }
            JobState::Other(_) => {}
        }
    }
}

/// Adds the jobs in `lines` to the counters of the partitions they belong to.
/// Jobs in partitions missing from `partitions` are skipped, since users may
/// not have access to every partition in the queue.
pub fn merge_jobs<S>(partitions: &mut PartitionMap, lines: &[S]) -> Result<()>
where
    S: AsRef<str>,
{
    // Every line is parsed before any counter changes, so that a malformed
    // line leaves `partitions` untouched
    let jobs = lines
        .iter()
        .enumerate()
        .map(|(number, line)| (number, line.as_ref()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(number, line)| {
            // +2 for the header and 1-based numbering
            line.parse::<Job>()
                .wrap_err_with(|| format!("parsing queue snapshot line {}: {:?}", number + 2, line))
        })
        .collect::<Result<Vec<_>>>()?;

    let (mut merged, mut skipped) = (0, 0);
    for job in &jobs {
        match partitions.get_mut(&job.partition) {
            Some(partition) => {
                debug!(
                    "partition {} has a {} job ({})",
                    job.partition, job.state, job.reason
                );
                partition.jobs.add(job);
                merged += 1;
            }
            None => {
                debug!("skipping job in inaccessible partition {:?}", job.partition);
                skipped += 1;
            }
        }
    }

    debug!("merged {} job(s); skipped {}", merged, skipped);

    Ok(())
}
