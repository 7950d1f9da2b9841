mod jobs;
mod misc;
mod partitions;
mod snapshot;

use std::collections::HashMap;
use std::time::SystemTime;

pub use jobs::{merge_jobs, Job, JobCounts, JobState, SQUEUE_FIELDS};
pub use partitions::{Approx, CpuCounts, Geometry, JobSize, Limit, Partition, SINFO_FIELDS};
pub use snapshot::Snapshot;

use color_eyre::Result;
use tracing::debug;

use crate::config::Config;

/// Partitions indexed by name
pub type PartitionMap = HashMap<String, Partition>;

/// Partitions visible to the user, combined with the queue snapshot
#[derive(Clone, Debug)]
pub struct Cluster {
    pub partitions: PartitionMap,
    /// Time at which the queue snapshot was written
    pub updated: SystemTime,
}

impl Cluster {
    /// Returns partitions ordered by name
    pub fn sorted(&self) -> Vec<&Partition> {
        let mut partitions = self.partitions.values().collect::<Vec<_>>();
        partitions.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        partitions
    }
}

pub struct Slurm {}

impl Slurm {
    /// Queries `sinfo`, adds jobs from the queue snapshot, and removes hidden partitions
    pub fn collect(config: &Config) -> Result<Cluster> {
        let output = Partition::collect(&config.general.sinfo)?;
        let mut partitions = Partition::parse(&output)?;

        let snapshot = Snapshot::read(&config.general.queue_state_file)?;
        merge_jobs(&mut partitions, &snapshot.lines)?;

        hide_partitions(&mut partitions, &config.partitions.hidden);

        Ok(Cluster {
            partitions,
            updated: snapshot.modified,
        })
    }
}

/// Removes the named partitions; names that are not present are ignored
pub fn hide_partitions<S>(partitions: &mut PartitionMap, hidden: &[S])
where
    S: AsRef<str>,
{
    for name in hidden {
        if partitions.remove(name.as_ref()).is_some() {
            debug!("hiding partition {:?}", name.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::partitions::tests::sinfo;
    use super::*;

    fn partitions() -> PartitionMap {
        Partition::parse(&sinfo(&[
            "a|up|1|4|4|0/4/0/4|1-1|1:4:1|1:00:00|4000",
            "b|up|1|4|4|0/4/0/4|1-1|1:4:1|1:00:00|4000",
            "c|up|1|4|4|0/4/0/4|1-1|1:4:1|1:00:00|4000",
        ]))
        .unwrap()
    }

    fn names(partitions: &PartitionMap) -> Vec<String> {
        let mut names = partitions.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn test_hide_partitions() {
        let mut partitions = partitions();
        hide_partitions(&mut partitions, &["b"]);

        assert_eq!(names(&partitions), ["a", "c"]);
    }

    #[test]
    fn test_hide_unknown_partitions() {
        let mut partitions = partitions();
        let before = partitions.clone();
        hide_partitions(&mut partitions, &["d", "", "A"]);

        assert_eq!(partitions, before);

        // Hiding is idempotent
        hide_partitions(&mut partitions, &["a", "a"]);
        hide_partitions(&mut partitions, &["a"]);
        assert_eq!(names(&partitions), ["b", "c"]);
    }

    #[test]
    fn test_hide_nothing() {
        let mut partitions = partitions();
        hide_partitions::<String>(&mut partitions, &[]);

        assert_eq!(partitions.len(), 3);
    }

    /// Writes an executable shell script standing in for `sinfo`
    #[cfg(unix)]
    fn script(dir: &std::path::Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    // Processes are only spawned from this test, as executing a script while
    // another thread forks may fail with ETXTBSY
    #[cfg(unix)]
    #[test]
    fn test_collect() {
        let dir = tempfile::tempdir().unwrap();
        let sinfo = script(
            dir.path(),
            "sinfo",
            "[ \"$1\" = '--format=%R|%a|%D|%B|%c|%C|%s|%z|%l|%m' ] || exit 2\n\
             echo 'PARTITION|AVAIL|NODES|MAX_CPUS_PER_NODE|CPUS|CPUS(A/I/O/T)|JOB_SIZE|S:C:T|TIMELIMIT|MEMORY'\n\
             echo 'gpu|up|4|64|64|10/40/0/50|1-4|2:16:2|1-00:00:00|128000'\n\
             echo 'debug|up|1|UNLIMITED|32+|0/32/0/32|1-1|2:8:2|30:00|64000+'",
        );

        let state = dir.path().join("squeue.state");
        std::fs::write(
            &state,
            "PARTITION|STATE|REASON\n\
             gpu|RUNNING|None\n\
             gpu|PENDING|Resources\n\
             cpu|PENDING|Priority\n\
             debug|RUNNING|None\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.general.sinfo = sinfo.clone();
        config.general.queue_state_file = state;
        config.partitions.hidden = vec!["debug".into(), "missing".into()];

        let output = Partition::collect(&sinfo).unwrap();
        assert!(!output.ends_with('\n'));
        assert_eq!(output.lines().count(), 3);

        let cluster = Slurm::collect(&config).unwrap();
        assert_eq!(names(&cluster.partitions), ["gpu"]);
        assert_eq!(
            cluster.partitions["gpu"].jobs,
            JobCounts {
                total: 2,
                running: 1,
                waiting: 1,
                waiting_resources: 1,
            }
        );

        // sinfo exiting with an error
        config.general.sinfo = script(dir.path(), "failing", "echo 'boom' >&2\nexit 1");
        let err = Slurm::collect(&config).unwrap_err();
        assert!(err.to_string().contains("boom"), "{}", err);

        // sinfo not found
        config.general.sinfo = dir.path().join("missing").to_str().unwrap().to_string();
        assert!(Slurm::collect(&config).is_err());

        // Unsupported sinfo output
        config.general.sinfo = script(dir.path(), "old", "echo 'PARTITION AVAIL'");
        assert!(Slurm::collect(&config).is_err());

        // Missing snapshot
        config.general.sinfo = sinfo;
        config.general.queue_state_file = dir.path().join("missing.state");
        assert!(Slurm::collect(&config).is_err());
    }

    #[test]
    fn test_sorted() {
        let cluster = Cluster {
            partitions: partitions(),
            updated: SystemTime::UNIX_EPOCH + Duration::from_secs(1),
        };

        let names = cluster
            .sorted()
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
