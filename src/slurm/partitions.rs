use std::fmt;
use std::process::Command;
use std::str::{FromStr, Split};

use color_eyre::eyre::{bail, Context};
use color_eyre::Result;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::jobs::JobCounts;
use super::misc::{format_string, header_string, Field};
use super::PartitionMap;

/// Columns requested from `sinfo`; the order is fixed and checked against the header
pub const SINFO_FIELDS: [Field; 10] = [
    ("%R", "PARTITION"),
    ("%a", "AVAIL"),
    ("%D", "NODES"),
    ("%B", "MAX_CPUS_PER_NODE"),
    ("%c", "CPUS"),
    ("%C", "CPUS(A/I/O/T)"),
    ("%s", "JOB_SIZE"),
    ("%z", "S:C:T"),
    ("%l", "TIMELIMIT"),
    ("%m", "MEMORY"),
];

/// Summarizes the state of CPUs in a partition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuCounts {
    /// Allocated CPUs
    pub allocated: u64,
    /// Idle CPUs
    pub idle: u64,
    /// Unavailable CPUs
    pub other: u64,
    /// Total number of CPUs
    pub total: u64,
}

impl<'de> Deserialize<'de> for CpuCounts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(CpuCountsVisitor)
    }
}

struct CpuCountsVisitor;

impl<'de> Visitor<'de> for CpuCountsVisitor {
    type Value = CpuCounts;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string representing CPU states in the form '0/1/2/3'")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        fn parse_next<E>(s: &mut Split<char>, v: &str) -> Result<u64, E>
        where
            E: de::Error,
        {
            let value = s
                .next()
                .ok_or_else(|| E::custom(format!("truncated CPU states {:?}", v)))?;

            value
                .parse::<u64>()
                .map_err(|_| E::custom(format!("{:?} is not a valid number of CPUs", value)))
        }

        let mut values: Split<char> = v.split('/');
        let counts = CpuCounts {
            allocated: parse_next(&mut values, v)?,
            idle: parse_next(&mut values, v)?,
            other: parse_next(&mut values, v)?,
            total: parse_next(&mut values, v)?,
        };

        if values.next().is_some() {
            return Err(E::custom(format!("too many values in CPU states {:?}", v)));
        }

        Ok(counts)
    }
}

/// A number that `sinfo` suffixes with `+` when nodes in a partition differ;
/// the reported value is then the smallest among the nodes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Approx {
    pub value: u64,
    pub heterogeneous: bool,
}

impl FromStr for Approx {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, heterogeneous) = match s.strip_suffix('+') {
            Some(value) => (value, true),
            None => (s, false),
        };

        Ok(Approx {
            value: value
                .parse()
                .map_err(|_| format!("{:?} is not a valid number", s))?,
            heterogeneous,
        })
    }
}

impl fmt::Display for Approx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.heterogeneous {
            write!(f, "{}+", self.value)
        } else {
            fmt::Display::fmt(&self.value, f)
        }
    }
}

/// An upper bound that Slurm may report as unlimited
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    Bounded(u64),
    Unlimited,
}

impl FromStr for Limit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infinite" | "UNLIMITED" => Ok(Limit::Unlimited),
            _ => s
                .parse()
                .map(Limit::Bounded)
                .map_err(|_| format!("{:?} is not a valid limit", s)),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Limit::Bounded(value) => fmt::Display::fmt(value, f),
            Limit::Unlimited => f.write_str("infinite"),
        }
    }
}

/// Number of nodes a single job may request, in the form `min-max`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobSize {
    pub min: u64,
    pub max: Limit,
}

impl FromStr for JobSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| format!("{:?} is not a valid job size", s))?;

        Ok(JobSize {
            min: min
                .parse()
                .map_err(|_| format!("{:?} is not a valid minimum job size", min))?,
            max: max.parse()?,
        })
    }
}

/// Processor geometry of the nodes in a partition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Geometry {
    /// Sockets per node
    pub sockets: u64,
    /// Cores per socket
    pub cores: u64,
    /// Threads per core
    pub threads: u64,
}

impl FromStr for Geometry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Heterogeneous partitions report the smallest value followed by '+'
        let values = s
            .split(':')
            .map(|v| v.parse::<Approx>().map(|v| v.value))
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            &[sockets, cores, threads] => Ok(Geometry {
                sockets,
                cores,
                threads,
            }),
            _ => Err(format!("{:?} is not in the form sockets:cores:threads", s)),
        }
    }
}

/// Parses a field via `FromStr`, reporting failures as deserialization errors
fn parse_field<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String>,
{
    let value = String::deserialize(deserializer)?;
    value.parse::<T>().map_err(de::Error::custom)
}

/// A single line of `sinfo` output
#[derive(Debug, Deserialize)]
struct SinfoRow {
    #[serde(rename = "PARTITION")]
    name: String,
    #[serde(rename = "AVAIL")]
    state: String,
    #[serde(rename = "NODES")]
    nodes: u64,
    #[serde(rename = "MAX_CPUS_PER_NODE", deserialize_with = "parse_field")]
    max_cpus_per_node: Limit,
    #[serde(rename = "CPUS", deserialize_with = "parse_field")]
    cores_per_node: Approx,
    #[serde(rename = "CPUS(A/I/O/T)")]
    cpus: CpuCounts,
    #[serde(rename = "JOB_SIZE", deserialize_with = "parse_field")]
    job_size: JobSize,
    #[serde(rename = "S:C:T", deserialize_with = "parse_field")]
    geometry: Geometry,
    #[serde(rename = "TIMELIMIT")]
    time_limit: String,
    #[serde(rename = "MEMORY", deserialize_with = "parse_field")]
    memory: Approx,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    /// Name of the partition
    pub name: String,
    /// Availability as reported by `sinfo`, typically `up` or `down`
    pub state: String,
    /// Number of nodes in the partition
    pub nodes: u64,
    /// Maximum number of CPUs a job may use per node
    pub max_cpus_per_node: Limit,
    /// CPU states summed over all nodes
    pub cpus: CpuCounts,
    /// CPUs per node
    pub cores_per_node: u64,
    pub geometry: Geometry,
    /// Memory per node in MB
    pub memory_per_node: u64,
    /// Memory per CPU in MB, rounded down
    pub memory_per_core: u64,
    /// Set if either the memory or the number of CPUs differ between nodes
    pub heterogeneous_memory: bool,
    pub job_size: JobSize,
    /// Maximum runtime per job; kept as reported
    pub time_limit: String,
    /// Jobs found in the queue snapshot
    pub jobs: JobCounts,
}

impl Partition {
    /// Completes a `sinfo` row with derived values
    fn from_row(row: SinfoRow) -> Self {
        // Partitions without nodes report zero CPUs and zero memory
        let memory_per_core = match row.cores_per_node.value {
            0 => {
                debug!("partition {:?} reports zero CPUs per node", row.name);
                0
            }
            cores => row.memory.value / cores,
        };

        Partition {
            memory_per_core,
            heterogeneous_memory: row.memory.heterogeneous || row.cores_per_node.heterogeneous,
            memory_per_node: row.memory.value,
            cores_per_node: row.cores_per_node.value,
            name: row.name,
            state: row.state,
            nodes: row.nodes,
            max_cpus_per_node: row.max_cpus_per_node,
            cpus: row.cpus,
            geometry: row.geometry,
            job_size: row.job_size,
            time_limit: row.time_limit,
            jobs: JobCounts::default(),
        }
    }

    /// Runs `sinfo` and returns its output without trailing newlines
    pub fn collect(exe: &str) -> Result<String> {
        let format = format_string(&SINFO_FIELDS);
        debug!("running {:?} {}", exe, format);

        let output = Command::new(exe)
            .arg(&format)
            .output()
            .wrap_err_with(|| format!("failed to execute {:?}", exe))?;

        if !output.status.success() {
            bail!(
                "{:?} failed with {}: {}",
                exe,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout =
            String::from_utf8(output.stdout).wrap_err_with(|| format!("reading {:?} output", exe))?;

        Ok(stdout.trim_end_matches('\n').to_string())
    }

    /// Parses the output of `sinfo` into a map of partitions indexed by name
    pub fn parse(output: &str) -> Result<PartitionMap> {
        let expected = header_string(&SINFO_FIELDS);
        let header = output.split('\n').next().unwrap_or_default();
        if header != expected {
            bail!(
                "unexpected sinfo header {:?}; this version of sinfo is not supported",
                header
            );
        }
        debug!("sinfo header check passed");

        // The csv reader silently skips empty records
        if let Some(index) = output.split('\n').position(str::is_empty) {
            bail!("empty line {} in sinfo output", index + 1);
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'|')
            .quoting(false)
            .from_reader(output.as_bytes());

        let mut partitions = PartitionMap::new();
        for row in reader.deserialize::<SinfoRow>() {
            let row = row.wrap_err("error while parsing sinfo output")?;
            let partition = Partition::from_row(row);

            debug!(
                name = %partition.name,
                cpus = ?partition.cpus,
                memory_per_core = partition.memory_per_core,
                heterogeneous = partition.heterogeneous_memory,
                "parsed partition"
            );

            // Slurm does not list a partition twice; the last entry wins if it does
            if let Some(previous) = partitions.insert(partition.name.clone(), partition) {
                debug!("partition {:?} listed more than once", previous.name);
            }
        }

        debug!("parsed {} partition(s)", partitions.len());
        Ok(partitions)
    }

    /// Memory per core as displayed; '+' marks heterogeneous partitions
    pub fn memory_per_core_label(&self) -> String {
        Approx {
            value: self.memory_per_core,
            heterogeneous: self.heterogeneous_memory,
        }
        .to_string()
    }
}
