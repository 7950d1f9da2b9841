use std::path::PathBuf;

use argh::FromArgs;

/// Lists Slurm partitions and how busy they are
#[derive(FromArgs, Debug)]
pub struct Args {
    /// configuration file; defaults to /etc/lssrv.toml if it exists
    #[argh(option)]
    pub config: Option<PathBuf>,

    /// queue snapshot written by `squeue`; overrides the configuration file
    #[argh(option)]
    pub state_file: Option<PathBuf>,

    /// location of `sinfo` executable; overrides the configuration file
    #[argh(option)]
    pub sinfo: Option<String>,

    /// hide a partition in addition to those hidden in the configuration file
    #[argh(option)]
    pub hide: Vec<String>,

    /// log debug messages to stderr
    #[argh(switch)]
    pub debug: bool,

    /// print version information
    #[argh(switch, short = 'v')]
    pub version: bool,
}
