use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use color_eyre::eyre::Context;
use color_eyre::Result;
use serde::Deserialize;
use tracing::debug;

use crate::args::Args;

/// Location of the configuration file unless otherwise specified
pub const DEFAULT_CONFIG_PATH: &str = "/etc/lssrv.toml";
/// Location of the queue snapshot unless otherwise specified
pub const DEFAULT_QUEUE_STATE_FILE: &str = "/var/cache/lssrv/squeue.state";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    /// Queue snapshot written by `squeue`
    pub queue_state_file: PathBuf,
    /// Name or location of the `sinfo` executable
    pub sinfo: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            queue_state_file: PathBuf::from(DEFAULT_QUEUE_STATE_FILE),
            sinfo: "sinfo".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PartitionsConfig {
    /// Partitions that are never shown
    pub hidden: Vec<String>,
}

/// Contents of `/etc/lssrv.toml`
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub general: GeneralConfig,
    pub partitions: PartitionsConfig,
}

impl Config {
    /// Loads the configuration file, falling back to defaults if the file is
    /// missing and `required` is false
    pub fn load(path: &Path, required: bool) -> Result<Config> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound && !required => {
                debug!("{:?} not found; using default configuration", path);
                return Ok(Config::default());
            }
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("error reading config file {:?}", path))
            }
        };

        let config = Self::parse(&content).wrap_err_with(|| format!("invalid config file {:?}", path))?;
        debug!(?config, "loaded {:?}", path);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Config> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the configuration selected by the command-line and applies overrides
    pub fn from_args(args: &Args) -> Result<Config> {
        let mut config = match &args.config {
            Some(path) => Self::load(path, true)?,
            None => Self::load(Path::new(DEFAULT_CONFIG_PATH), false)?,
        };

        config.apply(args);
        Ok(config)
    }

    fn apply(&mut self, args: &Args) {
        if let Some(path) = &args.state_file {
            self.general.queue_state_file = path.clone();
        }

        if let Some(sinfo) = &args.sinfo {
            self.general.sinfo = sinfo.clone();
        }

        self.partitions.hidden.extend(args.hide.iter().cloned());
    }
}
