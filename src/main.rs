use color_eyre::Result;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lssrv::args::Args;
use lssrv::config::Config;
use lssrv::slurm::Slurm;

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    if args.version {
        println!("lssrv v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    color_eyre::install()?;
    init_logging(args.debug);

    let config = Config::from_args(&args)?;
    let cluster = Slurm::collect(&config)?;
    debug!("showing {} partition(s)", cluster.partitions.len());

    lssrv::ui::print(&cluster)
}

/// Logs to stderr so that only the table is written to stdout. `RUST_LOG`
/// takes precedence over the `--debug` flag.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
