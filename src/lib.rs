/// Command-line arguments
pub mod args;
/// Configuration file
pub mod config;
/// Querying of Slurm state
pub mod slurm;
/// Output of the partition table
pub mod ui;
/// Custom widgets
pub mod widgets;
