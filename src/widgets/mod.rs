mod misc;
mod partitions;

pub use partitions::{Column, PartitionTable};
