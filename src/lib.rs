use std::io::Write;

use log::LevelFilter;

pub mod budget;
pub mod catalog;
pub mod config;
pub mod energy;
pub mod error;
pub mod parallelism;
pub mod report;
pub mod roofline;
pub mod sizing;
pub mod sweep;
pub mod system;

pub use budget::{ChannelSplit, LocalStacks, PhysicalBudget};
pub use catalog::{Catalog, ComputeUnitProfile, MemoryUnitProfile, WorkloadProfile, Worktype};
pub use error::{Error, Result};
pub use parallelism::{factor_parallelism, ParallelDegrees};
pub use sizing::{baseline_sizing, optimize_sizing, SizingResult};

/// Configure the logger level and formatting string.
pub fn setup_logger(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::builder()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}
