use std::{io::Read, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{budget::PhysicalBudget, catalog::Worktype, error::Result};

/// One working memory unit out of six is held back in the baseline.
pub const DEFAULT_USABLE_UNITS_PER_ACCELERATOR: u64 = 5;

/// Inputs of a batch sweep. Every field has a default, so a config file only
/// needs the fields it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub accelerator: String,
    pub datatype: String,
    pub worktype: Worktype,
    pub workloads: Vec<String>,
    pub memories: Vec<String>,
    pub budgets: Vec<PhysicalBudget>,
    /// Add a capacity-only case per workload and memory.
    pub baseline: bool,
    pub usable_units_per_accelerator: u64,
    pub network_latency_ns: f64,
    /// JSON catalog replacing the built-in tables.
    pub catalog: Option<PathBuf>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            accelerator: "h100".to_string(),
            datatype: "float16".to_string(),
            worktype: Worktype::Training,
            workloads: ["megatron-126M", "megatron-5B", "megatron-22B", "megatron-40B"]
                .into_iter()
                .map(String::from)
                .collect(),
            memories: vec!["HBM2E".to_string()],
            budgets: vec![PhysicalBudget::default()],
            baseline: true,
            usable_units_per_accelerator: DEFAULT_USABLE_UNITS_PER_ACCELERATOR,
            network_latency_ns: 0.0,
            catalog: None,
        }
    }
}

impl SweepConfig {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_file_or_default(path: Option<impl AsRef<Path>>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
