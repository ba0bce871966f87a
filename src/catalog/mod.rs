//! Static performance tables for workloads, memory technologies and compute
//! units.
//!
//! Profiles are plain immutable records. The built-in catalog is created once
//! per process and shared read-only; a catalog can also be deserialized from a
//! JSON document of the same shape, in which case every profile is validated as
//! it is loaded.

mod builtin;

use std::{collections::BTreeMap, fmt, io::Read, path::Path, sync::LazyLock};

use serde::{Deserialize, Serialize};

use crate::error::{non_negative, positive, Error, Result, Table};

/// Which sub-profile of a workload to size for.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Worktype {
    #[default]
    Training,
    Inference,
}

impl Worktype {
    pub fn short_name(&self) -> &'static str {
        match self {
            Worktype::Training => "training",
            Worktype::Inference => "inference",
        }
    }
}

impl fmt::Display for Worktype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkloadProfile {
    /// FLOPs per byte moved.
    pub arithmetic_intensity: f64,
    /// State that must reside in accelerator-attached memory.
    pub size_gb: f64,
}

impl WorkloadProfile {
    pub fn new(arithmetic_intensity: f64, size_gb: f64) -> Self {
        Self {
            arithmetic_intensity,
            size_gb,
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("workload", "arithmetic_intensity", self.arithmetic_intensity)?;
        positive("workload", "size_gb", self.size_gb)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputeUnitProfile {
    /// Peak tensor/matrix throughput in FLOP/s.
    pub peak_matrix_flops: f64,
    /// Peak vector throughput in FLOP/s. Not used for sizing.
    #[serde(default)]
    pub peak_vector_flops: f64,
}

impl ComputeUnitProfile {
    pub fn new(peak_matrix_flops: f64) -> Self {
        Self {
            peak_matrix_flops,
            peak_vector_flops: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("compute unit", "peak_matrix_flops", self.peak_matrix_flops)?;
        non_negative("compute unit", "peak_vector_flops", self.peak_vector_flops)
    }
}

/// Performance of a single memory unit (one stack, one DIMM, one CXL device).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryUnitProfile {
    pub bandwidth_gbps: f64,
    pub capacity_gb: f64,
    #[serde(default)]
    pub latency_ns: f64,
}

impl MemoryUnitProfile {
    pub fn new(bandwidth_gbps: f64, capacity_gb: f64, latency_ns: f64) -> Self {
        Self {
            bandwidth_gbps,
            capacity_gb,
            latency_ns,
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("memory", "bandwidth_gbps", self.bandwidth_gbps)?;
        positive("memory", "capacity_gb", self.capacity_gb)?;
        non_negative("memory", "latency_ns", self.latency_ns)
    }
}

/// The training and inference sub-profiles of one workload. Either may be
/// absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadModes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<WorkloadProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference: Option<WorkloadProfile>,
}

impl WorkloadModes {
    pub fn get(&self, worktype: Worktype) -> Option<&WorkloadProfile> {
        match worktype {
            Worktype::Training => self.training.as_ref(),
            Worktype::Inference => self.inference.as_ref(),
        }
    }

    fn profiles(&self) -> impl Iterator<Item = &WorkloadProfile> {
        self.training.iter().chain(self.inference.iter())
    }
}

static BUILTIN: LazyLock<Catalog> = LazyLock::new(builtin::catalog);

/// Returns the entry for `key` or an [`Error::UnknownKey`] naming `table`.
pub fn lookup<'a, V>(table: Table, entries: &'a BTreeMap<String, V>, key: &str) -> Result<&'a V> {
    entries.get(key).ok_or_else(|| Error::UnknownKey {
        table,
        key: key.to_string(),
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub workloads: BTreeMap<String, WorkloadModes>,
    /// accelerator -> datatype -> profile
    #[serde(default)]
    pub compute_units: BTreeMap<String, BTreeMap<String, ComputeUnitProfile>>,
    #[serde(default)]
    pub memories: BTreeMap<String, MemoryUnitProfile>,
}

impl Catalog {
    /// The process-wide built-in tables.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let catalog: Catalog = serde_json::from_reader(reader)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Loads `path` when given, otherwise clones the built-in tables.
    pub fn from_file_or_default(path: Option<impl AsRef<Path>>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin().clone()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for modes in self.workloads.values() {
            for profile in modes.profiles() {
                profile.validate()?;
            }
        }
        for datatypes in self.compute_units.values() {
            for profile in datatypes.values() {
                profile.validate()?;
            }
        }
        for profile in self.memories.values() {
            profile.validate()?;
        }
        Ok(())
    }

    pub fn workload(&self, name: &str, worktype: Worktype) -> Result<&WorkloadProfile> {
        lookup(Table::Workload, &self.workloads, name)?
            .get(worktype)
            .ok_or_else(|| Error::UnknownKey {
                table: Table::Worktype,
                key: format!("{name}/{worktype}"),
            })
    }

    pub fn compute_unit(&self, accelerator: &str, datatype: &str) -> Result<&ComputeUnitProfile> {
        let datatypes = lookup(Table::ComputeUnit, &self.compute_units, accelerator)?;
        datatypes.get(datatype).ok_or_else(|| Error::UnknownKey {
            table: Table::Datatype,
            key: format!("{accelerator}/{datatype}"),
        })
    }

    pub fn memory(&self, name: &str) -> Result<&MemoryUnitProfile> {
        lookup(Table::Memory, &self.memories, name)
    }

    pub fn workload_names(&self) -> impl Iterator<Item = &str> {
        self.workloads.keys().map(String::as_str)
    }

    pub fn memory_names(&self) -> impl Iterator<Item = &str> {
        self.memories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtin_workload_lookup() {
        let w = Catalog::builtin()
            .workload("megatron-126M", Worktype::Training)
            .unwrap();
        assert_relative_eq!(w.arithmetic_intensity, 58.74);
        assert_relative_eq!(w.size_gb, 4.248);

        let w = Catalog::builtin()
            .workload("gpt3-175B", Worktype::Inference)
            .unwrap();
        assert_relative_eq!(w.arithmetic_intensity, 802.26);
    }

    #[test]
    fn test_missing_worktype_is_unknown_key() {
        let err = Catalog::builtin()
            .workload("megatron-1T", Worktype::Inference)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownKey {
                table: Table::Worktype,
                ..
            }
        ));
    }

    #[test]
    fn test_no_fuzzy_matching() {
        let catalog = Catalog::builtin();
        assert!(matches!(
            catalog.memory("hbm2e"),
            Err(Error::UnknownKey {
                table: Table::Memory,
                ..
            })
        ));
        assert!(matches!(
            catalog.workload("megatron", Worktype::Training),
            Err(Error::UnknownKey {
                table: Table::Workload,
                ..
            })
        ));
        assert!(matches!(
            catalog.compute_unit("a100", "float8"),
            Err(Error::UnknownKey {
                table: Table::Datatype,
                ..
            })
        ));
        assert!(matches!(
            catalog.compute_unit("v100", "float16"),
            Err(Error::UnknownKey {
                table: Table::ComputeUnit,
                ..
            })
        ));
    }

    #[test]
    fn test_builtin_is_valid() {
        Catalog::builtin().validate().unwrap();
        assert_eq!(Catalog::builtin().memory_names().count(), 7);
        assert_eq!(Catalog::builtin().workload_names().count(), 11);
    }

    #[test]
    fn test_from_reader() {
        let json = r#"{
            "workloads": {"tiny": {"training": {"arithmetic_intensity": 10.0, "size_gb": 1.0}}},
            "compute_units": {"x1": {"float16": {"peak_matrix_flops": 1e15}}},
            "memories": {"M": {"bandwidth_gbps": 100.0, "capacity_gb": 8.0}}
        }"#;
        let catalog = Catalog::from_reader(json.as_bytes()).unwrap();
        assert_relative_eq!(
            catalog.compute_unit("x1", "float16").unwrap().peak_matrix_flops,
            1e15
        );
        assert_relative_eq!(catalog.memory("M").unwrap().latency_ns, 0.0);
        assert!(catalog.workload("tiny", Worktype::Inference).is_err());
    }

    #[test]
    fn test_from_reader_rejects_invalid_profile() {
        let json = r#"{"memories": {"M": {"bandwidth_gbps": 0.0, "capacity_gb": 8.0}}}"#;
        assert!(matches!(
            Catalog::from_reader(json.as_bytes()),
            Err(Error::InvalidProfile {
                field: "bandwidth_gbps",
                ..
            })
        ));
    }
}
