//! The hand-off record given to whatever materializes simulator
//! configurations from a sizing.

use serde::Serialize;

use crate::{
    budget::{ChannelSplit, LocalStacks, PhysicalBudget},
    catalog::{MemoryUnitProfile, Worktype},
    parallelism::ParallelDegrees,
    sizing::SizingResult,
};

/// Capacity given to the memory reached over the memory channels when it is
/// not sized from a catalog entry.
pub const FAR_MEMORY_CAPACITY_GB: f64 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MemoryTier {
    pub capacity_gb: f64,
    pub bandwidth_gbps: f64,
    pub latency_ns: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NetworkTier {
    pub bandwidth_gbps: f64,
    pub latency_ns: f64,
}

/// Memory and network tiers of one point in a local-stack channel sweep.
/// Tier 1 is the co-packaged stacks, tier 2 the memory behind the memory
/// channels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SplitTiers {
    pub channels: ChannelSplit,
    pub memory_tiers: [MemoryTier; 2],
    pub network_tiers: [NetworkTier; 2],
}

impl SplitTiers {
    pub fn new(
        budget: &PhysicalBudget,
        stacks: &LocalStacks,
        channels: ChannelSplit,
        memory_latency_ns: f64,
        network_latency_ns: f64,
    ) -> Self {
        let local = MemoryTier {
            capacity_gb: stacks.total_capacity_gb(),
            bandwidth_gbps: stacks.total_bandwidth_gbps(),
            latency_ns: memory_latency_ns,
        };
        let far = MemoryTier {
            capacity_gb: FAR_MEMORY_CAPACITY_GB,
            bandwidth_gbps: channels.memory_bandwidth_gbps(budget),
            latency_ns: memory_latency_ns,
        };
        let network = NetworkTier {
            bandwidth_gbps: channels.network_bandwidth_gbps(budget),
            latency_ns: network_latency_ns,
        };
        Self {
            channels,
            memory_tiers: [local, far],
            network_tiers: [network; 2],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SystemSpec {
    pub workload: String,
    pub worktype: Worktype,
    pub accelerator: String,
    pub datatype: String,
    pub num_accelerators: u64,
    pub tensor_par: u64,
    pub pipeline_par: u64,
    pub data_par: u64,
    pub memory_tiers: [MemoryTier; 2],
    pub network_tiers: [NetworkTier; 2],
}

impl SystemSpec {
    /// Both memory tiers take the sized per-accelerator memory with the
    /// memory unit's latency. Both network tiers take the sized network
    /// bandwidth with `network_latency_ns`.
    pub fn from_sizing(
        workload: impl ToString,
        worktype: Worktype,
        accelerator: impl ToString,
        datatype: impl ToString,
        sizing: &SizingResult,
        memory: &MemoryUnitProfile,
        network_latency_ns: f64,
    ) -> Self {
        let memory_tier = MemoryTier {
            capacity_gb: sizing.per_accelerator_memory_capacity_gb,
            bandwidth_gbps: sizing.per_accelerator_memory_bandwidth_gbps,
            latency_ns: memory.latency_ns,
        };
        let network_tier = NetworkTier {
            bandwidth_gbps: sizing.network_bandwidth_gbps,
            latency_ns: network_latency_ns,
        };
        let (tensor_par, pipeline_par, data_par) = sizing.parallelism.as_tuple();
        Self {
            workload: workload.to_string(),
            worktype,
            accelerator: accelerator.to_string(),
            datatype: datatype.to_string(),
            num_accelerators: sizing.num_accelerators,
            tensor_par,
            pipeline_par,
            data_par,
            memory_tiers: [memory_tier; 2],
            network_tiers: [network_tier; 2],
        }
    }

    /// A record for a fixed parallel layout whose tiers come from a
    /// local-stack split rather than from a sizing.
    pub fn from_split(
        workload: impl ToString,
        worktype: Worktype,
        accelerator: impl ToString,
        datatype: impl ToString,
        parallelism: ParallelDegrees,
        tiers: &SplitTiers,
    ) -> Self {
        let (tensor_par, pipeline_par, data_par) = parallelism.as_tuple();
        Self {
            workload: workload.to_string(),
            worktype,
            accelerator: accelerator.to_string(),
            datatype: datatype.to_string(),
            num_accelerators: parallelism.num_accelerators(),
            tensor_par,
            pipeline_par,
            data_par,
            memory_tiers: tiers.memory_tiers,
            network_tiers: tiers.network_tiers,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        budget::PhysicalBudget,
        catalog::{ComputeUnitProfile, WorkloadProfile},
        parallelism::factor_parallelism,
        sizing::optimize_sizing,
    };
    use approx::assert_relative_eq;

    #[test]
    fn test_memory_and_network_latency_are_independent() {
        let memory = MemoryUnitProfile::new(600.0, 16.0, 106.7);
        let sizing = optimize_sizing(
            &WorkloadProfile::new(58.74, 4.248),
            &memory,
            &ComputeUnitProfile::new(1000e12),
            &PhysicalBudget::default(),
        )
        .unwrap();
        let spec = SystemSpec::from_sizing(
            "megatron-126M",
            Worktype::Training,
            "h100",
            "float16",
            &sizing,
            &memory,
            250.0,
        );
        for tier in &spec.memory_tiers {
            assert_relative_eq!(tier.latency_ns, 106.7);
            assert_relative_eq!(tier.bandwidth_gbps, 17400.0);
        }
        for tier in &spec.network_tiers {
            assert_relative_eq!(tier.latency_ns, 250.0);
            assert_relative_eq!(tier.bandwidth_gbps, 6144.0);
        }

        let json: serde_json::Value = serde_json::from_str(&spec.to_json().unwrap()).unwrap();
        assert_eq!(json["worktype"], "training");
        assert_eq!(json["num_accelerators"], 1);
        assert_eq!(json["network_tiers"][1]["bandwidth_gbps"], 6144.0);
    }

    #[test]
    fn test_local_stacks_fill_the_first_tier() {
        let budget = PhysicalBudget::default();
        let stacks = LocalStacks::new(2);
        let splits = budget.local_stack_sweep(&stacks).unwrap();
        // 3 memory channels and 6 network channels
        let tiers = SplitTiers::new(&budget, &stacks, splits[2], 100.0, 250.0);
        let [local, far] = tiers.memory_tiers;
        assert_relative_eq!(local.capacity_gb, 32.0);
        assert_relative_eq!(local.bandwidth_gbps, 1000.0);
        assert_relative_eq!(far.capacity_gb, FAR_MEMORY_CAPACITY_GB);
        assert_relative_eq!(far.bandwidth_gbps, 3.0 * 2048.0);
        assert_ne!(local, far);
        for tier in &tiers.network_tiers {
            assert_relative_eq!(tier.bandwidth_gbps, 6.0 * 2048.0);
            assert_relative_eq!(tier.latency_ns, 250.0);
        }

        let spec = SystemSpec::from_split(
            "gpt3-175B",
            Worktype::Training,
            "h100",
            "float16",
            factor_parallelism(1).unwrap(),
            &tiers,
        );
        assert_eq!(spec.num_accelerators, 1);
        assert_eq!(spec.memory_tiers, tiers.memory_tiers);
        let json: serde_json::Value = serde_json::from_str(&spec.to_json().unwrap()).unwrap();
        assert_eq!(json["memory_tiers"][0]["capacity_gb"], 32.0);
        assert_eq!(json["memory_tiers"][1]["bandwidth_gbps"], 6144.0);
    }
}
