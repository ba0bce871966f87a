//! Hardware sizing for a workload.
//!
//! [`optimize_sizing`] provisions just enough memory units per accelerator to
//! keep the compute unit fed at the workload's arithmetic intensity, then
//! spends what is left of the physical channel budget on the network.
//! [`baseline_sizing`] only sizes for capacity with a fixed number of usable
//! memory units per accelerator.

use log::debug;
use serde::Serialize;

use crate::{
    budget::{ChannelSplit, PhysicalBudget},
    catalog::{ComputeUnitProfile, MemoryUnitProfile, WorkloadProfile},
    error::{Error, Result},
    parallelism::{factor_parallelism, ParallelDegrees},
    roofline::Roofline,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Optimized,
    Baseline,
}

impl Method {
    pub fn short_name(&self) -> &'static str {
        match self {
            Method::Optimized => "optimized",
            Method::Baseline => "baseline",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SizingResult {
    pub method: Method,
    /// Always a power of two.
    pub num_accelerators: u64,
    pub memory_units_per_accelerator: u64,
    /// Bandwidth the compute unit needs at the workload's arithmetic
    /// intensity. Only the optimizer computes it.
    pub required_memory_bandwidth_gbps: Option<f64>,
    pub per_accelerator_memory_bandwidth_gbps: f64,
    pub per_accelerator_memory_capacity_gb: f64,
    pub network_bandwidth_gbps: f64,
    /// Only set when sized against a physical budget.
    pub channels: Option<ChannelSplit>,
    pub parallelism: ParallelDegrees,
}

impl SizingResult {
    pub fn total_memory_capacity_gb(&self) -> f64 {
        self.num_accelerators as f64 * self.per_accelerator_memory_capacity_gb
    }

    pub fn roofline(&self, compute_unit: &ComputeUnitProfile) -> Roofline {
        Roofline::new(
            compute_unit.peak_matrix_flops,
            self.per_accelerator_memory_bandwidth_gbps,
        )
    }
}

/// `ceil(value)` as a count, failing instead of saturating.
fn ceil_count(quantity: &'static str, value: f64) -> Result<u64> {
    let count = value.ceil();
    if !count.is_finite() || count >= u64::MAX as f64 {
        return Err(Error::Overflow {
            quantity,
            value: count,
        });
    }
    Ok(count as u64)
}

/// Accelerators needed to hold `size_gb`, rounded up to a power of two.
fn accelerators_for(size_gb: f64, capacity_gb: f64) -> Result<u64> {
    let needed = ceil_count("accelerator count", size_gb / capacity_gb)?.max(1);
    needed.checked_next_power_of_two().ok_or(Error::Overflow {
        quantity: "accelerator count rounded to a power of two",
        value: needed as f64,
    })
}

pub fn optimize_sizing(
    workload: &WorkloadProfile,
    memory: &MemoryUnitProfile,
    compute_unit: &ComputeUnitProfile,
    budget: &PhysicalBudget,
) -> Result<SizingResult> {
    workload.validate()?;
    memory.validate()?;
    compute_unit.validate()?;
    budget.validate()?;

    let required_bw_gbps = compute_unit.peak_matrix_flops / workload.arithmetic_intensity / 1e9;
    let units = ceil_count(
        "memory units per accelerator",
        required_bw_gbps / memory.bandwidth_gbps,
    )?
    .max(1);
    let capacity_gb = units as f64 * memory.capacity_gb;
    let bandwidth_gbps = units as f64 * memory.bandwidth_gbps;
    let num_accelerators = accelerators_for(workload.size_gb, capacity_gb)?;
    debug!(
        "required {:.1}GB/s -> {} units ({:.1}GB, {:.1}GB/s) -> {} accelerators",
        required_bw_gbps, units, capacity_gb, bandwidth_gbps, num_accelerators
    );

    let channels = budget.split_for_memory_bandwidth(bandwidth_gbps)?;
    debug!(
        "channels: {} memory, {} network",
        channels.memory_channels, channels.network_channels
    );

    Ok(SizingResult {
        method: Method::Optimized,
        num_accelerators,
        memory_units_per_accelerator: units,
        required_memory_bandwidth_gbps: Some(required_bw_gbps),
        per_accelerator_memory_bandwidth_gbps: bandwidth_gbps,
        per_accelerator_memory_capacity_gb: capacity_gb,
        network_bandwidth_gbps: channels.network_bandwidth_gbps(budget),
        channels: Some(channels),
        parallelism: factor_parallelism(num_accelerators)?,
    })
}

pub fn baseline_sizing(
    workload: &WorkloadProfile,
    memory: &MemoryUnitProfile,
    usable_units_per_accelerator: u64,
) -> Result<SizingResult> {
    workload.validate()?;
    memory.validate()?;
    if usable_units_per_accelerator == 0 {
        return Err(Error::InvalidProfile {
            profile: "baseline",
            field: "usable_units_per_accelerator",
            value: 0.0,
        });
    }

    let capacity_gb = usable_units_per_accelerator as f64 * memory.capacity_gb;
    let bandwidth_gbps = usable_units_per_accelerator as f64 * memory.bandwidth_gbps;
    let num_accelerators = accelerators_for(workload.size_gb, capacity_gb)?;
    debug!(
        "baseline {} units ({:.1}GB) -> {} accelerators",
        usable_units_per_accelerator, capacity_gb, num_accelerators
    );

    Ok(SizingResult {
        method: Method::Baseline,
        num_accelerators,
        memory_units_per_accelerator: usable_units_per_accelerator,
        required_memory_bandwidth_gbps: None,
        per_accelerator_memory_bandwidth_gbps: bandwidth_gbps,
        per_accelerator_memory_capacity_gb: capacity_gb,
        network_bandwidth_gbps: 0.0,
        channels: None,
        parallelism: factor_parallelism(num_accelerators)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Worktype};
    use crate::roofline::Bound;
    use approx::assert_relative_eq;

    fn megatron_126m() -> WorkloadProfile {
        WorkloadProfile::new(58.74, 4.248)
    }

    fn h100() -> ComputeUnitProfile {
        ComputeUnitProfile::new(1000e12)
    }

    fn hbm2e() -> MemoryUnitProfile {
        MemoryUnitProfile::new(600.0, 16.0, 106.7)
    }

    #[test]
    fn test_megatron_126m_on_h100() {
        let res = optimize_sizing(&megatron_126m(), &hbm2e(), &h100(), &PhysicalBudget::default())
            .unwrap();
        assert_relative_eq!(
            res.required_memory_bandwidth_gbps.unwrap(),
            1000e12 / 58.74 / 1e9
        );
        assert_eq!(res.memory_units_per_accelerator, 29);
        assert_relative_eq!(res.per_accelerator_memory_capacity_gb, 464.0);
        assert_relative_eq!(res.per_accelerator_memory_bandwidth_gbps, 17400.0);
        assert_eq!(res.num_accelerators, 1);
        assert_eq!(
            res.channels,
            Some(ChannelSplit {
                memory_channels: 9,
                network_channels: 3
            })
        );
        assert_relative_eq!(res.network_bandwidth_gbps, 6144.0);
        assert_eq!(res.parallelism.as_tuple(), (1, 1, 1));
    }

    #[test]
    fn test_short_budget_is_infeasible() {
        let budget = PhysicalBudget::new(40.0, 8.0, 2048.0);
        assert!(matches!(
            optimize_sizing(&megatron_126m(), &hbm2e(), &h100(), &budget),
            Err(Error::InfeasibleBudget {
                memory_channels: 9,
                ..
            })
        ));
    }

    #[test]
    fn test_gpt3_175b_from_catalog() {
        let catalog = Catalog::builtin();
        let res = optimize_sizing(
            catalog.workload("gpt3-175B", Worktype::Training).unwrap(),
            catalog.memory("HBM2E").unwrap(),
            catalog.compute_unit("h100", "float16").unwrap(),
            &PhysicalBudget::default(),
        )
        .unwrap();
        assert_eq!(res.memory_units_per_accelerator, 2);
        assert_eq!(res.num_accelerators, 128);
        assert_eq!(res.parallelism.as_tuple(), (8, 4, 4));
        assert_relative_eq!(res.network_bandwidth_gbps, 11.0 * 2048.0);
        assert_relative_eq!(res.total_memory_capacity_gb(), 128.0 * 32.0);
    }

    #[test]
    fn test_zero_arithmetic_intensity_is_rejected() {
        let workload = WorkloadProfile::new(0.0, 4.0);
        assert!(matches!(
            optimize_sizing(&workload, &hbm2e(), &h100(), &PhysicalBudget::default()),
            Err(Error::InvalidProfile {
                field: "arithmetic_intensity",
                ..
            })
        ));
        let memory = MemoryUnitProfile::new(0.0, 16.0, 0.0);
        assert!(matches!(
            optimize_sizing(&megatron_126m(), &memory, &h100(), &PhysicalBudget::default()),
            Err(Error::InvalidProfile {
                field: "bandwidth_gbps",
                ..
            })
        ));
    }

    #[test]
    fn test_idempotent() {
        let a = optimize_sizing(&megatron_126m(), &hbm2e(), &h100(), &PhysicalBudget::default());
        let b = optimize_sizing(&megatron_126m(), &hbm2e(), &h100(), &PhysicalBudget::default());
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_accelerators_are_powers_of_two_and_fit() {
        let budget = PhysicalBudget::new(400.0, 8.0, 2048.0);
        for ai in [10.0, 58.74, 404.4, 1492.673] {
            for size in [0.5, 4.248, 341.986, 2427.9, 14747.0] {
                let workload = WorkloadProfile::new(ai, size);
                let res = optimize_sizing(&workload, &hbm2e(), &h100(), &budget).unwrap();
                assert!(res.num_accelerators.is_power_of_two());
                let needed = (size / res.per_accelerator_memory_capacity_gb).ceil() as u64;
                assert!(res.num_accelerators >= needed);
                assert_eq!(res.parallelism.num_accelerators(), res.num_accelerators);
                let channels = res.channels.unwrap();
                assert!(channels.used_length_mm(&budget) <= budget.total_length_mm);
            }
        }
    }

    #[test]
    fn test_monotonic_in_size() {
        let mut last = 0;
        for i in 1..200 {
            let workload = WorkloadProfile::new(840.82, i as f64 * 25.0);
            let res = optimize_sizing(&workload, &hbm2e(), &h100(), &PhysicalBudget::default())
                .unwrap();
            assert!(res.num_accelerators >= last);
            last = res.num_accelerators;
        }
    }

    #[test]
    fn test_monotonic_in_memory_bandwidth() {
        let budget = PhysicalBudget::new(1000.0, 8.0, 2048.0);
        let mut last = u64::MAX;
        for bw in [25.6, 64.0, 128.0, 307.0, 600.0, 800.0, 1400.0, 4000.0] {
            let memory = MemoryUnitProfile::new(bw, 16.0, 0.0);
            let res = optimize_sizing(&megatron_126m(), &memory, &h100(), &budget).unwrap();
            assert!(res.memory_units_per_accelerator <= last);
            last = res.memory_units_per_accelerator;
        }
    }

    #[test]
    fn test_optimized_is_compute_bound() {
        let res = optimize_sizing(&megatron_126m(), &hbm2e(), &h100(), &PhysicalBudget::default())
            .unwrap();
        assert_eq!(res.roofline(&h100()).bound(58.74), Bound::Compute);
    }

    #[test]
    fn test_baseline() {
        let catalog = Catalog::builtin();
        let hbm2e = catalog.memory("HBM2E").unwrap();
        let gpt3 = catalog.workload("gpt3-175B", Worktype::Training).unwrap();
        let res = baseline_sizing(gpt3, hbm2e, 5).unwrap();
        assert_relative_eq!(res.per_accelerator_memory_capacity_gb, 80.0);
        assert_relative_eq!(res.per_accelerator_memory_bandwidth_gbps, 3000.0);
        assert_eq!(res.num_accelerators, 32);
        assert_eq!(res.parallelism.as_tuple(), (4, 2, 4));
        assert_relative_eq!(res.network_bandwidth_gbps, 0.0);
        assert_eq!(res.channels, None);
        assert_eq!(res.method, Method::Baseline);

        let small = baseline_sizing(&megatron_126m(), hbm2e, 5).unwrap();
        assert_eq!(small.num_accelerators, 1);
        assert_eq!(small.roofline(&h100()).bound(58.74), Bound::Memory);
    }

    #[test]
    fn test_baseline_rejects_zero_units() {
        assert!(matches!(
            baseline_sizing(&megatron_126m(), &hbm2e(), 0),
            Err(Error::InvalidProfile {
                field: "usable_units_per_accelerator",
                ..
            })
        ));
    }

    #[test]
    fn test_baseline_matches_optimizer_with_same_capacity() {
        // only comparable when both assume the same capacity per accelerator
        let workload = WorkloadProfile::new(840.82, 2427.9);
        let budget = PhysicalBudget::default();
        let opt = optimize_sizing(&workload, &hbm2e(), &h100(), &budget).unwrap();
        let base = baseline_sizing(&workload, &hbm2e(), opt.memory_units_per_accelerator).unwrap();
        assert_eq!(base.num_accelerators, opt.num_accelerators);
        assert_relative_eq!(
            base.per_accelerator_memory_capacity_gb,
            opt.per_accelerator_memory_capacity_gb
        );

        let five = baseline_sizing(&workload, &hbm2e(), 5).unwrap();
        assert_ne!(five.num_accelerators, opt.num_accelerators);
    }

    #[test]
    fn test_huge_workload_overflows() {
        let workload = WorkloadProfile::new(58.74, 1e300);
        assert!(matches!(
            baseline_sizing(&workload, &hbm2e(), 5),
            Err(Error::Overflow { .. })
        ));
    }
}
