//! The physical channel budget on an accelerator package's shoreline.
//!
//! A fixed length of package edge is populated with channels, each taking the
//! same length and delivering the same bandwidth. A channel either faces
//! memory or the network.

use serde::{Deserialize, Serialize};

use crate::error::{non_negative, positive, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalBudget {
    pub total_length_mm: f64,
    pub per_channel_length_mm: f64,
    pub per_channel_bandwidth_gbps: f64,
}

impl Default for PhysicalBudget {
    fn default() -> Self {
        Self {
            total_length_mm: 96.0,
            per_channel_length_mm: 8.0,
            per_channel_bandwidth_gbps: 2048.0,
        }
    }
}

/// Relative slack for lengths and channel counts that should divide exactly
/// but pick up float rounding, e.g. three 0.1mm channels in 0.3mm.
const ROUNDING_SLACK: f64 = 1e-9;

/// How many channels go to memory and how many to the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelSplit {
    pub memory_channels: u64,
    pub network_channels: u64,
}

impl ChannelSplit {
    pub fn total(&self) -> u64 {
        self.memory_channels.saturating_add(self.network_channels)
    }

    pub fn used_length_mm(&self, budget: &PhysicalBudget) -> f64 {
        self.total() as f64 * budget.per_channel_length_mm
    }

    pub fn memory_bandwidth_gbps(&self, budget: &PhysicalBudget) -> f64 {
        self.memory_channels as f64 * budget.per_channel_bandwidth_gbps
    }

    pub fn network_bandwidth_gbps(&self, budget: &PhysicalBudget) -> f64 {
        self.network_channels as f64 * budget.per_channel_bandwidth_gbps
    }
}

/// Memory stacks co-packaged next to the accelerator. They take edge length
/// away from the channels and serve as the first memory tier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStacks {
    pub count: u64,
    pub length_mm: f64,
    pub capacity_gb: f64,
    pub bandwidth_gbps: f64,
}

impl Default for LocalStacks {
    fn default() -> Self {
        Self {
            count: 0,
            length_mm: 12.0,
            capacity_gb: 16.0,
            bandwidth_gbps: 500.0,
        }
    }
}

impl LocalStacks {
    /// `count` stacks of the default HBM geometry.
    pub fn new(count: u64) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("local stack", "length_mm", self.length_mm)?;
        positive("local stack", "capacity_gb", self.capacity_gb)?;
        positive("local stack", "bandwidth_gbps", self.bandwidth_gbps)
    }

    pub fn reserved_length_mm(&self) -> f64 {
        self.count as f64 * self.length_mm
    }

    pub fn total_capacity_gb(&self) -> f64 {
        self.count as f64 * self.capacity_gb
    }

    pub fn total_bandwidth_gbps(&self) -> f64 {
        self.count as f64 * self.bandwidth_gbps
    }
}

/// `floor(length_mm / per_channel_length_mm)` as a count.
fn whole_channels(quantity: &'static str, length_mm: f64, per_channel_length_mm: f64) -> Result<u64> {
    let channels = (length_mm / per_channel_length_mm + ROUNDING_SLACK).floor();
    if !channels.is_finite() || channels >= u64::MAX as f64 {
        return Err(Error::Overflow {
            quantity,
            value: channels,
        });
    }
    Ok(channels as u64)
}

impl PhysicalBudget {
    pub fn new(
        total_length_mm: f64,
        per_channel_length_mm: f64,
        per_channel_bandwidth_gbps: f64,
    ) -> Self {
        Self {
            total_length_mm,
            per_channel_length_mm,
            per_channel_bandwidth_gbps,
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("physical budget", "total_length_mm", self.total_length_mm)?;
        positive("physical budget", "per_channel_length_mm", self.per_channel_length_mm)?;
        positive(
            "physical budget",
            "per_channel_bandwidth_gbps",
            self.per_channel_bandwidth_gbps,
        )?;
        if self.total_length_mm < self.per_channel_length_mm {
            return Err(Error::BudgetTooSmall {
                total_length_mm: self.total_length_mm,
                per_channel_length_mm: self.per_channel_length_mm,
            });
        }
        Ok(())
    }

    /// Channels that fit once `reserved_length_mm` of the edge is taken by
    /// something else, e.g. co-packaged memory stacks.
    pub fn channel_capacity(&self, reserved_length_mm: f64) -> Result<u64> {
        self.validate()?;
        non_negative("physical budget", "reserved_length_mm", reserved_length_mm)?;
        let free = self.total_length_mm - reserved_length_mm;
        if free <= 0.0 {
            return Ok(0);
        }
        whole_channels("channel count", free, self.per_channel_length_mm)
    }

    /// Memory channels are rounded up so the memory side is never starved,
    /// network channels get whatever whole channels still fit. A shortfall
    /// within float rounding of the total still counts as a fit.
    pub fn split_for_memory_bandwidth(&self, memory_bandwidth_gbps: f64) -> Result<ChannelSplit> {
        self.validate()?;
        let memory_channels = (memory_bandwidth_gbps / self.per_channel_bandwidth_gbps).ceil();
        if !memory_channels.is_finite() || memory_channels >= u64::MAX as f64 {
            return Err(Error::Overflow {
                quantity: "memory channel count",
                value: memory_channels,
            });
        }
        let memory_channels = memory_channels as u64;
        let required_length_mm = memory_channels as f64 * self.per_channel_length_mm;
        let remaining_mm = self.total_length_mm - required_length_mm;
        if remaining_mm < -self.total_length_mm * ROUNDING_SLACK {
            return Err(Error::InfeasibleBudget {
                memory_channels,
                required_length_mm,
                total_length_mm: self.total_length_mm,
            });
        }
        let network_channels = whole_channels(
            "network channel count",
            remaining_mm.max(0.0),
            self.per_channel_length_mm,
        )?;
        Ok(ChannelSplit {
            memory_channels,
            network_channels,
        })
    }

    /// Every split of the free channels with at least one channel on each
    /// side, ordered by increasing memory share.
    pub fn split_sweep(&self, reserved_length_mm: f64) -> Result<Vec<ChannelSplit>> {
        let n = self.channel_capacity(reserved_length_mm)?;
        Ok((1..n)
            .map(|memory_channels| ChannelSplit {
                memory_channels,
                network_channels: n - memory_channels,
            })
            .collect())
    }

    /// [`split_sweep`](Self::split_sweep) of the edge left over by `stacks`.
    pub fn local_stack_sweep(&self, stacks: &LocalStacks) -> Result<Vec<ChannelSplit>> {
        stacks.validate()?;
        self.split_sweep(stacks.reserved_length_mm())
    }
}
