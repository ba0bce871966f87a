//! Power draw of a training cluster for three interconnect technologies.
//!
//! A cluster is counted as accelerators, point-to-point links and switches.
//! InfiniBand links carry an optical transceiver at both ends, NVLink is
//! electrical, and a silicon-photonic link terminates in a wavelength
//! selective switch with no second conversion. Facility overhead is applied
//! as a PUE multiplier on the sum.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{positive, Error, Result};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GpuType {
    #[default]
    A100,
    H100,
}

impl GpuType {
    pub fn short_name(&self) -> &'static str {
        match self {
            GpuType::A100 => "A100",
            GpuType::H100 => "H100",
        }
    }

    /// Board power in watts.
    pub fn power_w(&self) -> f64 {
        match self {
            GpuType::A100 => 400.0,
            GpuType::H100 => 700.0,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Ib,
    Nv,
    Sip,
}

impl NetworkType {
    pub const ALL: [NetworkType; 3] = [NetworkType::Ib, NetworkType::Nv, NetworkType::Sip];

    pub fn short_name(&self) -> &'static str {
        match self {
            NetworkType::Ib => "IB",
            NetworkType::Nv => "NV",
            NetworkType::Sip => "SiP",
        }
    }

    /// Power of one transceiver moving `bandwidth_gbps` Gb/s.
    pub fn transceiver_power_w(&self, bandwidth_gbps: f64) -> f64 {
        match self {
            // 16.5 W per 800 Gb/s module
            NetworkType::Ib => 16.5 / 800.0 * bandwidth_gbps,
            NetworkType::Nv => joules_per_bit_to_watts(1.3e-12, bandwidth_gbps * 1e9),
            NetworkType::Sip => joules_per_bit_to_watts(818e-15, bandwidth_gbps * 1e9),
        }
    }

    pub fn link_power_w(&self, bandwidth_gbps: f64) -> f64 {
        let transceiver = self.transceiver_power_w(bandwidth_gbps);
        match self {
            NetworkType::Ib => 2.0 * transceiver,
            NetworkType::Nv | NetworkType::Sip => transceiver,
        }
    }

    /// Power of one switch with `radix` ports of `port_bandwidth_gbps`.
    /// `num_lambda` only matters for the photonic switch.
    pub fn switch_power_w(&self, radix: u64, port_bandwidth_gbps: f64, num_lambda: u64) -> f64 {
        let radix = radix as f64;
        match self {
            NetworkType::Ib => 747.0 / (32.0 * 800.0) * radix * port_bandwidth_gbps,
            NetworkType::Nv => 100.0 / (18.0 * 400.0) * radix * port_bandwidth_gbps,
            NetworkType::Sip => {
                2.0 * radix * (num_lambda as f64 + 1.0) * 0.0152 / (18.0 * 1024.0)
                    * radix
                    * port_bandwidth_gbps
            }
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

pub fn joules_per_bit_to_watts(joules_per_bit: f64, bits_per_second: f64) -> f64 {
    joules_per_bit * bits_per_second
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub gpu: GpuType,
    pub network_type: NetworkType,
    pub num_gpus: u64,
    pub num_links: u64,
    pub num_switches: u64,
    pub switch_radix: u64,
    pub link_bandwidth_gbps: f64,
    /// Wavelengths per photonic switch port.
    pub num_lambda: u64,
    pub pue: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            gpu: GpuType::A100,
            network_type: NetworkType::Ib,
            num_gpus: 1,
            num_links: 1,
            num_switches: 1,
            switch_radix: 18,
            link_bandwidth_gbps: 800.0,
            num_lambda: 32,
            pue: 1.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PowerBreakdown {
    pub gpu_w: f64,
    pub link_w: f64,
    pub switch_w: f64,
    pub pue: f64,
}

impl PowerBreakdown {
    /// Facility power including the PUE overhead.
    pub fn total_w(&self) -> f64 {
        (self.gpu_w + self.link_w + self.switch_w) * self.pue
    }
}

impl Network {
    pub fn validate(&self) -> Result<()> {
        positive("network", "link_bandwidth_gbps", self.link_bandwidth_gbps)?;
        if !(self.pue.is_finite() && self.pue >= 1.0) {
            return Err(Error::InvalidProfile {
                profile: "network",
                field: "pue",
                value: self.pue,
            });
        }
        Ok(())
    }

    /// The same cluster built on a different interconnect.
    pub fn with_network_type(&self, network_type: NetworkType) -> Self {
        Self {
            network_type,
            ..*self
        }
    }

    pub fn power(&self) -> PowerBreakdown {
        let ty = self.network_type;
        PowerBreakdown {
            gpu_w: self.gpu.power_w() * self.num_gpus as f64,
            link_w: ty.link_power_w(self.link_bandwidth_gbps) * self.num_links as f64,
            switch_w: ty.switch_power_w(self.switch_radix, self.link_bandwidth_gbps, self.num_lambda)
                * self.num_switches as f64,
            pue: self.pue,
        }
    }

    pub fn total_power_w(&self) -> f64 {
        self.power().total_w()
    }
}

/// Total power of one cluster shape on every interconnect.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PowerComparison {
    pub ib: f64,
    pub nv: f64,
    pub sip: f64,
}

impl PowerComparison {
    pub fn get(&self, network_type: NetworkType) -> f64 {
        match network_type {
            NetworkType::Ib => self.ib,
            NetworkType::Nv => self.nv,
            NetworkType::Sip => self.sip,
        }
    }
}

/// `network.network_type` is ignored, every type is evaluated.
pub fn compare_networks(network: &Network) -> Result<PowerComparison> {
    network.validate()?;
    let total = |ty| network.with_network_type(ty).total_power_w();
    Ok(PowerComparison {
        ib: total(NetworkType::Ib),
        nv: total(NetworkType::Nv),
        sip: total(NetworkType::Sip),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_component_power() {
        assert_relative_eq!(NetworkType::Ib.transceiver_power_w(800.0), 16.5, max_relative = 1e-12);
        assert_relative_eq!(NetworkType::Ib.link_power_w(800.0), 33.0, max_relative = 1e-12);
        assert_relative_eq!(NetworkType::Nv.link_power_w(800.0), 1.04, max_relative = 1e-12);
        assert_relative_eq!(NetworkType::Sip.link_power_w(800.0), 0.6544, max_relative = 1e-12);

        assert_relative_eq!(NetworkType::Ib.switch_power_w(18, 800.0, 32), 420.1875, max_relative = 1e-12);
        assert_relative_eq!(
            NetworkType::Nv.switch_power_w(18, 800.0, 32),
            200.0,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            NetworkType::Sip.switch_power_w(18, 800.0, 32),
            14.1075,
            max_relative = 1e-12
        );
        // the photonic switch scales with the wavelength count
        assert!(
            NetworkType::Sip.switch_power_w(18, 800.0, 64)
                > NetworkType::Sip.switch_power_w(18, 800.0, 32)
        );
    }

    #[test]
    fn test_default_cluster_totals() {
        let power = compare_networks(&Network::default()).unwrap();
        assert_relative_eq!(power.ib, (400.0 + 33.0 + 420.1875) * 1.1, max_relative = 1e-12);
        assert_relative_eq!(power.nv, (400.0 + 1.04 + 200.0) * 1.1, max_relative = 1e-12);
        assert_relative_eq!(power.sip, (400.0 + 0.6544 + 14.1075) * 1.1, max_relative = 1e-12);
        assert!(power.sip < power.nv && power.nv < power.ib);
        assert_relative_eq!(power.get(NetworkType::Nv), power.nv);
    }

    #[test]
    fn test_power_breakdown_scales_with_counts() {
        let network = Network {
            gpu: GpuType::H100,
            network_type: NetworkType::Sip,
            num_gpus: 8,
            num_links: 16,
            num_switches: 2,
            pue: 1.0,
            ..Default::default()
        };
        let power = network.power();
        assert_relative_eq!(power.gpu_w, 5600.0);
        assert_relative_eq!(power.link_w, 16.0 * 0.6544, max_relative = 1e-12);
        assert_relative_eq!(power.switch_w, 2.0 * 14.1075, max_relative = 1e-12);
        assert_relative_eq!(
            network.total_power_w(),
            power.gpu_w + power.link_w + power.switch_w
        );
    }

    #[test]
    fn test_invalid_network() {
        let low_pue = Network {
            pue: 0.9,
            ..Default::default()
        };
        assert!(matches!(
            compare_networks(&low_pue),
            Err(Error::InvalidProfile { field: "pue", .. })
        ));
        let no_bandwidth = Network {
            link_bandwidth_gbps: 0.0,
            ..Default::default()
        };
        assert!(compare_networks(&no_bandwidth).is_err());
    }

    #[test]
    fn test_short_names() {
        let names: Vec<_> = NetworkType::ALL.iter().map(|t| t.short_name()).collect();
        assert_eq!(names, ["IB", "NV", "SiP"]);
        assert_eq!(GpuType::H100.short_name(), "H100");
    }
}
