use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    Memory,
    Compute,
}

impl Bound {
    pub fn short_name(&self) -> &'static str {
        match self {
            Bound::Memory => "memory",
            Bound::Compute => "compute",
        }
    }
}

/// Roofline of one accelerator with its attached memory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Roofline {
    pub peak_flops: f64,
    pub memory_bandwidth_gbps: f64,
}

impl Roofline {
    pub fn new(peak_flops: f64, memory_bandwidth_gbps: f64) -> Self {
        Self {
            peak_flops,
            memory_bandwidth_gbps,
        }
    }

    /// FLOP/s reachable at `arithmetic_intensity` FLOPs per byte.
    pub fn attainable_flops(&self, arithmetic_intensity: f64) -> f64 {
        (arithmetic_intensity * self.memory_bandwidth_gbps * 1e9).min(self.peak_flops)
    }

    /// Arithmetic intensity where the memory roof meets the compute roof.
    pub fn ridge_point(&self) -> f64 {
        self.peak_flops / (self.memory_bandwidth_gbps * 1e9)
    }

    pub fn bound(&self, arithmetic_intensity: f64) -> Bound {
        if arithmetic_intensity >= self.ridge_point() {
            Bound::Compute
        } else {
            Bound::Memory
        }
    }

    /// Fraction of peak reached, in `[0, 1]`.
    pub fn utilization(&self, arithmetic_intensity: f64) -> f64 {
        self.attainable_flops(arithmetic_intensity) / self.peak_flops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_h100_hbm2e_roofline() {
        // five working HBM2E stacks
        let roof = Roofline::new(1000e12, 3000.0);
        assert_relative_eq!(roof.ridge_point(), 1000.0 / 3.0, max_relative = 1e-12);
        assert_eq!(roof.bound(58.74), Bound::Memory);
        assert_eq!(roof.bound(840.82), Bound::Compute);
        assert_relative_eq!(roof.attainable_flops(58.74), 58.74 * 3000e9, max_relative = 1e-12);
        assert_relative_eq!(roof.attainable_flops(1e5), 1000e12);
        assert_relative_eq!(roof.utilization(1e5), 1.0);
    }
}
