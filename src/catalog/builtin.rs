use std::collections::BTreeMap;

use super::{Catalog, ComputeUnitProfile, MemoryUnitProfile, WorkloadModes, WorkloadProfile};

// (name, training (ai, GB), inference (ai, GB))
type WorkloadRow = (&'static str, (f64, f64), Option<(f64, f64)>);

const WORKLOADS: &[WorkloadRow] = &[
    ("megatron-126M", (58.74, 4.248), Some((41.634, 1.68))),
    ("megatron-530M", (136.65, 9.59), Some((105.55, 2.37))),
    ("megatron-1B", (196.519, 16.29), Some((163.182, 3.306))),
    ("megatron-5B", (416.60, 80.631), Some((344.018, 13.2))),
    ("megatron-22B", (404.402, 341.986), Some((386.66, 50.166))),
    ("megatron-40B", (701.971, 640.0), Some((636.488, 80.0))),
    ("anthropic-52B", (351.32, 975.531), Some((247.64, 144.42))),
    ("chinchilla-64B", (701.971, 985.039), Some((236.488, 135.968))),
    ("gpt3-175B", (840.82, 2427.9), Some((802.26, 398.58))),
    ("megatron-1T", (1492.673, 14747.0), None),
    ("gpt3-13B", (497.19, 215.72), None),
];

// (name, bandwidth GB/s, latency ns, capacity GB)
const MEMORIES: &[(&str, f64, f64, f64)] = &[
    ("HBM2", 307.0, 106.7, 8.0),
    ("HBM2E", 600.0, 106.7, 16.0),
    ("HBM3", 800.0, 106.7, 24.0),
    ("HBM4", 1400.0, 106.7, 32.0),
    ("DDR4", 25.6, 73.3, 64.0),
    ("DDR5", 64.0, 73.3, 512.0),
    ("CXL", 128.0, 73.3, 512.0),
];

// (accelerator, datatype, matrix FLOP/s, vector FLOP/s)
const COMPUTE_UNITS: &[(&str, &str, f64, f64)] = &[
    ("b100", "float8", 7e15, 120e12),
    ("b100", "float16", 3.5e15, 120e12),
    ("h100", "float8", 2000e12, 120e12),
    ("h100", "float16", 1000e12, 120e12),
    ("a100", "float16", 312e12, 78e12),
];

pub(super) fn catalog() -> Catalog {
    let workloads = WORKLOADS
        .iter()
        .map(|&(name, (ai, size), inference)| {
            let modes = WorkloadModes {
                training: Some(WorkloadProfile::new(ai, size)),
                inference: inference.map(|(ai, size)| WorkloadProfile::new(ai, size)),
            };
            (name.to_string(), modes)
        })
        .collect();

    let memories = MEMORIES
        .iter()
        .map(|&(name, bw, lat, cap)| (name.to_string(), MemoryUnitProfile::new(bw, cap, lat)))
        .collect();

    let mut compute_units: BTreeMap<String, BTreeMap<String, ComputeUnitProfile>> =
        BTreeMap::new();
    for &(accelerator, datatype, matrix, vector) in COMPUTE_UNITS {
        compute_units.entry(accelerator.to_string()).or_default().insert(
            datatype.to_string(),
            ComputeUnitProfile {
                peak_matrix_flops: matrix,
                peak_vector_flops: vector,
            },
        );
    }

    Catalog {
        workloads,
        compute_units,
        memories,
    }
}
