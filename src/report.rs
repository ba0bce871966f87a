use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::{
    catalog::{Catalog, Worktype},
    error::Result,
    roofline::Bound,
    sizing::SizingResult,
    sweep::SweepOutcome,
};

/// One flat CSV row per outcome. Sizing columns are empty for failures.
#[derive(Debug, Serialize)]
pub struct ReportRow<'a> {
    pub method: &'static str,
    pub workload: &'a str,
    pub worktype: Worktype,
    pub memory: &'a str,
    pub accelerator: &'a str,
    pub datatype: &'a str,
    pub total_length_mm: Option<f64>,
    pub per_channel_length_mm: Option<f64>,
    pub per_channel_bandwidth_gbps: Option<f64>,
    pub num_accelerators: Option<u64>,
    pub memory_units_per_accelerator: Option<u64>,
    pub required_memory_bandwidth_gbps: Option<f64>,
    pub memory_bandwidth_gbps: Option<f64>,
    pub memory_capacity_gb: Option<f64>,
    pub network_bandwidth_gbps: Option<f64>,
    pub memory_channels: Option<u64>,
    pub network_channels: Option<u64>,
    pub tensor_par: Option<u64>,
    pub pipeline_par: Option<u64>,
    pub data_par: Option<u64>,
    pub bound: Option<Bound>,
    pub error: Option<String>,
}

impl<'a> ReportRow<'a> {
    pub fn new(catalog: &Catalog, outcome: &'a SweepOutcome) -> Self {
        let case = &outcome.case;
        let budget = case.sizer.budget();
        let sizing = outcome.result.as_ref().ok();
        let bound = sizing.and_then(|s| bound_of(catalog, outcome, s));
        let channels = sizing.and_then(|s| s.channels);
        let parallelism = sizing.map(|s| s.parallelism);
        Self {
            method: case.sizer.method().short_name(),
            workload: &case.workload,
            worktype: case.worktype,
            memory: &case.memory,
            accelerator: &case.accelerator,
            datatype: &case.datatype,
            total_length_mm: budget.map(|b| b.total_length_mm),
            per_channel_length_mm: budget.map(|b| b.per_channel_length_mm),
            per_channel_bandwidth_gbps: budget.map(|b| b.per_channel_bandwidth_gbps),
            num_accelerators: sizing.map(|s| s.num_accelerators),
            memory_units_per_accelerator: sizing.map(|s| s.memory_units_per_accelerator),
            required_memory_bandwidth_gbps: sizing.and_then(|s| s.required_memory_bandwidth_gbps),
            memory_bandwidth_gbps: sizing.map(|s| s.per_accelerator_memory_bandwidth_gbps),
            memory_capacity_gb: sizing.map(|s| s.per_accelerator_memory_capacity_gb),
            network_bandwidth_gbps: sizing.map(|s| s.network_bandwidth_gbps),
            memory_channels: channels.map(|c| c.memory_channels),
            network_channels: channels.map(|c| c.network_channels),
            tensor_par: parallelism.map(|p| p.tensor()),
            pipeline_par: parallelism.map(|p| p.pipeline()),
            data_par: parallelism.map(|p| p.data()),
            bound,
            error: outcome.result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

/// Baseline cases never look up a compute unit, so an unknown accelerator only
/// loses the bound column.
fn bound_of(catalog: &Catalog, outcome: &SweepOutcome, sizing: &SizingResult) -> Option<Bound> {
    let case = &outcome.case;
    let compute_unit = catalog
        .compute_unit(&case.accelerator, &case.datatype)
        .ok()?;
    let workload = catalog.workload(&case.workload, case.worktype).ok()?;
    Some(sizing.roofline(compute_unit).bound(workload.arithmetic_intensity))
}

pub fn write_csv<W: Write>(catalog: &Catalog, outcomes: &[SweepOutcome], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for outcome in outcomes {
        wtr.serialize(ReportRow::new(catalog, outcome))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn print_table(catalog: &Catalog, outcomes: &[SweepOutcome]) {
    println!(
        "{}",
        format!(
            "{:<10} {:<16} {:<7} {:>8} {:>6} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "method", "workload", "memory", "length", "gpus", "units", "mem GB", "mem GB/s", "net GB/s",
            "par"
        )
        .bold()
    );
    for outcome in outcomes {
        let row = ReportRow::new(catalog, outcome);
        let length = row
            .total_length_mm
            .map(|l| format!("{l}mm"))
            .unwrap_or_else(|| "-".to_string());
        let prefix = format!(
            "{:<10} {:<16} {:<7} {:>8}",
            row.method, row.workload, row.memory, length
        );
        match &outcome.result {
            Ok(sizing) => {
                let line = format!(
                    "{} {:>6} {:>10} {:>10.1} {:>10.1} {:>10.1} {:>8}",
                    prefix,
                    sizing.num_accelerators,
                    sizing.memory_units_per_accelerator,
                    sizing.per_accelerator_memory_capacity_gb,
                    sizing.per_accelerator_memory_bandwidth_gbps,
                    sizing.network_bandwidth_gbps,
                    sizing.parallelism,
                );
                match row.bound {
                    Some(Bound::Memory) => println!("{}", line.yellow()),
                    _ => println!("{}", line.green()),
                }
            }
            Err(e) => println!("{} {}", prefix, e.to_string().red()),
        }
    }
}

/// Distribution of accelerator counts over the successful outcomes.
pub fn accelerator_histogram(outcomes: &[SweepOutcome], buckets: u64) -> histo::Histogram {
    let mut hist = histo::Histogram::with_buckets(buckets);
    for sizing in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
        hist.add(sizing.num_accelerators);
    }
    hist
}
