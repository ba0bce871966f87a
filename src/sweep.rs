//! Batch evaluation of many sizing cases.
//!
//! Cases are independent, so they are evaluated in parallel. A failing case is
//! recorded in its outcome and never stops the rest of the sweep.

use itertools::iproduct;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    budget::PhysicalBudget,
    catalog::{Catalog, Worktype},
    config::SweepConfig,
    error::Result,
    sizing::{baseline_sizing, optimize_sizing, Method, SizingResult},
    system::SystemSpec,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Sizer {
    Optimized(PhysicalBudget),
    Baseline { usable_units: u64 },
}

impl Sizer {
    pub fn method(&self) -> Method {
        match self {
            Sizer::Optimized(_) => Method::Optimized,
            Sizer::Baseline { .. } => Method::Baseline,
        }
    }

    pub fn budget(&self) -> Option<&PhysicalBudget> {
        match self {
            Sizer::Optimized(budget) => Some(budget),
            Sizer::Baseline { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepCase {
    pub workload: String,
    pub worktype: Worktype,
    pub memory: String,
    pub accelerator: String,
    pub datatype: String,
    pub sizer: Sizer,
}

impl SweepCase {
    pub fn evaluate(&self, catalog: &Catalog) -> Result<SizingResult> {
        let workload = catalog.workload(&self.workload, self.worktype)?;
        let memory = catalog.memory(&self.memory)?;
        match &self.sizer {
            Sizer::Optimized(budget) => {
                let compute_unit = catalog.compute_unit(&self.accelerator, &self.datatype)?;
                optimize_sizing(workload, memory, compute_unit, budget)
            }
            Sizer::Baseline { usable_units } => baseline_sizing(workload, memory, *usable_units),
        }
    }

    pub fn label(&self) -> String {
        format!(
            "{}/{}/{}/{}-{}",
            self.workload, self.worktype, self.memory, self.accelerator, self.datatype
        )
    }
}

#[derive(Debug)]
pub struct SweepOutcome {
    pub case: SweepCase,
    pub result: Result<SizingResult>,
}

impl SweepOutcome {
    /// The hand-off record for a successful outcome.
    pub fn system_spec(
        &self,
        catalog: &Catalog,
        network_latency_ns: f64,
    ) -> Result<Option<SystemSpec>> {
        let Ok(sizing) = &self.result else {
            return Ok(None);
        };
        let memory = catalog.memory(&self.case.memory)?;
        Ok(Some(SystemSpec::from_sizing(
            &self.case.workload,
            self.case.worktype,
            &self.case.accelerator,
            &self.case.datatype,
            sizing,
            memory,
            network_latency_ns,
        )))
    }
}

/// Workloads x memories x budgets, followed by one baseline case per
/// workload and memory when the config asks for it.
pub fn cases_from_config(config: &SweepConfig) -> Vec<SweepCase> {
    let case = |workload: &String, memory: &String, sizer: Sizer| SweepCase {
        workload: workload.clone(),
        worktype: config.worktype,
        memory: memory.clone(),
        accelerator: config.accelerator.clone(),
        datatype: config.datatype.clone(),
        sizer,
    };
    let mut cases: Vec<SweepCase> = iproduct!(&config.budgets, &config.workloads, &config.memories)
        .map(|(budget, workload, memory)| case(workload, memory, Sizer::Optimized(*budget)))
        .collect();
    if config.baseline {
        let usable_units = config.usable_units_per_accelerator;
        cases.extend(
            iproduct!(&config.workloads, &config.memories)
                .map(|(workload, memory)| case(workload, memory, Sizer::Baseline { usable_units })),
        );
    }
    cases
}

/// Outcomes come back in the same order as `cases`.
pub fn run_sweep(catalog: &Catalog, cases: &[SweepCase]) -> Vec<SweepOutcome> {
    info!("Evaluating {} sizing cases", cases.len());
    cases
        .par_iter()
        .map(|case| {
            let result = case.evaluate(catalog);
            if let Err(e) = &result {
                warn!("{} failed: {}", case.label(), e);
            }
            SweepOutcome {
                case: case.clone(),
                result,
            }
        })
        .collect()
}
