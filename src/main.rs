use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use memnet::{
    baseline_sizing,
    config::DEFAULT_USABLE_UNITS_PER_ACCELERATOR,
    energy::{compare_networks, GpuType, Network, NetworkType},
    factor_parallelism, optimize_sizing,
    roofline::{Bound, Roofline},
    setup_logger,
    system::{SplitTiers, SystemSpec},
    Catalog, LocalStacks, PhysicalBudget, SizingResult, Worktype,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// JSON catalog to use instead of the built-in tables
    #[clap(long, global = true)]
    catalog: Option<PathBuf>,
    /// Enable debug logging
    #[clap(long, global = true)]
    debug: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Target {
    #[clap(short, long)]
    workload: String,
    #[clap(long, value_enum, default_value_t = Worktype::Training)]
    worktype: Worktype,
    #[clap(short, long, default_value = "HBM2E")]
    memory: String,
    #[clap(short, long, default_value = "h100")]
    accelerator: String,
    #[clap(short, long, default_value = "float16")]
    datatype: String,
}

#[derive(Args)]
struct BudgetArgs {
    #[clap(long, default_value_t = 96.0)]
    total_length_mm: f64,
    #[clap(long, default_value_t = 8.0)]
    per_channel_length_mm: f64,
    #[clap(long, default_value_t = 2048.0)]
    per_channel_bw_gbps: f64,
}

impl From<&BudgetArgs> for PhysicalBudget {
    fn from(args: &BudgetArgs) -> Self {
        PhysicalBudget::new(
            args.total_length_mm,
            args.per_channel_length_mm,
            args.per_channel_bw_gbps,
        )
    }
}

#[derive(Subcommand)]
enum Command {
    /// Size memory and network against a physical channel budget
    Optimize {
        #[clap(flatten)]
        target: Target,
        #[clap(flatten)]
        budget: BudgetArgs,
        /// Network latency written to the hand-off record
        #[clap(long, default_value_t = 0.0)]
        network_latency_ns: f64,
        /// Print the hand-off record as JSON
        #[clap(long)]
        json: bool,
    },
    /// Size for capacity only with a fixed number of usable memory units
    Baseline {
        #[clap(flatten)]
        target: Target,
        #[clap(long, default_value_t = DEFAULT_USABLE_UNITS_PER_ACCELERATOR)]
        usable_units: u64,
        #[clap(long)]
        json: bool,
    },
    /// Factor a power-of-two accelerator count into tensor/pipeline/data degrees
    Factor { n: u64 },
    /// List every memory/network split of a channel budget
    Splits {
        #[clap(flatten)]
        budget: BudgetArgs,
        /// Edge length already taken by something other than local stacks
        #[clap(long, default_value_t = 0.0)]
        reserved_length_mm: f64,
        /// Co-packaged 12mm/16GB/500GB/s memory stacks on the same edge
        #[clap(long, default_value_t = 0)]
        local_stacks: u64,
        /// Latency of both memory tiers in the JSON output
        #[clap(long, default_value_t = 0.0)]
        memory_latency_ns: f64,
        #[clap(long, default_value_t = 0.0)]
        network_latency_ns: f64,
        /// Print the memory and network tiers of every split as JSON
        #[clap(long)]
        json: bool,
    },
    /// Compare cluster power on InfiniBand, NVLink and silicon photonics
    Power {
        #[clap(long, value_enum, default_value_t = GpuType::A100)]
        gpu: GpuType,
        #[clap(long, default_value_t = 1)]
        gpus: u64,
        #[clap(long, default_value_t = 1)]
        links: u64,
        #[clap(long, default_value_t = 1)]
        switches: u64,
        #[clap(long, default_value_t = 18)]
        switch_radix: u64,
        #[clap(long, default_value_t = 800.0)]
        link_bw_gbps: f64,
        #[clap(long, default_value_t = 1.1)]
        pue: f64,
        #[clap(long)]
        json: bool,
    },
    /// Show where each workload sits on an accelerator's roofline
    Roofline {
        #[clap(short, long, default_value = "HBM2E")]
        memory: String,
        #[clap(short, long, default_value = "h100")]
        accelerator: String,
        #[clap(short, long, default_value = "float16")]
        datatype: String,
        #[clap(long, value_enum, default_value_t = Worktype::Training)]
        worktype: Worktype,
        /// Memory units attached to the accelerator
        #[clap(long, default_value_t = DEFAULT_USABLE_UNITS_PER_ACCELERATOR)]
        units: u64,
    },
}

fn print_sizing(sizing: &SizingResult) {
    if let Some(req) = sizing.required_memory_bandwidth_gbps {
        println!("Required memory bandwidth: {:.2}GB/s", req);
    }
    println!("Accelerators: {}", sizing.num_accelerators);
    println!("Memory units per accelerator: {}", sizing.memory_units_per_accelerator);
    println!(
        "Per accelerator memory: {:.2}GB, {:.2}GB/s",
        sizing.per_accelerator_memory_capacity_gb, sizing.per_accelerator_memory_bandwidth_gbps
    );
    if let Some(channels) = sizing.channels {
        println!(
            "Channels: {} memory, {} network",
            channels.memory_channels, channels.network_channels
        );
    }
    println!("Network bandwidth: {:.2}GB/s", sizing.network_bandwidth_gbps);
    println!("Parallelism: {}", sizing.parallelism);
}

fn print_spec(target: &Target, sizing: &SizingResult, catalog: &Catalog, latency: f64) -> Result<()> {
    let memory = catalog.memory(&target.memory)?;
    let spec = SystemSpec::from_sizing(
        &target.workload,
        target.worktype,
        &target.accelerator,
        &target.datatype,
        sizing,
        memory,
        latency,
    );
    println!("{}", spec.to_json()?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logger(args.debug);

    let catalog = Catalog::from_file_or_default(args.catalog.as_ref())
        .context("Failed to load catalog")?;

    match args.command {
        Command::Optimize {
            target,
            budget,
            network_latency_ns,
            json,
        } => {
            let workload = catalog.workload(&target.workload, target.worktype)?;
            let memory = catalog.memory(&target.memory)?;
            let compute_unit = catalog.compute_unit(&target.accelerator, &target.datatype)?;
            let budget: PhysicalBudget = (&budget).into();
            let sizing = optimize_sizing(workload, memory, compute_unit, &budget)
                .with_context(|| format!("Failed to size {}", target.workload))?;
            if json {
                print_spec(&target, &sizing, &catalog, network_latency_ns)?;
            } else {
                print_sizing(&sizing);
            }
        }
        Command::Baseline {
            target,
            usable_units,
            json,
        } => {
            let workload = catalog.workload(&target.workload, target.worktype)?;
            let memory = catalog.memory(&target.memory)?;
            let sizing = baseline_sizing(workload, memory, usable_units)
                .with_context(|| format!("Failed to size {}", target.workload))?;
            if json {
                print_spec(&target, &sizing, &catalog, 0.0)?;
            } else {
                print_sizing(&sizing);
            }
        }
        Command::Factor { n } => {
            let degrees = factor_parallelism(n)?;
            println!(
                "tensor: {}, pipeline: {}, data: {}",
                degrees.tensor(),
                degrees.pipeline(),
                degrees.data()
            );
        }
        Command::Splits {
            budget,
            reserved_length_mm,
            local_stacks,
            memory_latency_ns,
            network_latency_ns,
            json,
        } => {
            let budget: PhysicalBudget = (&budget).into();
            // checked on its own so a negative reserve cannot cancel the stacks
            budget.channel_capacity(reserved_length_mm)?;
            let stacks = LocalStacks::new(local_stacks);
            let reserved_length_mm = reserved_length_mm + stacks.reserved_length_mm();
            let capacity = budget.channel_capacity(reserved_length_mm)?;
            let splits = budget.split_sweep(reserved_length_mm)?;
            let tiers: Vec<SplitTiers> = splits
                .into_iter()
                .map(|split| {
                    SplitTiers::new(&budget, &stacks, split, memory_latency_ns, network_latency_ns)
                })
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&tiers)?);
                return Ok(());
            }
            println!("{} channels fit, {} splits", capacity, tiers.len());
            if stacks.count > 0 {
                println!(
                    "Local memory: {} stacks, {:.1}GB, {:.1}GB/s",
                    stacks.count,
                    stacks.total_capacity_gb(),
                    stacks.total_bandwidth_gbps()
                );
            }
            for tier in tiers {
                let split = tier.channels;
                println!(
                    "mem {:>3} ({:>8.1}GB/s)  net {:>3} ({:>8.1}GB/s)",
                    split.memory_channels,
                    split.memory_bandwidth_gbps(&budget),
                    split.network_channels,
                    split.network_bandwidth_gbps(&budget)
                );
            }
        }
        Command::Power {
            gpu,
            gpus,
            links,
            switches,
            switch_radix,
            link_bw_gbps,
            pue,
            json,
        } => {
            let network = Network {
                gpu,
                num_gpus: gpus,
                num_links: links,
                num_switches: switches,
                switch_radix,
                link_bandwidth_gbps: link_bw_gbps,
                pue,
                ..Default::default()
            };
            let power = compare_networks(&network)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&power)?);
                return Ok(());
            }
            let lowest = NetworkType::ALL
                .into_iter()
                .min_by(|a, b| power.get(*a).total_cmp(&power.get(*b)))
                .unwrap_or_default();
            for ty in NetworkType::ALL {
                let line = format!("{:<4} {:>12.2} W", ty.short_name(), power.get(ty));
                if ty == lowest {
                    println!("{}", line.green());
                } else {
                    println!("{}", line);
                }
            }
        }
        Command::Roofline {
            memory,
            accelerator,
            datatype,
            worktype,
            units,
        } => {
            let compute_unit = catalog.compute_unit(&accelerator, &datatype)?;
            let memory = catalog.memory(&memory)?;
            let roof = Roofline::new(
                compute_unit.peak_matrix_flops,
                units as f64 * memory.bandwidth_gbps,
            );
            println!("Ridge point: {:.2} FLOPs/byte", roof.ridge_point());
            for name in catalog.workload_names() {
                let Ok(workload) = catalog.workload(name, worktype) else {
                    continue;
                };
                let ai = workload.arithmetic_intensity;
                let line = format!(
                    "{:<16} ai {:>9.2}  {:>8.1} TFLOP/s  {:>5.1}%  {}",
                    name,
                    ai,
                    roof.attainable_flops(ai) / 1e12,
                    100.0 * roof.utilization(ai),
                    roof.bound(ai).short_name()
                );
                match roof.bound(ai) {
                    Bound::Memory => println!("{}", line.yellow()),
                    Bound::Compute => println!("{}", line.green()),
                }
            }
        }
    }
    Ok(())
}
