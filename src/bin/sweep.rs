use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;
use memnet::{
    config::SweepConfig,
    report::{accelerator_histogram, print_table, write_csv},
    setup_logger,
    sweep::{cases_from_config, run_sweep},
    Catalog,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON sweep config, defaults to the HBM2E/H100 mem-net sweep
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// JSON catalog, overrides the one named in the config
    #[clap(long)]
    catalog: Option<PathBuf>,
    /// Write one CSV row per case
    #[clap(long)]
    csv: Option<PathBuf>,
    /// Write the hand-off records of successful cases as JSON
    #[clap(long)]
    json: Option<PathBuf>,
    #[clap(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.debug);

    let config = SweepConfig::from_file_or_default(args.config.as_ref())
        .context("Failed to load sweep config")?;
    let catalog = Catalog::from_file_or_default(args.catalog.as_ref().or(config.catalog.as_ref()))
        .context("Failed to load catalog")?;

    let cases = cases_from_config(&config);
    let outcomes = run_sweep(&catalog, &cases);
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();

    print_table(&catalog, &outcomes);
    println!(
        "Accelerator count distribution:\n{}",
        accelerator_histogram(&outcomes, 10)
    );

    if let Some(path) = &args.csv {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(&catalog, &outcomes, file)?;
        info!("Wrote {}", path.display());
    }

    if let Some(path) = &args.json {
        let specs = outcomes
            .iter()
            .filter_map(|o| o.system_spec(&catalog, config.network_latency_ns).transpose())
            .collect::<memnet::Result<Vec<_>>>()?;
        fs::write(path, serde_json::to_string_pretty(&specs)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} system specs to {}", specs.len(), path.display());
    }

    if failed == outcomes.len() {
        return Err(anyhow!("No case could be sized"));
    }
    println!("{} of {} cases sized", outcomes.len() - failed, outcomes.len());
    Ok(())
}
