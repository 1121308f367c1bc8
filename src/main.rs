//! snapdist: aggregate simulated SNAP microdata into one per-district CSV.
//!
//! Usage:
//!   snapdist --data-dir ./data --out snap_by_congressional_district.csv
//!   snapdist --data-dir ./data --states NC,WY --median unweighted --skip-missing

use anyhow::{Context, Result};
use snapdist::aggregate::MedianMethod;
use snapdist::districts::STATES;
use snapdist::pipeline::{self, PipelineOptions, SNAP_TARGET};
use snapdist::provider::CsvSource;
use std::env;

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == key).map(|w| w[1].as_str())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data").to_owned();
    let out = arg_value(&args, "--out")
        .unwrap_or("snap_by_congressional_district.csv")
        .to_owned();
    let median: MedianMethod = match arg_value(&args, "--median") {
        Some(s) => s.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => MedianMethod::Weighted,
    };
    let target: f64 = match arg_value(&args, "--target") {
        Some(s) => s.parse().context("--target must be a number")?,
        None => SNAP_TARGET,
    };
    let skip_missing = args.iter().any(|a| a == "--skip-missing");
    let states: Vec<String> = match arg_value(&args, "--states") {
        Some(list) => list.split(',').map(|s| s.trim().to_owned()).collect(),
        None => STATES.iter().map(|s| (*s).to_owned()).collect(),
    };

    let source = CsvSource::new(&data_dir);
    let opts = PipelineOptions {
        median,
        skip_missing,
        target,
    };

    let table = pipeline::run(&source, &states, &opts)?;
    table
        .write_csv(&out)
        .with_context(|| format!("writing {out}"))?;

    let summary = table.summary();
    println!("--- Weighted SNAP Totals by Congressional District ---");
    println!("Total districts: {}", summary.districts);
    println!("Total SNAP benefits: ${:.0}", summary.total_snap);
    println!("Total SNAP recipients: {:.0}", summary.total_recipients);
    if let Some(p) = summary.avg_pct_under_18 {
        println!("Avg % under 18: {p:.1}%");
    }
    if let Some(p) = summary.avg_pct_over_65 {
        println!("Avg % over 65: {p:.1}%");
    }
    if let Some(p) = summary.avg_employment_rate {
        println!("Avg employment rate: {p:.1}%");
    }
    if let Some(m) = summary.avg_median_income {
        println!("Avg median household income: ${m:.0}");
    }
    println!("Districts with SNAP < $1000: {}", summary.low_benefit_districts);
    if table.orphan_persons > 0 {
        println!(
            "Data quality: {} person rows referenced unknown households",
            table.orphan_persons
        );
    }

    Ok(())
}
