extern crate log;
extern crate pretty_env_logger;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::Parser;

use ms2compare::errors::{
    CompareError,
    Result,
};
use ms2compare::output;
use ms2compare::{
    compare_files,
    ComparisonConfig,
    DistanceMetric,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// First dataset (.mgf)
    #[arg(short = 'A', long = "dataset-a", required_unless_present = "write_template")]
    dataset_a: Option<PathBuf>,
    /// Second dataset (.mgf)
    #[arg(short = 'B', long = "dataset-b", required_unless_present = "write_template")]
    dataset_b: Option<PathBuf>,
    /// TOML configuration, defaults are used for missing keys
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, default_value = "output.txt")]
    output: PathBuf,
    /// Also write the report as JSON
    #[arg(short = 'J', long)]
    json: Option<PathBuf>,
    /// Write the precursor difference x similarity histogram
    #[arg(short = 'X', long)]
    precursor_diff_output: Option<PathBuf>,
    /// Write the default configuration to the --config path and exit
    #[arg(long, action)]
    write_template: bool,
    #[arg(long)]
    cutoff: Option<f64>,
    /// 0, 1 or 2
    #[arg(short, long)]
    metric: Option<u8>,
    #[arg(short = 'N', long)]
    top_n: Option<usize>,
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long, action)]
    no_progress: bool,
}

fn write_template(path: Option<PathBuf>) -> Result<()> {
    let path = path.ok_or_else(|| {
        CompareError::Config("--write-template needs a --config path to write to".into())
    })?;
    if fs::metadata(&path).is_ok() {
        return Err(CompareError::Config(format!(
            "File already exists: {}",
            path.display()
        )));
    }
    let config_str = toml::to_string_pretty(&ComparisonConfig::default())
        .map_err(|e| CompareError::Config(e.to_string()))?;
    fs::write(&path, config_str).map_err(|e| CompareError::io(&path, e))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn build_config(args: &Args) -> Result<ComparisonConfig> {
    let mut config = match &args.config {
        Some(path) => ComparisonConfig::from_toml(path)?,
        None => ComparisonConfig::default(),
    };
    if let Some(cutoff) = args.cutoff {
        config.cutoff = cutoff;
    }
    if let Some(code) = args.metric {
        config.metric = DistanceMetric::from_code(code)?;
    }
    if args.top_n.is_some() {
        config.top_n = args.top_n;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    if args.precursor_diff_output.is_some() {
        config.precursor_diff_histogram = true;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    if args.write_template {
        return write_template(args.config);
    }

    let config = build_config(&args)?;
    let (path_a, path_b) = match (&args.dataset_a, &args.dataset_b) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(CompareError::Config("both -A and -B are required".into())),
    };

    // Never set here, cancellation is for library callers that own the flag
    let cancel = AtomicBool::new(false);
    let report = compare_files(path_a, path_b, &config, &cancel, !args.no_progress)?;

    output::write_tsv_report_file(&report, &args.output)?;
    if let Some(path) = &args.json {
        output::write_json_report_file(&report, path)?;
    }
    if let (Some(path), Some(histogram)) = (
        &args.precursor_diff_output,
        report.matches.precursor_diff_histogram.as_ref(),
    ) {
        output::write_precursor_diff_file(histogram, path)?;
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    pretty_env_logger::init();

    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
