use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::info;
use serde_json::to_string_pretty;
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use license_detector::cli::Cli;
use license_detector::license_detection::LicenseDetectionEngine;
use license_detector::models::{
    ExtraData, Header, OUTPUT_FORMAT_VERSION, Output, SystemEnvironment,
};
use license_detector::scanner::{
    self, LicenseScanConfig, ProcessResult, TreeCount, count, process,
};
use license_detector::utils::file::compile_exclude_patterns;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let start_time = Utc::now();
    let multi_progress = init_logging()?;

    let exclude_patterns = compile_exclude_patterns(&cli.exclude);
    let tree = count(&cli.dir_path, cli.max_depth, &exclude_patterns)?;
    info!(
        "Found {} files in {} directories ({} items excluded)",
        tree.files, tree.directories, tree.excluded
    );

    let license_config = init_license_config(&cli)?;

    let progress_bar = multi_progress.add(create_progress_bar(tree.files));
    let scan_result = process(
        &cli.dir_path,
        cli.max_depth,
        &progress_bar,
        &exclude_patterns,
        license_config.as_ref(),
    )?;
    progress_bar.finish_with_message("Scan complete!");

    let end_time = Utc::now();
    let output = create_output(start_time, end_time, scan_result, &tree, license_config.as_ref());
    write_output(&cli.output_file, &output)?;

    println!("JSON output written to {}", cli.output_file);
    Ok(())
}

fn init_logging() -> Result<MultiProgress> {
    let logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).build();
    let level = logger.filter();
    let multi_progress = MultiProgress::new();
    LogWrapper::new(multi_progress.clone(), logger)
        .try_init()
        .context("Failed to initialize logging")?;
    log::set_max_level(level);
    Ok(multi_progress)
}

fn init_license_config(cli: &Cli) -> Result<Option<LicenseScanConfig>> {
    let Some(rules_path) = &cli.license_rules_path else {
        return Ok(None);
    };

    let engine = LicenseDetectionEngine::new(Path::new(rules_path))
        .with_context(|| format!("Failed to load license rules from {rules_path}"))?;
    let mut config = LicenseScanConfig::new(engine);
    config.include_text = cli.include_text;
    config.min_score = cli.min_score;
    config.unknown_licenses = cli.unknown_licenses;
    config.timeout = Duration::from_secs(cli.timeout);
    Ok(Some(config))
}

fn create_progress_bar(total_files: usize) -> ProgressBar {
    let progress_bar = ProgressBar::new(total_files as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files processed ({eta})")
            .expect("Failed to create progress bar style")
            .progress_chars("#>-"),
    );
    progress_bar
}

fn create_output(
    start_time: chrono::DateTime<Utc>,
    end_time: chrono::DateTime<Utc>,
    scan_result: ProcessResult,
    tree: &TreeCount,
    license_config: Option<&LicenseScanConfig>,
) -> Output {
    let duration = (end_time - start_time).num_nanoseconds().unwrap_or(0) as f64 / 1_000_000_000.0;
    let files = scan_result.files;

    let extra_data = ExtraData {
        files_count: tree.files,
        directories_count: tree.directories,
        excluded_count: scan_result.excluded_count,
        license_rules_count: license_config.map_or(0, |c| c.engine.index().corpus_rules_count()),
        system_environment: SystemEnvironment {
            operating_system: sys_info::os_type().ok(),
            cpu_architecture: env::consts::ARCH.to_string(),
            platform: format!(
                "{}-{}-{}",
                sys_info::os_type().unwrap_or_else(|_| "unknown".to_string()),
                sys_info::os_release().unwrap_or_else(|_| "unknown".to_string()),
                env::consts::ARCH
            ),
            rust_version: rustc_version_runtime::version().to_string(),
        },
    };

    let errors: Vec<String> = files
        .iter()
        .flat_map(|file| {
            file.scan_errors
                .iter()
                .map(move |error| format!("{}: {}", file.path, error))
        })
        .collect();

    let (license_references, license_rule_references) = match license_config {
        Some(config) => (
            scanner::license_references(&files, config.engine.index()),
            scanner::rule_references(&files, config.engine.index()),
        ),
        None => (Vec::new(), Vec::new()),
    };

    Output {
        headers: vec![Header {
            start_timestamp: start_time.to_rfc3339(),
            end_timestamp: end_time.to_rfc3339(),
            duration,
            extra_data,
            errors,
            output_format_version: OUTPUT_FORMAT_VERSION.to_string(),
        }],
        license_detections: scanner::unique_detections(&files),
        files,
        license_references,
        license_rule_references,
    }
}

fn write_output(output_file: &str, output: &Output) -> Result<()> {
    let json_output = to_string_pretty(output).context("Failed to serialize scan output")?;
    let mut file = File::create(output_file).with_context(|| format!("Failed to create {output_file}"))?;
    file.write_all(json_output.as_bytes())
        .with_context(|| format!("Failed to write {output_file}"))?;
    Ok(())
}
