use crate::models::{FileInfo, FileInfoBuilder, FileType, PackageData};
use crate::parsers::try_parse_file;
use crate::scanner::ProcessResult;
use crate::scanner::license::LicenseScanConfig;
use crate::utils::file::{get_modification_date, is_path_excluded};
use crate::utils::hash::Checksums;
use anyhow::{Context, Result};
use content_inspector::{ContentType, inspect};
use glob::Pattern;
use indicatif::ProgressBar;
use log::warn;
use mime_guess::from_path;
use rayon::prelude::*;
use std::fs;
use std::path::Path;

/// Scan the tree under `path`, files of one directory in parallel.
pub fn process<P: AsRef<Path>>(
    path: P,
    max_depth: usize,
    progress_bar: &ProgressBar,
    exclude_patterns: &[Pattern],
    license_config: Option<&LicenseScanConfig>,
) -> Result<ProcessResult> {
    let path = path.as_ref();

    if is_path_excluded(path, exclude_patterns) {
        return Ok(ProcessResult {
            files: Vec::new(),
            excluded_count: 1,
        });
    }

    let mut total_excluded = 0;
    let mut file_entries = Vec::new();
    let mut dir_entries = Vec::new();

    let entries = fs::read_dir(path).with_context(|| format!("Failed to read directory {}", path.display()))?;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if is_path_excluded(&path, exclude_patterns) {
            total_excluded += 1;
            continue;
        }
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => file_entries.push((path, metadata)),
            Ok(metadata) if metadata.is_dir() => dir_entries.push((path, metadata)),
            _ => continue,
        }
    }
    // Directory order is platform dependent; output order must not be.
    file_entries.sort_by(|a, b| a.0.cmp(&b.0));
    dir_entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut all_files: Vec<FileInfo> = file_entries
        .par_iter()
        .map(|(path, metadata)| {
            let file_info = process_file(path, metadata, license_config);
            progress_bar.inc(1);
            file_info
        })
        .collect();

    for (path, metadata) in dir_entries {
        all_files.push(process_directory(&path, &metadata));

        if max_depth > 0 {
            match process(&path, max_depth - 1, progress_bar, exclude_patterns, license_config) {
                Ok(mut result) => {
                    all_files.append(&mut result.files);
                    total_excluded += result.excluded_count;
                }
                Err(e) => warn!("Error processing directory {}: {e:#}", path.display()),
            }
        }
    }

    Ok(ProcessResult {
        files: all_files,
        excluded_count: total_excluded,
    })
}

fn process_file(path: &Path, metadata: &fs::Metadata, license_config: Option<&LicenseScanConfig>) -> FileInfo {
    let mut scan_errors: Vec<String> = vec![];
    let mut file_info_builder = FileInfoBuilder::default();

    if let Err(e) = extract_information_from_content(&mut file_info_builder, path, license_config) {
        scan_errors.push(format!("{e:#}"));
    }

    let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
    let base_name = path.file_stem().unwrap_or_default().to_string_lossy().to_string();
    let extension = path
        .extension()
        .map_or(String::new(), |ext| format!(".{}", ext.to_string_lossy()));

    file_info_builder
        .name(name)
        .base_name(base_name)
        .extension(extension)
        .path(path.to_string_lossy().to_string())
        .file_type(FileType::File)
        .mime_type(Some(from_path(path).first_or_octet_stream().essence_str().to_string()))
        .size(metadata.len())
        .date(get_modification_date(metadata))
        .scan_errors(scan_errors)
        .build()
        .expect("FileInfoBuilder not completely initialized")
}

fn extract_information_from_content(
    file_info_builder: &mut FileInfoBuilder,
    path: &Path,
    license_config: Option<&LicenseScanConfig>,
) -> Result<()> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let checksums = Checksums::of(&buffer);
    file_info_builder
        .sha1(Some(checksums.sha1))
        .md5(Some(checksums.md5))
        .sha256(Some(checksums.sha256));

    if !matches!(inspect(&buffer), ContentType::UTF_8 | ContentType::UTF_8_BOM) {
        return Ok(());
    }
    file_info_builder.is_text(true);
    let text = String::from_utf8_lossy(&buffer).into_owned();

    if let Some(parsed) = try_parse_file(path, &text) {
        let mut package = parsed?;
        if let Some(config) = license_config {
            detect_declared_license(&mut package, config)?;
        }
        file_info_builder.package_data(vec![package]);
        return Ok(());
    }

    let Some(config) = license_config else {
        return Ok(());
    };
    let findings = config.detect(text, false)?;
    let (expression, expression_spdx) = config.detected_expression(&findings.detections)?;
    file_info_builder
        .detected_license_expression(expression)
        .detected_license_expression_spdx(expression_spdx)
        .license_detections(findings.detections)
        .license_clues(findings.clues);
    Ok(())
}

/// Detect the license of a manifest statement, trusting short matches.
fn detect_declared_license(package: &mut PackageData, config: &LicenseScanConfig) -> Result<()> {
    let Some(statement) = package.extracted_license_statement.clone() else {
        return Ok(());
    };
    let findings = config.detect(statement, true)?;
    let (expression, expression_spdx) = config.detected_expression(&findings.detections)?;
    package.declared_license_expression = expression;
    package.declared_license_expression_spdx = expression_spdx;
    package.license_detections = findings.detections;
    Ok(())
}

fn process_directory(path: &Path, metadata: &fs::Metadata) -> FileInfo {
    let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();

    FileInfo {
        base_name: name.clone(),
        name,
        extension: String::new(),
        path: path.to_string_lossy().to_string(),
        file_type: FileType::Directory,
        mime_type: None,
        size: 0,
        date: get_modification_date(metadata),
        sha1: None,
        md5: None,
        sha256: None,
        is_text: false,
        package_data: Vec::new(),
        detected_license_expression: None,
        detected_license_expression_spdx: None,
        license_detections: Vec::new(),
        license_clues: Vec::new(),
        scan_errors: Vec::new(),
    }
}
