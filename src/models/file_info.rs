use derive_builder::Builder;
use serde::Serialize;

use crate::license_detection::{DetectionRecord, MatchRecord};

#[derive(Debug, Builder, Serialize)]
#[builder(build_fn(skip))]
pub struct FileInfo {
    pub name: String,
    pub base_name: String,
    pub extension: String,
    pub path: String,
    #[serde(rename = "type")] // name used by ScanCode
    pub file_type: FileType,
    #[builder(default)]
    pub mime_type: Option<String>,
    pub size: u64,
    #[builder(default)]
    pub date: Option<String>,
    #[builder(default)]
    pub sha1: Option<String>,
    #[builder(default)]
    pub md5: Option<String>,
    #[builder(default)]
    pub sha256: Option<String>,
    #[builder(default)]
    pub is_text: bool,
    #[builder(default)]
    pub package_data: Vec<PackageData>,
    #[builder(default)]
    pub detected_license_expression: Option<String>,
    #[builder(default)]
    pub detected_license_expression_spdx: Option<String>,
    #[builder(default)]
    pub license_detections: Vec<DetectionRecord>,
    /// Matches too weak to be detections on their own.
    #[builder(default)]
    pub license_clues: Vec<MatchRecord>,
    #[builder(default)]
    pub scan_errors: Vec<String>,
}

impl FileInfoBuilder {
    pub fn build(&self) -> Result<FileInfo, String> {
        Ok(FileInfo {
            name: self.name.clone().ok_or("Missing field: name")?,
            base_name: self.base_name.clone().ok_or("Missing field: base_name")?,
            extension: self.extension.clone().ok_or("Missing field: extension")?,
            path: self.path.clone().ok_or("Missing field: path")?,
            file_type: self.file_type.clone().ok_or("Missing field: file_type")?,
            mime_type: self.mime_type.clone().flatten(),
            size: self.size.ok_or("Missing field: size")?,
            date: self.date.clone().flatten(),
            sha1: self.sha1.clone().flatten(),
            md5: self.md5.clone().flatten(),
            sha256: self.sha256.clone().flatten(),
            is_text: self.is_text.unwrap_or_default(),
            package_data: self.package_data.clone().unwrap_or_default(),
            detected_license_expression: self.detected_license_expression.clone().flatten(),
            detected_license_expression_spdx: self.detected_license_expression_spdx.clone().flatten(),
            license_detections: self.license_detections.clone().unwrap_or_default(),
            license_clues: self.license_clues.clone().unwrap_or_default(),
            scan_errors: self.scan_errors.clone().unwrap_or_default(),
        })
    }
}

impl FileInfo {
    /// Every detection of this file, package-declared ones included.
    pub fn all_detections(&self) -> impl Iterator<Item = &DetectionRecord> {
        self.license_detections
            .iter()
            .chain(self.package_data.iter().flat_map(|p| p.license_detections.iter()))
    }

    /// Every match of this file, clues included.
    pub fn all_matches(&self) -> impl Iterator<Item = &MatchRecord> {
        self.all_detections()
            .flat_map(|d| d.matches.iter())
            .chain(self.license_clues.iter())
    }
}

/// Package metadata read from a manifest, reduced to its declared license.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PackageData {
    #[serde(rename = "type")] // name used by ScanCode
    pub package_type: String,
    pub name: Option<String>,
    pub version: Option<String>,
    /// License statement as written in the manifest.
    pub extracted_license_statement: Option<String>,
    pub declared_license_expression: Option<String>,
    pub declared_license_expression_spdx: Option<String>,
    pub license_detections: Vec<DetectionRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileType {
    File,
    Directory,
}

impl Serialize for FileType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let value = match self {
            FileType::File => "file",
            FileType::Directory => "directory",
        };
        serializer.serialize_str(value)
    }
}
