mod count;
mod license;
mod process;
mod references;

use crate::models::FileInfo;

pub struct ProcessResult {
    pub files: Vec<FileInfo>,
    pub excluded_count: usize,
}

pub use self::count::{TreeCount, count};
pub use self::license::{LicenseFindings, LicenseScanConfig};
pub use self::process::process;
pub use self::references::{license_references, rule_references, unique_detections};
