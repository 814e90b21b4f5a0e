pub mod cli;
pub mod license_detection;
pub mod models;
pub mod parsers;
pub mod scanner;
pub mod utils;

pub use license_detection::{DetectOptions, LicenseDetectionEngine};
pub use models::{ExtraData, FileInfo, FileType, Header, Output, SystemEnvironment};
pub use scanner::{LicenseScanConfig, ProcessResult, TreeCount, count, process};
