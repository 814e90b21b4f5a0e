mod file_info;
mod output;

pub use file_info::{FileInfo, FileInfoBuilder, FileType, PackageData};
pub use output::{
    ExtraData, Header, LicenseReference, LicenseRuleReference, OUTPUT_FORMAT_VERSION, Output,
    SystemEnvironment,
};
