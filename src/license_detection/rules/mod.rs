//! Rule and license corpus: loading, legalese and thresholds.

pub mod legalese;
pub mod loader;
pub mod thresholds;

pub use loader::{load_corpus, parse_license_file, parse_rule_file};
