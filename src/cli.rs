use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory path to scan
    pub dir_path: String,

    /// Output file path
    #[arg(short, long, default_value = "output.json")]
    pub output_file: String,

    /// Maximum recursion depth (0 means no recursion)
    #[arg(short, long, default_value = "50")]
    pub max_depth: usize,

    /// Exclude patterns (glob patterns like "*.tmp" or "node_modules")
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Directory holding the `rules/` and `licenses/` corpus
    #[arg(long)]
    pub license_rules_path: Option<String>,

    /// Include the matched text of every license match in the output
    #[arg(long)]
    pub include_text: bool,

    /// Drop matches scoring below this value (0-100)
    #[arg(long, default_value = "0")]
    pub min_score: f64,

    /// Seconds allowed for the license detection of one file
    #[arg(long, default_value = "120")]
    pub timeout: u64,

    /// Report license-like text that matches no known rule
    #[arg(long)]
    pub unknown_licenses: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["license-detector", "src"]);
        assert_eq!(cli.dir_path, "src");
        assert_eq!(cli.output_file, "output.json");
        assert_eq!(cli.max_depth, 50);
        assert_eq!(cli.timeout, 120);
        assert_eq!(cli.min_score, 0.0);
        assert!(cli.license_rules_path.is_none());
        assert!(!cli.include_text);
    }

    #[test]
    fn test_comma_separated_excludes() {
        let cli = Cli::parse_from([
            "license-detector",
            "src",
            "-e",
            "*.tmp,node_modules",
            "--license-rules-path",
            "rules",
            "--min-score",
            "50",
        ]);
        assert_eq!(cli.exclude, vec!["*.tmp", "node_modules"]);
        assert_eq!(cli.license_rules_path.as_deref(), Some("rules"));
        assert_eq!(cli.min_score, 50.0);
    }
}
