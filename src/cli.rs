//! Command-line interface definitions.
//!
//! Every flag is optional: values given here override the YAML config file,
//! which in turn overrides the built-in defaults in [`crate::config`].

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the batch run.
///
/// # Examples
///
/// ```sh
/// # Run the built-in scraper list in the current directory
/// news_merge
///
/// # Use a config file and a specific working directory
/// news_merge --config news_merge.yaml --work-dir /srv/news
///
/// # Override the reference list location
/// news_merge --reference-url https://example.org/published.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory scrapers write into and where all artifacts are produced
    #[arg(short, long, env = "NEWS_MERGE_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "NEWS_MERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Location of the published reference list (http(s) URL or local path)
    #[arg(short, long, env = "NEWS_MERGE_REFERENCE_URL")]
    pub reference_url: Option<String>,

    /// Run log file (appended to); relative paths resolve against the working directory
    #[arg(short, long, env = "NEWS_MERGE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Interpreter used to run each downloaded script
    #[arg(short, long, env = "NEWS_MERGE_INTERPRETER")]
    pub interpreter: Option<String>,

    /// Skip fetching and running scrapers; only merge what is already in the working directory
    #[arg(long)]
    pub skip_scrapers: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "news_merge",
            "--work-dir",
            "./out",
            "--reference-url",
            "https://example.org/ref.csv",
        ]);

        assert_eq!(cli.work_dir, Some(PathBuf::from("./out")));
        assert_eq!(cli.reference_url.as_deref(), Some("https://example.org/ref.csv"));
        assert!(!cli.skip_scrapers);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "news_merge",
            "-w",
            "/tmp/news",
            "-c",
            "/tmp/news.yaml",
            "-i",
            "python3",
            "--skip-scrapers",
        ]);

        assert_eq!(cli.work_dir, Some(PathBuf::from("/tmp/news")));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/news.yaml")));
        assert_eq!(cli.interpreter.as_deref(), Some("python3"));
        assert!(cli.skip_scrapers);
    }
}
