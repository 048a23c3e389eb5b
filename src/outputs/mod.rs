//! Output generation for the end of a run.
//!
//! # Submodules
//!
//! - [`document`]: renders unmatched articles as a DOCX document
//! - [`json`]: writes the run report for monitoring and audits
//!
//! # Output Structure
//!
//! ```text
//! work_dir/
//! ├── combined_news.xlsx       # merged scraper output
//! ├── combined_news.csv        # delimited copy
//! ├── news.db                  # SQLite copy (table `news`)
//! ├── unmatched_articles.xlsx  # rows missing from the reference list
//! ├── unmatched_articles.docx  # rendered unmatched rows
//! ├── run_report.json          # stage statuses and counts
//! └── batch_run_log.txt        # append-only run log
//! ```

pub mod document;
pub mod json;
