//! Tabular file formats and the merge step.
//!
//! # Submodules
//!
//! - [`sheet`]: xlsx read/write with configurable null handling
//! - [`delimited`]: delimited text read/write, tolerant reads for external files
//! - [`merge`]: collect scraper spreadsheets and concatenate them

pub mod delimited;
pub mod merge;
pub mod sheet;
