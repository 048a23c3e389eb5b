//! Remote scraper scripts: fetch each one and run it as a child process.
//!
//! Scrapers are opaque. The only contract with a script is that it may drop
//! spreadsheet files into the working directory while it runs; its output is
//! not captured or inspected.
//!
//! # Per-script lifecycle
//!
//! 1. **Fetch**: download the script bytes (or read a local path)
//! 2. **Stage**: write them to a uniquely named temporary file
//! 3. **Run**: `<interpreter> <tempfile>` with the working directory as cwd
//! 4. **Clean up**: remove the temporary file, whatever the outcome
//!
//! Scripts run strictly one after another. A failed download or a non-zero
//! exit is logged and the batch moves on to the next script. No timeout is
//! applied, so a hung script blocks the batch.

pub mod runner;

pub use runner::{ScriptOutcome, run_scripts};
