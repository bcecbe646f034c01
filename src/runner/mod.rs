//! Run orchestration module
//!
//! The top level of one scrape run: decide whether to re-ingest the
//! sitemap, iterate the store list with pacing and tunnel rotation, persist
//! outcomes, and emit a run report.

mod coordinator;
mod report;

pub use coordinator::{run, RunOptions};
pub use report::{RunMode, RunReport};
