//! Output module
//!
//! Terminal summaries and tabular export of the registry. The outbound API
//! push consumes the same data model but lives outside this crate.

mod csv_export;
mod stats;

pub use csv_export::export_registry_csv;
pub use stats::{load_statistics, print_run_report, print_statistics, TrackerStatistics};
