//! CSV export of the store registry
//!
//! One row per known store with its latest classification and counts,
//! written under the datadump directory with a timestamped name.

use crate::storage::{Storage, StorageError};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Exports the full registry to a timestamped CSV file
///
/// # Arguments
///
/// * `storage` - Storage to read the registry from
/// * `dir` - Directory for the export (created if missing)
///
/// # Returns
///
/// The path of the written file
pub fn export_registry_csv(storage: &dyn Storage, dir: &Path) -> Result<PathBuf, StorageError> {
    std::fs::create_dir_all(dir)?;

    let filename = format!("njuskalo_stores_{}.csv", Utc::now().timestamp());
    let path = dir.join(filename);

    let mut writer = csv::Writer::from_path(&path).map_err(csv_io_error)?;

    writer
        .write_record([
            "url",
            "is_valid",
            "is_automoto",
            "new_vehicle_count",
            "used_vehicle_count",
            "test_vehicle_count",
            "total_vehicle_count",
            "created_at",
            "updated_at",
        ])
        .map_err(csv_io_error)?;

    for store in storage.all_stores()? {
        let new_count = store.new_vehicle_count.to_string();
        let used_count = store.used_vehicle_count.to_string();
        let test_count = store.test_vehicle_count.to_string();
        let total_count = store.total_vehicle_count.to_string();
        let created_at = store.created_at.to_rfc3339();
        let updated_at = store.updated_at.to_rfc3339();

        writer
            .write_record([
                store.url.as_str(),
                if store.is_valid { "1" } else { "0" },
                match store.is_automoto {
                    Some(true) => "1",
                    Some(false) => "0",
                    None => "",
                },
                new_count.as_str(),
                used_count.as_str(),
                test_count.as_str(),
                total_count.as_str(),
                created_at.as_str(),
                updated_at.as_str(),
            ])
            .map_err(csv_io_error)?;
    }

    writer.flush()?;
    tracing::info!("Registry exported to {}", path.display());
    Ok(path)
}

fn csv_io_error(e: csv::Error) -> StorageError {
    StorageError::Io(std::io::Error::other(e))
}
