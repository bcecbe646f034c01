use std::path::PathBuf;

/// Runtime configuration for the tracker
///
/// All values are read from the environment (optionally via a `.env` file).
/// The scheduler that invokes a run provides these variables; there is no
/// config file to parse apart from the optional tunnel definitions.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file (`DATABASE_PATH`)
    pub database_path: PathBuf,

    /// Root sitemap index URL (`SITEMAP_INDEX_URL`)
    pub sitemap_index_url: String,

    /// Base URL of the target site (`BASE_URL`)
    pub base_url: String,

    /// Numeric id of the auto-moto category (`TARGET_CATEGORY_ID`)
    pub target_category_id: u32,

    /// X display number passed to the browser, e.g. 3 for `:3` (`DISPLAY_NUM`)
    pub display_num: Option<u32>,

    /// Path to the JSON tunnel configuration file (`TUNNEL_CONFIG`)
    pub tunnel_config_path: Option<PathBuf>,

    /// Re-ingest the sitemap when the newest registry row is older than this
    /// many days (`SITEMAP_STALENESS_DAYS`)
    pub staleness_days: i64,

    /// Whether to run the browser headless (`HEADLESS`)
    pub headless: bool,

    /// Directory for CSV exports (`DATADUMP_DIR`)
    pub datadump_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./njuskalo.db"),
            sitemap_index_url: "https://www.njuskalo.hr/sitemap-index.xml".to_string(),
            base_url: "https://www.njuskalo.hr".to_string(),
            target_category_id: 2,
            display_num: None,
            tunnel_config_path: None,
            staleness_days: 7,
            headless: true,
            datadump_dir: PathBuf::from("datadump"),
        }
    }
}
