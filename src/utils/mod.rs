mod fs;

pub use fs::{read_json, write_json_atomic};

/// The name of the state folder
pub const STATE_FOLDER: &str = ".osm-sync";

/// The name of the configuration file inside the state folder
pub const CONFIG_FILE: &str = "config.json";

/// The name of the roster file inside the state folder
pub const ROSTER_FILE: &str = "roster.json";

/// The name of the group membership file inside the state folder
pub const GROUPS_FILE: &str = "groups.json";

/// The name of the snapshots folder inside the state folder
pub const SNAPSHOTS_FOLDER: &str = "snapshots";

/// Current osm-sync version
pub const OSM_SYNC_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
