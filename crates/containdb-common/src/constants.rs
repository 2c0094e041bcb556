//! System-wide constants and default names.

use std::path::PathBuf;

/// Application name used in CLI output.
pub const APP_NAME: &str = "ContainDB";

/// Default container runtime binary.
pub const DEFAULT_RUNTIME: &str = "docker";

/// Name of the managed network every orchestrated container attaches to.
pub const MANAGED_NETWORK: &str = "ContainDB-Network";

/// Default export path for topology snapshots.
pub const DEFAULT_EXPORT_FILE: &str = "docker-compose.yml";

/// Restart policy applied when the user opts into auto-restart.
pub const RESTART_UNLESS_STOPPED: &str = "unless-stopped";

/// Identity used when a database username is left blank.
pub const DEFAULT_DB_USER: &str = "root";

/// Suffix of database container names (`redis` → `redis-container`).
pub const CONTAINER_SUFFIX: &str = "-container";

/// Suffix of canonical volume names (`redis` → `redis-data`).
pub const VOLUME_SUFFIX: &str = "-data";

/// Deadline in seconds for each rollback cleanup command.
pub const DEFAULT_CLEANUP_TIMEOUT_SECS: u64 = 30;

/// Download location of the MongoDB Compass Debian package.
pub const COMPASS_DOWNLOAD_URL: &str =
    "https://downloads.mongodb.com/compass/mongodb-compass_1.46.2_amd64.deb";

/// File name of the downloaded Compass package inside the temp directory.
pub const COMPASS_ARTIFACT: &str = "mongodb-compass.deb";

/// Returns the temp directory used for downloaded artifacts.
pub fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Host package manager used to install downloaded desktop tools.
pub const PACKAGE_MANAGER: &str = "dpkg";
