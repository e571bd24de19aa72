use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Directory holding the SQLite database and log files.
///
/// Respects `WSA_DATA_DIR`. Debug builds default to `dev_assets/` at the
/// workspace root so local runs never touch the user's data directory.
pub fn asset_dir() -> PathBuf {
    let path = if let Ok(dir) = std::env::var("WSA_DATA_DIR") {
        PathBuf::from(dir)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("com", "worldstaffingawards", "wsa")
            .expect("OS didn't give us a home directory")
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).expect("Failed to create asset directory");
    }

    path
}

/// Get the database file path.
///
/// Respects the `WSA_DATABASE_PATH` environment variable.
///
/// Default: `{asset_dir}/wsa.sqlite`
pub fn database_path() -> PathBuf {
    if let Ok(path) = std::env::var("WSA_DATABASE_PATH") {
        return PathBuf::from(path);
    }
    asset_dir().join("wsa.sqlite")
}

/// Default: `{asset_dir}/logs`
pub fn log_dir() -> PathBuf {
    if let Ok(path) = std::env::var("WSA_LOG_DIR") {
        return PathBuf::from(path);
    }
    asset_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn database_path_honours_override() {
        let original = std::env::var("WSA_DATABASE_PATH").ok();

        // SAFETY: serialised with every other env-mutating test.
        unsafe { std::env::set_var("WSA_DATABASE_PATH", "/tmp/wsa-test.sqlite") };
        assert_eq!(database_path(), PathBuf::from("/tmp/wsa-test.sqlite"));

        // SAFETY: as above
        unsafe {
            match original {
                Some(val) => std::env::set_var("WSA_DATABASE_PATH", val),
                None => std::env::remove_var("WSA_DATABASE_PATH"),
            }
        }
    }
}
