//! Host platform (linux for example) utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root.
pub const SW_ROOT_ENV_VAR: &str = "ACKERMANN_SW_ROOT";

/// Get the root directory of the software.
///
/// This is the value of `ACKERMANN_SW_ROOT` if it is set, otherwise the
/// current working directory.
pub fn get_sw_root() -> std::io::Result<PathBuf> {
    match env::var_os(SW_ROOT_ENV_VAR) {
        Some(root) => Ok(PathBuf::from(root)),
        None => env::current_dir()
    }
}

/// Get the name of the host machine, or `None` if it cannot be determined.
pub fn get_hostname() -> Option<String> {
    env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname")
            .ok()
            .map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
}
