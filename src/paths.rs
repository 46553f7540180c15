//! Filesystem locations used by the engine.
//!
//! The sandbox root, registry and event log are well-known single-slot paths.
//! Defaults are derived from the installed executable's directory
//! (`<prefix>/bin/sandbox` keeps its registry at `<prefix>/sandboxes.txt`);
//! each can be overridden through an environment variable, which is what the
//! tests and the management surface use.

use std::env;
use std::path::PathBuf;

use once_cell::sync::Lazy;

pub const ROOT_ENV: &str = "SANDBOX_ROOT";
pub const REGISTRY_ENV: &str = "SANDBOX_REGISTRY";
pub const LOG_ENV: &str = "SANDBOX_LOG";

const DEFAULT_ROOT: &str = "/tmp/sandbox_root";
const DEFAULT_LOG: &str = "/tmp/sandbox.log";
const REGISTRY_FILE: &str = "sandboxes.txt";

#[derive(Debug, Clone)]
pub struct Paths {
    /// Mount point of the (single) sandbox rootfs.
    pub sandbox_root: PathBuf,
    /// Append-only registry of created sandboxes.
    pub registry: PathBuf,
    /// Append-only diagnostic event log.
    pub log_file: PathBuf,
}

pub static PATHS: Lazy<Paths> = Lazy::new(Paths::resolve);

impl Paths {
    pub fn resolve() -> Self {
        Self {
            sandbox_root: env_path(ROOT_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
            registry: env_path(REGISTRY_ENV).unwrap_or_else(default_registry),
            log_file: env_path(LOG_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_LOG)),
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// `<prefix>/sandboxes.txt` next to the `bin/` directory holding the
/// executable, falling back to /tmp when the executable path is unknown.
fn default_registry() -> PathBuf {
    install_prefix()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(REGISTRY_FILE)
}

fn install_prefix() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let bin_dir = exe.parent()?;
    Some(bin_dir.parent().unwrap_or(bin_dir).to_path_buf())
}
