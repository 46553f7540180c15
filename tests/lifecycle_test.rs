//! Lifecycle tests for the parts that need no privileges. Create and enter
//! clone into fresh namespaces and run a shell, so they are exercised by
//! the scenario suite on a root-capable host, not here.

use chrono::Utc;
use sandboxer::config::{SandboxConfig, SandboxDescriptor};
use sandboxer::lifecycle;
use sandboxer::paths::Paths;
use sandboxer::registry::Registry;
use std::fs;
use tempfile::TempDir;

fn paths_in(temp_dir: &TempDir) -> Paths {
    Paths {
        sandbox_root: temp_dir.path().join("sandbox_root"),
        registry: temp_dir.path().join("sandboxes.txt"),
        log_file: temp_dir.path().join("sandbox.log"),
    }
}

#[test]
fn delete_removes_the_root_directory() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths_in(&temp_dir);
    fs::create_dir(&paths.sandbox_root).unwrap();

    let code = lifecycle::delete(&paths).unwrap();
    assert_eq!(code, 0);
    assert!(!paths.sandbox_root.exists());
}

#[test]
fn delete_is_idempotent_on_a_missing_root() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths_in(&temp_dir);

    // nothing was ever created; delete still reports success
    let code = lifecycle::delete(&paths).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn delete_leaves_the_registry_alone() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths_in(&temp_dir);
    fs::create_dir(&paths.sandbox_root).unwrap();

    let registry = Registry::new(&paths.registry);
    registry
        .append(&SandboxDescriptor {
            name: "alpha".to_string(),
            config: SandboxConfig {
                memory_mb: 256,
                cpu_cores: 2,
                network: false,
            },
            created_at: Utc::now().timestamp(),
        })
        .unwrap();
    let before = fs::read_to_string(&paths.registry).unwrap();

    lifecycle::delete(&paths).unwrap();

    let after = fs::read_to_string(&paths.registry).unwrap();
    assert_eq!(before, after);
    assert!(after.contains("alpha 256 2 0"));
}
