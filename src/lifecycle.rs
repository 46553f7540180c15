//! The three engine operations: create, enter, delete.

use std::fs;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{SandboxConfig, SandboxDescriptor, ENTER_FALLBACK};
use crate::launcher;
use crate::net::NetworkPlumber;
use crate::paths::Paths;
use crate::registry::Registry;
use crate::rootfs;
use crate::sys;
use crate::utils::errors::SandboxResult;

/// Build a fresh sandbox, run its shell, then record it in the registry.
/// Returns the child's exit code.
pub fn create(paths: &Paths, name: Option<&str>, config: SandboxConfig) -> SandboxResult<i32> {
    info!("creating sandbox");

    // before any side effect, so a refused -n leaves no trace behind
    require_privileges(&config)?;

    rootfs::mount_root(&paths.sandbox_root)?;
    rootfs::stage_busybox(&paths.sandbox_root);
    prepare_variant(paths, &config);

    let code = launcher::launch(&paths.sandbox_root, config)?;

    // Recorded after the launch with the declared parameters, whatever the
    // shell exited with; a name-less create stays unregistered.
    if let Some(name) = name {
        let descriptor = SandboxDescriptor {
            name: name.to_string(),
            config,
            created_at: Utc::now().timestamp(),
        };
        Registry::new(&paths.registry).append(&descriptor)?;
    }

    info!("sandbox created");
    Ok(code)
}

/// Re-enter the sandbox under its registered parameters. The rootfs is
/// rebuilt over the (possibly still mounted) tmpfs, so enter works both
/// after a reboot and while the original mount is live.
pub fn enter(paths: &Paths, name: Option<&str>) -> SandboxResult<i32> {
    info!("entering sandbox");

    let config = match name {
        Some(name) => match Registry::new(&paths.registry).find(name)? {
            Some(descriptor) => descriptor.config,
            None => {
                warn!("sandbox {name:?} not in registry, using fallback limits");
                ENTER_FALLBACK
            }
        },
        None => ENTER_FALLBACK,
    };

    require_privileges(&config)?;

    rootfs::mount_root_reuse(&paths.sandbox_root);
    rootfs::stage_busybox(&paths.sandbox_root);
    prepare_variant(paths, &config);

    let code = launcher::launch(&paths.sandbox_root, config)?;
    info!("left sandbox");
    Ok(code)
}

/// Unmount the sandbox root and remove the directory. The registry is left
/// untouched; host network mutations are never reverted.
pub fn delete(paths: &Paths) -> SandboxResult<i32> {
    info!("deleting sandbox");

    if let Err(e) = sys::unmount_detach(&paths.sandbox_root) {
        warn!("unmount: {e}");
    }
    if let Err(e) = fs::remove_dir(&paths.sandbox_root) {
        warn!("remove root: {e}");
    }

    info!("sandbox deleted");
    Ok(0)
}

/// Networked sandboxes touch iptables, sysctl and host binds; refuse early
/// unless we are root.
fn require_privileges(config: &SandboxConfig) -> SandboxResult<()> {
    if config.network {
        NetworkPlumber::new().require_root()?;
    }
    Ok(())
}

/// Populate the rootfs for the chosen flavor; the networked flavor first
/// runs the host plumbing.
fn prepare_variant(paths: &Paths, config: &SandboxConfig) {
    let tracer = rootfs::host_tracer();
    if config.network {
        NetworkPlumber::new().prepare();
        rootfs::build(&paths.sandbox_root, &rootfs::network::plan(), tracer.as_ref());
    } else {
        rootfs::build(&paths.sandbox_root, &rootfs::isolated::plan(), tracer.as_ref());
    }
}
