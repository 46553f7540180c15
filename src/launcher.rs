//! Namespace launcher: clones the child into its namespaces, installs the
//! UID/GID maps from the parent side, releases the child through the sync
//! pipe and waits for it.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use nix::sched::CloneFlags;
use nix::unistd::{getgid, getuid, Pid};
use tracing::{debug, warn};

use crate::child;
use crate::config::SandboxConfig;
use crate::sys;
use crate::utils::errors::SandboxResult;

/// PID, mount and UTS namespaces always; user and net namespaces only for
/// isolated sandboxes (networked ones share the host's and need root).
pub fn namespace_flags(network: bool) -> CloneFlags {
    let mut flags = CloneFlags::CLONE_NEWPID | CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_NEWUTS;
    if !network {
        flags |= CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET;
    }
    flags
}

/// Launch the child initializer inside `root` and return its exit code.
pub fn launch(root: &Path, config: SandboxConfig) -> SandboxResult<i32> {
    let (sync_rx, sync_tx) = sys::pipe()?;
    let flags = namespace_flags(config.network);
    let map_user = !config.network;

    // The closure is copied into the child's address space by clone; the
    // parent's copy (holding its duplicate of the read end) is dropped as
    // soon as clone returns.
    let child_root = root.to_path_buf();
    let mut sync_rx = Some(sync_rx);
    let pid = sys::spawn_child(
        Box::new(move || match child::run(&child_root, &config, sync_rx.take()) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("sandbox: {e}");
                1
            }
        }),
        flags,
    )?;
    debug!("cloned child {pid} with {flags:?}");

    if map_user {
        if let Err(e) = write_id_maps(pid) {
            // the child will most likely fail its mounts, but let it report
            warn!("could not write uid/gid maps for {pid}: {e}");
        }
    }

    // one byte: "maps are in place, proceed"
    let mut sync_tx = File::from(sync_tx);
    if let Err(e) = sync_tx.write_all(b"x") {
        warn!("sync write to child failed: {e}");
    }
    drop(sync_tx);

    sys::wait_child(pid)
}

/// Map root inside the namespace to the invoking user outside. `setgroups`
/// must be denied before `gid_map` is written on current kernels.
fn write_id_maps(pid: Pid) -> std::io::Result<()> {
    std::fs::write(format!("/proc/{pid}/setgroups"), "deny")?;
    std::fs::write(format!("/proc/{pid}/uid_map"), format!("0 {} 1\n", getuid()))?;
    std::fs::write(format!("/proc/{pid}/gid_map"), format!("0 {} 1\n", getgid()))?;
    Ok(())
}
