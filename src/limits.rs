//! Per-launch resource limits, applied inside the child between chroot and
//! exec. CPU affinity first, then the memory cap.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

use nix::sched::CpuSet;
use tracing::{debug, info, warn};

use crate::config::SandboxConfig;
use crate::sys;

pub fn apply(config: &SandboxConfig) {
    if config.cpu_cores > 0 {
        apply_cpu_limit(config.cpu_cores);
    }
    if config.memory_mb > 0 {
        apply_memory_limit(config.memory_mb);
    }
}

/// Number of CPUs to pin to, or None when no restriction applies.
pub fn affinity_width(requested: u32, online: u32) -> Option<usize> {
    if requested == 0 || requested >= online {
        None
    } else {
        Some(requested as usize)
    }
}

fn apply_cpu_limit(cores: u32) {
    let Some(width) = affinity_width(cores, sys::online_cpus()) else {
        return;
    };

    let mut set = CpuSet::new();
    for cpu in 0..width {
        if set.set(cpu).is_err() {
            break;
        }
    }

    match sys::set_cpu_affinity(&set) {
        Ok(()) => info!("cpu limited to {width} core(s)"),
        Err(e) => warn!("could not set cpu affinity: {e}"),
    }
}

pub fn cgroup_dir(pid: u32) -> PathBuf {
    PathBuf::from(format!("/sys/fs/cgroup/sandbox_{pid}"))
}

/// RLIMIT_AS bounds for a cap in MiB. The hard limit sits at twice the soft
/// limit so the kernel can widen the soft limit for later mmaps.
pub fn rlimit_bounds(memory_mb: u64) -> (u64, u64) {
    let soft = memory_mb * 1024 * 1024;
    (soft, soft * 2)
}

fn apply_memory_limit(memory_mb: u64) {
    match cgroup_limit(memory_mb) {
        Ok(()) => info!("memory limited to {memory_mb} MB via cgroup v2"),
        Err(e) => {
            debug!("cgroup v2 memory limit unavailable ({e}), falling back to rlimit");
            let (soft, hard) = rlimit_bounds(memory_mb);
            match sys::set_rlimit_as(soft, hard) {
                Ok(()) => info!("memory limited to {memory_mb} MB via rlimit"),
                Err(e) => warn!("could not set memory limit: {e}"),
            }
        }
    }
}

/// Private cgroup named after our pid: create it, cap it, join it.
fn cgroup_limit(memory_mb: u64) -> io::Result<()> {
    let pid = process::id();
    let dir = cgroup_dir(pid);
    match fs::create_dir(&dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
    }
    fs::write(dir.join("memory.max"), format!("{memory_mb}M\n"))?;
    fs::write(dir.join("cgroup.procs"), format!("{pid}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affinity_width_respects_online_count() {
        assert_eq!(affinity_width(0, 8), None);
        assert_eq!(affinity_width(8, 8), None);
        assert_eq!(affinity_width(9, 8), None);
        assert_eq!(affinity_width(2, 8), Some(2));
        assert_eq!(affinity_width(1, 2), Some(1));
    }

    #[test]
    fn rlimit_hard_is_twice_soft() {
        let (soft, hard) = rlimit_bounds(256);
        assert_eq!(soft, 256 * 1024 * 1024);
        assert_eq!(hard, 2 * soft);
    }

    #[test]
    fn cgroup_dir_is_pid_scoped() {
        assert_eq!(
            cgroup_dir(4242),
            PathBuf::from("/sys/fs/cgroup/sandbox_4242")
        );
    }
}
